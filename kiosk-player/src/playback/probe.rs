//! Video duration probing
//!
//! The scheduler only sees the [`DurationProbe`] trait. [`FfprobeProbe`] is the
//! production implementation; it shells out to `ffprobe`, which accepts both
//! local paths and URLs.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Why a probe produced no usable duration
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The probe program could not be started
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The probe program ran but reported failure
    #[error("probe exited with {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },

    /// Output was not the expected JSON document
    #[error("unparseable probe output: {0}")]
    Parse(String),

    /// Output did not contain a duration
    #[error("probe output has no duration")]
    MissingDuration,

    /// Duration was negative, NaN or infinite
    #[error("invalid duration {0}")]
    InvalidDuration(f64),

    /// The probe did not answer within the configured bound
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}

/// Determines a video's natural playback length in seconds
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Probe `source` (a path or URL, passed through untouched)
    async fn probe(&self, source: &str) -> Result<f64, ProbeError>;
}

/// `ffprobe`-backed duration probe
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    program: PathBuf,
}

impl FfprobeProbe {
    /// Use the given ffprobe executable
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[async_trait]
impl DurationProbe for FfprobeProbe {
    async fn probe(&self, source: &str) -> Result<f64, ProbeError> {
        debug!("Probing duration of {}", source);

        // kill_on_drop: an abandoned probe (timeout) must not leave a child behind
        let output = Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "json",
            ])
            .arg(source)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProbeError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProbeError::ExitStatus {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_ffprobe_output(&output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    duration: Option<serde_json::Value>,
}

/// Extract `format.duration` (seconds) from `ffprobe -of json` output.
///
/// ffprobe prints the duration as a string (`"12.500000"`); a bare number is
/// accepted as well.
pub fn parse_ffprobe_output(stdout: &[u8]) -> Result<f64, ProbeError> {
    let parsed: FfprobeOutput =
        serde_json::from_slice(stdout).map_err(|e| ProbeError::Parse(e.to_string()))?;

    let raw = parsed
        .format
        .and_then(|format| format.duration)
        .ok_or(ProbeError::MissingDuration)?;

    let seconds = match raw {
        serde_json::Value::Number(n) => n.as_f64().ok_or(ProbeError::MissingDuration)?,
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ProbeError::Parse(format!("duration '{}' is not a number", s)))?,
        _ => return Err(ProbeError::MissingDuration),
    };

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ProbeError::InvalidDuration(seconds));
    }

    Ok(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_string_duration() {
        let out = br#"{"format": {"duration": "12.500000"}}"#;
        assert_eq!(parse_ffprobe_output(out).unwrap(), 12.5);
    }

    #[test]
    fn test_parse_numeric_duration() {
        let out = br#"{"format": {"duration": 3}}"#;
        assert_eq!(parse_ffprobe_output(out).unwrap(), 3.0);
    }

    #[test]
    fn test_parse_missing_duration() {
        assert!(matches!(
            parse_ffprobe_output(br#"{"format": {}}"#),
            Err(ProbeError::MissingDuration)
        ));
        assert!(matches!(
            parse_ffprobe_output(br#"{}"#),
            Err(ProbeError::MissingDuration)
        ));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_ffprobe_output(b"not json"),
            Err(ProbeError::Parse(_))
        ));
        assert!(matches!(
            parse_ffprobe_output(br#"{"format": {"duration": "N/A"}}"#),
            Err(ProbeError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_negative_duration() {
        assert!(matches!(
            parse_ffprobe_output(br#"{"format": {"duration": "-1.0"}}"#),
            Err(ProbeError::InvalidDuration(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let probe = FfprobeProbe::new("/nonexistent/ffprobe-for-tests");
        let result = probe.probe("b.mp4").await;
        assert!(matches!(result, Err(ProbeError::Spawn { .. })));
    }
}
