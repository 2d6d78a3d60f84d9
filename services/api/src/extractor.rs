//! Extraction Invoker
//!
//! Runs the external document-extraction process against a staged file and
//! turns its stdout into extracted text. The process contract is
//! `<interpreter> <script> <file_path>`: one self-contained JSON object on
//! stdout and exit code 0 for success, diagnostics on stderr otherwise.
//!
//! Extractors in the wild do not always honor that contract, so parsing has
//! two policies. `Strict` enforces the JSON envelope (`success` or `error`
//! must be present). `Lenient` is the opt-in compatibility mode that accepts
//! whatever text the process produced, preferring the `text`/`data` fields
//! of any JSON object it can recover.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

/// How stdout that deviates from the JSON envelope contract is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputPolicy {
    /// Enforce the envelope; malformed output is an error.
    #[default]
    Strict,
    /// Accept malformed output, falling back to the raw stdout text.
    Lenient,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Spawning the process or collecting its piped output failed.
    #[error("extraction process I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("extraction process exceeded the {0:?} timeout and was killed")]
    Timeout(Duration),
    #[error("extraction process exited with failure: {stderr}")]
    ProcessFailed { stderr: String },
    #[error("extraction process produced no readable JSON output")]
    UnreadableOutput,
    #[error("extraction process reported an error: {0}")]
    Reported(String),
    #[error("unexpected processor response: neither a success flag nor an error field")]
    UnexpectedResponse,
}

/// A successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Extracted text content, possibly empty.
    pub content: String,
}

/// Handle on the configured external extraction process.
#[derive(Debug, Clone)]
pub struct Extractor {
    interpreter: String,
    script: PathBuf,
    timeout: Duration,
}

impl Extractor {
    pub fn new(
        interpreter: impl Into<String>,
        script: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            timeout,
        }
    }

    /// Runs the extraction process against `file` and parses its output.
    ///
    /// The caller owns the file's lifetime; it must exist for the duration
    /// of the call. The spawned child is bounded by the configured timeout
    /// and reaped on every path, including the timeout path, so no process
    /// or descriptor outlives the call.
    pub async fn extract(
        &self,
        file: &Path,
        policy: OutputPolicy,
    ) -> Result<Extraction, ExtractError> {
        debug!(
            interpreter = %self.interpreter,
            script = %self.script.display(),
            file = %file.display(),
            "invoking extraction process"
        );

        let output = Command::new(&self.interpreter)
            .arg(&self.script)
            .arg(file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the future on timeout must kill the child.
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout = ?self.timeout, "extraction process timed out");
                return Err(ExtractError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(status = ?output.status, %stderr, "extraction process failed");
            return Err(ExtractError::ProcessFailed { stderr });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        parse_output(&stdout, policy)
    }
}

/// Recovers the JSON envelope from the process's stdout.
///
/// First the whole buffer is tried as one JSON object. Failing that, lines
/// are scanned from the last backward for the first that is itself a
/// complete JSON object, which tolerates extractors that log above their
/// final result line.
fn recover_envelope(stdout: &str) -> Option<Value> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(stdout.trim()) {
        return Some(value);
    }
    for line in stdout.lines().rev() {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(line.trim()) {
            return Some(value);
        }
    }
    None
}

fn string_field(envelope: &Value, key: &str) -> Option<String> {
    envelope.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_output(stdout: &str, policy: OutputPolicy) -> Result<Extraction, ExtractError> {
    let Some(envelope) = recover_envelope(stdout) else {
        return match policy {
            OutputPolicy::Lenient => Ok(Extraction {
                content: stdout.to_string(),
            }),
            OutputPolicy::Strict => Err(ExtractError::UnreadableOutput),
        };
    };

    match policy {
        OutputPolicy::Lenient => {
            let content = string_field(&envelope, "text")
                .or_else(|| string_field(&envelope, "data"))
                .unwrap_or_else(|| stdout.to_string());
            Ok(Extraction { content })
        }
        OutputPolicy::Strict => {
            if let Some(message) = string_field(&envelope, "error") {
                return Err(ExtractError::Reported(message));
            }
            if envelope.get("success").is_none() {
                return Err(ExtractError::UnexpectedResponse);
            }
            let content = string_field(&envelope, "data")
                .or_else(|| string_field(&envelope, "text"))
                .unwrap_or_default();
            Ok(Extraction { content })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Writes a shell script acting as the extraction process and returns
    /// an extractor that runs it through `sh`.
    fn fake_extractor(dir: &tempfile::TempDir, body: &str) -> Extractor {
        let script = dir.path().join("extract.sh");
        let mut file = std::fs::File::create(&script).unwrap();
        writeln!(file, "{body}").unwrap();
        Extractor::new("sh", script, Duration::from_secs(5))
    }

    fn input_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("upload.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        path
    }

    #[tokio::test]
    async fn clean_json_text_field_extracts() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = fake_extractor(&dir, r#"echo '{"text":"hello"}'"#);
        let result = extractor
            .extract(&input_file(&dir), OutputPolicy::Lenient)
            .await
            .unwrap();
        assert_eq!(result.content, "hello");
    }

    #[tokio::test]
    async fn strict_success_envelope_extracts_data() {
        let dir = tempfile::tempdir().unwrap();
        let extractor =
            fake_extractor(&dir, r#"echo '{"success":true,"data":"compressed notes"}'"#);
        let result = extractor
            .extract(&input_file(&dir), OutputPolicy::Strict)
            .await
            .unwrap();
        assert_eq!(result.content, "compressed notes");
    }

    #[tokio::test]
    async fn trailing_json_line_is_recovered_from_noisy_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = fake_extractor(
            &dir,
            "echo 'loading model...'\necho 'pages: 12'\necho '{\"success\":true}'",
        );
        let result = extractor
            .extract(&input_file(&dir), OutputPolicy::Strict)
            .await
            .unwrap();
        assert_eq!(result.content, "");
    }

    #[tokio::test]
    async fn nonzero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = fake_extractor(&dir, "echo 'boom: unreadable pdf' >&2\nexit 1");
        let err = extractor
            .extract(&input_file(&dir), OutputPolicy::Lenient)
            .await
            .unwrap_err();
        match err {
            ExtractError::ProcessFailed { stderr } => {
                assert!(stderr.contains("boom: unreadable pdf"))
            }
            other => panic!("expected ProcessFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lenient_falls_back_to_raw_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = fake_extractor(&dir, "echo 'just some plain text'");
        let result = extractor
            .extract(&input_file(&dir), OutputPolicy::Lenient)
            .await
            .unwrap();
        assert_eq!(result.content.trim(), "just some plain text");
    }

    #[tokio::test]
    async fn strict_rejects_unreadable_output() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = fake_extractor(&dir, "echo 'just some plain text'");
        let err = extractor
            .extract(&input_file(&dir), OutputPolicy::Strict)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::UnreadableOutput));
    }

    #[tokio::test]
    async fn strict_surfaces_reported_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = fake_extractor(&dir, r#"echo '{"error":"File not found: x.pdf"}'"#);
        let err = extractor
            .extract(&input_file(&dir), OutputPolicy::Strict)
            .await
            .unwrap_err();
        match err {
            ExtractError::Reported(message) => assert!(message.contains("File not found")),
            other => panic!("expected Reported, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn strict_rejects_envelope_without_success_or_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = fake_extractor(&dir, r#"echo '{"pages":3}'"#);
        let err = extractor
            .extract(&input_file(&dir), OutputPolicy::Strict)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::UnexpectedResponse));
    }

    #[tokio::test]
    async fn slow_process_is_killed_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("extract.sh");
        std::fs::write(&script, "sleep 10\necho '{\"success\":true}'").unwrap();
        let extractor = Extractor::new("sh", &script, Duration::from_millis(200));
        let err = extractor
            .extract(&input_file(&dir), OutputPolicy::Strict)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Timeout(_)));
    }

    #[tokio::test]
    async fn missing_interpreter_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Extractor::new(
            "studeo-no-such-interpreter",
            dir.path().join("extract.sh"),
            Duration::from_secs(1),
        );
        let err = extractor
            .extract(&input_file(&dir), OutputPolicy::Strict)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
        assert!(err.to_string().starts_with("extraction process I/O failed"));
    }

    #[test]
    fn lenient_prefers_text_over_data() {
        let parsed = parse_output(r#"{"text":"a","data":"b"}"#, OutputPolicy::Lenient).unwrap();
        assert_eq!(parsed.content, "a");
    }

    #[test]
    fn lenient_envelope_without_content_fields_keeps_raw_buffer() {
        let raw = r#"{"pages":3}"#;
        let parsed = parse_output(raw, OutputPolicy::Lenient).unwrap();
        assert_eq!(parsed.content, raw);
    }
}
