//! OCR provider backed by an external command.

use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::thread;

use tracing::debug;

use crate::error::{OcrError, PipelineError};

use super::{OcrDocument, OcrProvider};

/// Runs a program per page: the image bytes go to its stdin and an OCR
/// document in the service's JSON schema is read from its stdout.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    program: String,
    args: Vec<String>,
}

impl CommandProvider {
    /// Create a provider from a program followed by its arguments.
    pub fn new(argv: &[String]) -> Result<Self, PipelineError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| PipelineError::Config("ocr.command is empty".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl OcrProvider for CommandProvider {
    fn analyze(&self, image: &[u8]) -> Result<OcrDocument, OcrError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| OcrError::Service(format!("failed to start {}: {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::Service("stdin of OCR command unavailable".to_string()))?;
        let bytes = image.to_vec();
        // Fed from a separate thread so a command that writes before it has
        // read everything cannot deadlock on a full pipe.
        let feeder = thread::spawn(move || stdin.write_all(&bytes));

        let output = child
            .wait_with_output()
            .map_err(|e| OcrError::Service(format!("{} did not finish: {}", self.program, e)))?;

        match feeder.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {
                debug!("{} closed stdin early", self.program);
            }
            Ok(Err(e)) => {
                return Err(OcrError::Service(format!(
                    "failed to send image to {}: {}",
                    self.program, e
                )));
            }
            Err(_) => {
                return Err(OcrError::Service("image feeder thread panicked".to_string()));
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Service(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        debug!("{} returned {} bytes", self.program, output.stdout.len());

        serde_json::from_slice(&output.stdout)
            .map_err(|e| OcrError::InvalidResponse(format!("{}: {}", self.program, e)))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_empty_command_is_config_error() {
        let err = CommandProvider::new(&[]).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_reads_document_from_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let response = dir.path().join("response.json");
        std::fs::write(
            &response,
            r#"{"Blocks": [{"BlockType": "LINE", "Id": "l", "Text": "hi", "Confidence": 99.0}]}"#,
        )
        .unwrap();

        let provider = CommandProvider::new(&argv(&[
            "sh",
            "-c",
            "cat > /dev/null; cat \"$0\"",
            response.to_str().unwrap(),
        ]))
        .unwrap();

        let doc = provider.analyze(b"fake image bytes").unwrap();
        assert_eq!(doc.transcript(), "hi");
    }

    #[test]
    fn test_non_zero_exit_is_service_failure() {
        let provider =
            CommandProvider::new(&argv(&["sh", "-c", "cat > /dev/null; echo boom >&2; exit 3"]))
                .unwrap();
        let err = provider.analyze(b"x").unwrap_err();
        match err {
            OcrError::Service(msg) => assert!(msg.contains("boom"), "{}", msg),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_garbage_output_is_invalid_response() {
        let provider =
            CommandProvider::new(&argv(&["sh", "-c", "cat > /dev/null; echo not-json"])).unwrap();
        assert!(matches!(
            provider.analyze(b"x"),
            Err(OcrError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_missing_program_is_service_failure() {
        let provider = CommandProvider::new(&argv(&["/nonexistent/ocr-binary"])).unwrap();
        assert!(matches!(provider.analyze(b"x"), Err(OcrError::Service(_))));
    }
}
