//! Speech rendering engines

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, SpeechError};

/// Renders text as audible speech
///
/// `speak` resolves once playback has finished or failed.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    async fn speak(&self, text: &str) -> Result<()>;
}

/// Speaks by running an external program with the text as its last argument
///
/// Works with `espeak-ng`, `say`, `spd-say` and similar tools.
#[derive(Debug, Clone)]
pub struct CommandSpeechEngine {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSpeechEngine {
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            name: program.clone(),
            program,
            args: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Arguments placed before the text
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Upper bound on one utterance. Default: 60 seconds
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl SpeechEngine for CommandSpeechEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn speak(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyText);
        }
        debug!(engine = %self.name, chars = text.len(), "Rendering speech");

        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(text).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                return Err(SpeechError::EngineUnavailable(format!(
                    "{}: {}",
                    self.program, e
                )));
            }
            Ok(Err(e)) => return Err(SpeechError::Io(e)),
            Err(_) => {
                return Err(SpeechError::Timeout {
                    engine: self.name.clone(),
                    after: self.timeout,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SpeechError::RenderFailed {
                engine: self.name.clone(),
                reason: match output.status.code() {
                    Some(code) if stderr.is_empty() => format!("exit status {}", code),
                    Some(code) => format!("exit status {}: {}", code, stderr),
                    None => "terminated by signal".to_string(),
                },
            });
        }
        Ok(())
    }
}

/// Writes utterances to the log instead of speaking them
///
/// Used as the last-resort fallback and on hosts without audio.
#[derive(Debug, Clone, Default)]
pub struct LogSpeechEngine;

#[async_trait]
impl SpeechEngine for LogSpeechEngine {
    fn name(&self) -> &str {
        "log"
    }

    async fn speak(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyText);
        }
        info!(text, "Commentary");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let engine = CommandSpeechEngine::new("btdj-no-such-speech-program");
        let result = engine.speak("hello").await;
        assert!(matches!(result, Err(SpeechError::EngineUnavailable(_))));
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let engine = CommandSpeechEngine::new("true");
        assert!(matches!(engine.speak("   ").await, Err(SpeechError::EmptyText)));
        assert!(matches!(LogSpeechEngine.speak("").await, Err(SpeechError::EmptyText)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_text_is_last_argument() {
        // sh -c 'script' name arg1: the text lands in $1
        let engine = CommandSpeechEngine::new("sh").with_args(["-c", "test \"$1\" = 'Now playing'", "speak"]);
        assert!(engine.speak("Now playing").await.is_ok());
        assert!(engine.speak("Something else").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_reports_exit_status() {
        let engine = CommandSpeechEngine::new("sh")
            .with_args(["-c", "echo boom >&2; exit 2", "speak"])
            .with_name("failing");

        match engine.speak("hi").await {
            Err(SpeechError::RenderFailed { engine, reason }) => {
                assert_eq!(engine, "failing");
                assert!(reason.contains("exit status 2"));
                assert!(reason.contains("boom"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hanging_engine_times_out() {
        let engine = CommandSpeechEngine::new("sh")
            .with_args(["-c", "sleep 5", "speak"])
            .with_timeout(Duration::from_millis(100));

        assert!(matches!(
            engine.speak("hi").await,
            Err(SpeechError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_log_engine_always_succeeds() {
        assert!(LogSpeechEngine.speak("Up next").await.is_ok());
        assert_eq!(LogSpeechEngine.name(), "log");
    }
}
