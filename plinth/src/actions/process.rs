use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{ActionError, Actions, RunOptions};

/// Runs actions as child processes, prefixed with the superuser command
/// (normally `sudo -n`) when requested.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    actions_dir: PathBuf,
    superuser_command: Vec<String>,
}

impl ProcessRunner {
    pub fn new(actions_dir: impl Into<PathBuf>, superuser_command: Vec<String>) -> Self {
        Self {
            actions_dir: actions_dir.into(),
            superuser_command,
        }
    }

    fn resolve(&self, action: &str) -> Result<PathBuf, ActionError> {
        let valid = !action.is_empty()
            && action
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ActionError::UnknownAction(action.to_string()));
        }

        let path = self.actions_dir.join(action);
        if !path.is_file() {
            return Err(ActionError::UnknownAction(action.to_string()));
        }
        Ok(path)
    }

    fn command(&self, path: &Path, args: &[&str], superuser: bool) -> Command {
        let mut command = match self.superuser_command.split_first() {
            Some((program, prefix)) if superuser => {
                let mut command = Command::new(program);
                command.args(prefix).arg(path);
                command
            }
            _ => Command::new(path),
        };
        command.args(args);
        command
    }
}

#[async_trait]
impl Actions for ProcessRunner {
    async fn execute(
        &self,
        action: &str,
        args: &[&str],
        options: RunOptions,
    ) -> Result<Vec<u8>, ActionError> {
        let path = self.resolve(action)?;
        let mut command = self.command(&path, args, options.superuser);

        tracing::info!(
            action,
            ?args,
            superuser = options.superuser,
            background = options.background,
            "Running action"
        );

        let stdin = if options.input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        command.stdin(stdin);

        if options.background {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        } else {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let mut child = command.spawn().map_err(|source| ActionError::Spawn {
            action: action.to_string(),
            source,
        })?;

        let writer = match (options.input, child.stdin.take()) {
            (Some(input), Some(mut stdin)) => Some(tokio::spawn(async move {
                let result = stdin.write_all(&input).await;
                drop(stdin);
                result
            })),
            _ => None,
        };

        if options.background {
            let name = action.to_string();
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) if status.success() => {
                        tracing::info!("Background action {name} finished");
                    }
                    Ok(status) => {
                        tracing::error!("Background action {name} failed: {status}");
                    }
                    Err(e) => tracing::error!("Background action {name} lost: {e}"),
                }
            });
            return Ok(Vec::new());
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ActionError::Spawn {
                action: action.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(
                action,
                code = output.status.code(),
                "Action failed: {stderr}"
            );
            return Err(ActionError::Failed {
                action: action.to_string(),
                code: output.status.code(),
                stderr,
            });
        }

        // The child may exit without consuming all input; only a failed write
        // to a process that went on to succeed is reported.
        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(source)) => {
                    return Err(ActionError::Input {
                        action: action.to_string(),
                        source,
                    })
                }
                Err(e) => {
                    return Err(ActionError::Input {
                        action: action.to_string(),
                        source: std::io::Error::other(e),
                    })
                }
            }
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    // Scripts are handed to `sh` instead of being executed directly, so the
    // freshly written files never need an exec bit.
    fn runner_with(scripts: &[(&str, &str)], superuser_command: &[&str]) -> (TempDir, ProcessRunner) {
        let dir = TempDir::new().unwrap();
        for (name, body) in scripts {
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        let runner = ProcessRunner::new(
            dir.path(),
            superuser_command.iter().map(|s| s.to_string()).collect(),
        );
        (dir, runner)
    }

    #[tokio::test]
    async fn test_arguments_are_passed_verbatim() {
        let (_dir, runner) = runner_with(&[("echo-args", "printf '%s\\n' \"$@\"\n")], &["sh"]);
        let output = runner
            .superuser_run("echo-args", &["two words", "$(id)", "a;b"])
            .await
            .unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "two words\n$(id)\na;b\n");
    }

    #[tokio::test]
    async fn test_input_is_delivered_on_stdin() {
        let (_dir, runner) = runner_with(&[("cat-input", "cat\n")], &["sh"]);
        let output = runner
            .superuser_run_with_input("cat-input", &[], br#"{"encryption_passphrase":"s3cret"}"#.to_vec())
            .await
            .unwrap();
        assert_eq!(output, br#"{"encryption_passphrase":"s3cret"}"#);
    }

    #[tokio::test]
    async fn test_failure_carries_code_and_stderr() {
        let (_dir, runner) = runner_with(&[("fail", "echo boom >&2\nexit 3\n")], &["sh"]);
        let err = runner.superuser_run("fail", &[]).await.unwrap_err();
        match err {
            ActionError::Failed { action, code, stderr } => {
                assert_eq!(action, "fail");
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_actions_are_rejected() {
        let (_dir, runner) = runner_with(&[], &["sh"]);
        for name in ["missing", "../bin/sh", "", "a b"] {
            let err = runner.superuser_run(name, &[]).await.unwrap_err();
            assert!(matches!(err, ActionError::UnknownAction(_)), "{name}");
        }
    }

    #[tokio::test]
    async fn test_superuser_prefix_only_for_superuser_runs() {
        let (dir, runner) = runner_with(
            &[("whoami", "echo \"${PLINTH_SUPERUSER:-no}\"\n")],
            &["env", "PLINTH_SUPERUSER=yes", "sh"],
        );
        let output = runner.superuser_run("whoami", &[]).await.unwrap();
        assert_eq!(String::from_utf8(output).unwrap().trim(), "yes");

        let command = runner.command(&dir.path().join("whoami"), &["x"], false);
        assert_eq!(command.as_std().get_program(), dir.path().join("whoami").as_os_str());
    }

    #[tokio::test]
    async fn test_background_returns_before_completion() {
        let (dir, runner) = runner_with(&[("slow", "sleep 0.2\ntouch \"$1\"\n")], &["sh"]);
        let marker = dir.path().join("done");
        let marker_arg = marker.to_string_lossy().to_string();

        runner
            .superuser_run_in_background("slow", &[&marker_arg])
            .await
            .unwrap();
        assert!(!marker.exists());

        for _ in 0..50 {
            if marker.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("background action did not complete");
    }
}
