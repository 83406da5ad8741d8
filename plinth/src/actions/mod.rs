//! Invocation of privileged actions.
//!
//! Actions are named executables in a fixed directory. The service never
//! composes a shell command line: arguments are passed verbatim, payloads go
//! through stdin and results come back on stdout.

mod process;

pub use process::ProcessRunner;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Failed to start action {action}: {source}")]
    Spawn {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to pass input to action {action}: {source}")]
    Input {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Action {action} failed ({}): {stderr}", .code.map_or_else(|| "killed".to_string(), |c| format!("exit code {c}")))]
    Failed {
        action: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl ActionError {
    /// Exit code of a failed action, if it ran to completion.
    pub fn code(&self) -> Option<i32> {
        match self {
            ActionError::Failed { code, .. } => *code,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub superuser: bool,
    pub input: Option<Vec<u8>>,
    /// Return as soon as the process has started, without collecting output.
    pub background: bool,
}

#[async_trait]
pub trait Actions: Send + Sync {
    async fn execute(
        &self,
        action: &str,
        args: &[&str],
        options: RunOptions,
    ) -> Result<Vec<u8>, ActionError>;

    async fn run(&self, action: &str, args: &[&str]) -> Result<Vec<u8>, ActionError> {
        self.execute(action, args, RunOptions::default()).await
    }

    async fn superuser_run(&self, action: &str, args: &[&str]) -> Result<Vec<u8>, ActionError> {
        let options = RunOptions {
            superuser: true,
            ..Default::default()
        };
        self.execute(action, args, options).await
    }

    async fn superuser_run_with_input(
        &self,
        action: &str,
        args: &[&str],
        input: Vec<u8>,
    ) -> Result<Vec<u8>, ActionError> {
        let options = RunOptions {
            superuser: true,
            input: Some(input),
            background: false,
        };
        self.execute(action, args, options).await
    }

    async fn superuser_run_in_background(
        &self,
        action: &str,
        args: &[&str],
    ) -> Result<(), ActionError> {
        let options = RunOptions {
            superuser: true,
            input: None,
            background: true,
        };
        self.execute(action, args, options).await.map(|_| ())
    }
}

/// Interpret the `true`/`false` answer printed by query actions.
pub fn output_is_true(output: &[u8]) -> bool {
    String::from_utf8_lossy(output).trim() == "true"
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Call {
        pub action: String,
        pub args: Vec<String>,
        pub superuser: bool,
        pub input: Option<Vec<u8>>,
    }

    /// Records invocations and answers from a table of canned outputs keyed
    /// by `"<action> <first arg>"`.
    #[derive(Default)]
    pub struct RecordingActions {
        pub calls: Mutex<Vec<Call>>,
        pub outputs: Mutex<HashMap<String, Vec<u8>>>,
        pub failures: Mutex<HashMap<String, i32>>,
    }

    impl RecordingActions {
        pub fn respond(&self, key: &str, output: &str) {
            self.outputs
                .lock()
                .unwrap()
                .insert(key.to_string(), output.as_bytes().to_vec());
        }

        pub fn fail(&self, key: &str, code: i32) {
            self.failures.lock().unwrap().insert(key.to_string(), code);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn commands(&self) -> Vec<String> {
            self.calls()
                .iter()
                .map(|c| format!("{} {}", c.action, c.args.join(" ")))
                .collect()
        }
    }

    #[async_trait]
    impl Actions for RecordingActions {
        async fn execute(
            &self,
            action: &str,
            args: &[&str],
            options: RunOptions,
        ) -> Result<Vec<u8>, ActionError> {
            self.calls.lock().unwrap().push(Call {
                action: action.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
                superuser: options.superuser,
                input: options.input,
            });

            let key = format!("{action} {}", args.first().copied().unwrap_or_default());
            if let Some(code) = self.failures.lock().unwrap().get(&key) {
                return Err(ActionError::Failed {
                    action: action.to_string(),
                    code: Some(*code),
                    stderr: format!("{key} failed"),
                });
            }
            Ok(self
                .outputs
                .lock()
                .unwrap()
                .get(&key)
                .cloned()
                .unwrap_or_default())
        }
    }
}
