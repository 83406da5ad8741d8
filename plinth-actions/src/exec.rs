//! Running system programs on behalf of an action.
//!
//! Arguments are always passed as a vector; nothing goes through a shell.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

use crate::utils::{ActionsError, Result};

/// A system program invocation.
pub struct SystemCommand<'a> {
    program: &'a str,
    command: Command,
}

impl<'a> SystemCommand<'a> {
    pub fn new<I, S>(program: &'a str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null());
        Self { program, command }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.command.env(key, value);
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.command.current_dir(dir);
        self
    }

    /// Run to completion and return stdout. Non-zero exit is an error.
    pub fn output(mut self) -> Result<Vec<u8>> {
        debug!(program = self.program, "Running {:?}", self.command);
        let output = self.command.output()?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(ActionsError::Command {
                program: self.program.to_string(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Run and discard output.
    pub fn run(self) -> Result<()> {
        self.output().map(|_| ())
    }

    /// Run and report only whether the program exited successfully.
    pub fn succeeds(mut self) -> Result<bool> {
        debug!(program = self.program, "Checking {:?}", self.command);
        let status = self
            .command
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        Ok(status.success())
    }
}
