//! Process and environment access for the checks.
//!
//! Checks never call `std::process` directly; they go through
//! [`CommandRunner`] so a whole report can be produced against a scripted
//! environment.

use std::io;
use std::process::Command;
use thiserror::Error;

/// Why a check command produced no output at all.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{program}: not found")]
    NotFound { program: String },

    #[error("{program}: failed to start: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Captured result of a command that ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// First line of stdout, falling back to stderr (some tools print their
    /// version there).
    pub fn first_line(&self) -> &str {
        let primary = self.stdout.lines().next().unwrap_or("").trim();
        if primary.is_empty() {
            self.stderr.lines().next().unwrap_or("").trim()
        } else {
            primary
        }
    }
}

pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError>;

    fn env_var(&self, key: &str) -> Option<String>;
}

/// Runs real processes and reads the real environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        let output = Command::new(program).args(args).output().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                CommandError::NotFound {
                    program: program.to_string(),
                }
            } else {
                CommandError::Spawn {
                    program: program.to_string(),
                    source: e,
                }
            }
        })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn env_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_prefers_stdout() {
        let out = CommandOutput::ok("git version 2.43.0\nextra\n");
        assert_eq!(out.first_line(), "git version 2.43.0");

        let out = CommandOutput {
            success: true,
            stdout: String::new(),
            stderr: "Python 2.7.18\n".into(),
        };
        assert_eq!(out.first_line(), "Python 2.7.18");
    }

    #[test]
    fn missing_program_is_not_found() {
        let err = SystemRunner
            .run("definitely-not-a-real-binary-4f1c", &["--version"])
            .unwrap_err();
        assert!(matches!(err, CommandError::NotFound { .. }));
    }
}
