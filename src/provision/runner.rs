// Copyright (c) 2025 - Cowboy AI, Inc.
//! External command execution
//!
//! `CommandRunner` is the seam between the provisioning pipeline and the
//! configuration-management tools. `ShellRunner` spawns real processes;
//! `RecordingRunner` records every command and answers from a script.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::FormationResult;

/// One external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Space separated command line, for logs and assertions
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Exit status and captured output of a finished command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            status: Some(0),
            ..Self::default()
        }
    }

    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }

    /// Short description of a failed run
    pub fn describe(&self) -> String {
        let status = match self.status {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, stderr)
        }
    }
}

/// Runs external commands to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` and wait for it to exit
    ///
    /// A non-zero exit is a successful call; only failure to spawn is an
    /// error.
    async fn run(&self, command: &CommandSpec) -> FormationResult<CommandOutput>;
}

/// Runner that spawns real processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &CommandSpec) -> FormationResult<CommandOutput> {
        debug!(command = %command, "Running command");

        let mut process = tokio::process::Command::new(&command.program);
        process.args(&command.args).kill_on_drop(true);
        if let Some(dir) = &command.cwd {
            process.current_dir(dir);
        }

        let output = process.output().await?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[derive(Debug, Default)]
struct Script {
    commands: Vec<CommandSpec>,
    /// Command line prefix → scripted output
    responses: Vec<(String, CommandOutput)>,
}

/// Runner that records commands instead of spawning them
///
/// Every command succeeds unless its command line starts with a prefix
/// registered through [`RecordingRunner::respond`]. Cloning shares state.
#[derive(Debug, Clone, Default)]
pub struct RecordingRunner {
    script: Arc<Mutex<Script>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands whose line starts with `prefix` with `output`
    pub async fn respond(&self, prefix: &str, output: CommandOutput) {
        self.script
            .lock()
            .await
            .responses
            .push((prefix.to_string(), output));
    }

    /// Fail commands whose line starts with `prefix`
    pub async fn fail(&self, prefix: &str, stderr: &str) {
        self.respond(prefix, CommandOutput::failure(1, stderr)).await;
    }

    pub async fn commands(&self) -> Vec<CommandSpec> {
        self.script.lock().await.commands.clone()
    }

    pub async fn command_lines(&self) -> Vec<String> {
        self.commands()
            .await
            .iter()
            .map(CommandSpec::command_line)
            .collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &CommandSpec) -> FormationResult<CommandOutput> {
        let mut script = self.script.lock().await;
        script.commands.push(command.clone());

        let line = command.command_line();
        Ok(script
            .responses
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(CommandOutput::success))
    }
}
