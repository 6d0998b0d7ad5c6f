//! Process execution seam.
//!
//! Every external tool (`git`, `xcodebuild`, `xcrun`, `pod`, language build
//! tools) is launched through a [`ProcessRunner`]. The system runner streams
//! the child's output straight to the console; [`RecordingRunner`] records
//! invocations instead, which is what `--dry-run` and the tests use.
//!
//! Environment variables are attached to each [`Invocation`] explicitly. The
//! process environment of the caller is never modified.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::types::{AutolifeError, ToolStatus};

/// Flags whose following argument must never be printed.
const SECRET_FLAGS: &[&str] = &["--password"];

/// A single external command, fully described.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub current_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
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

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// The first positional argument, which for `xcodebuild` is the action.
    pub fn action(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Renders the command line for display, redacting secrets.
    pub fn display(&self) -> String {
        let mut out = self.program.clone();
        let mut redact_next = false;
        for arg in &self.args {
            out.push(' ');
            if redact_next {
                out.push_str("********");
                redact_next = false;
                continue;
            }
            if arg.contains(' ') {
                out.push('"');
                out.push_str(arg);
                out.push('"');
            } else {
                out.push_str(arg);
            }
            redact_next = SECRET_FLAGS.contains(&arg.as_str());
        }
        out
    }
}

/// Runs an external command to completion.
pub trait ProcessRunner {
    /// Runs the command, streaming its output, and blocks until it exits.
    ///
    /// A non-zero exit is reported through [`ToolStatus`]; only a failure to
    /// launch the process is an `Err`.
    fn run(&self, invocation: &Invocation) -> Result<ToolStatus, AutolifeError>;
}

/// Spawns real processes with the console attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolStatus, AutolifeError> {
        tracing::debug!(command = %invocation.display(), "spawning");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .envs(&invocation.env)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &invocation.current_dir {
            cmd.current_dir(dir);
        }

        let status = cmd.status().map_err(|source| AutolifeError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        tracing::debug!(program = %invocation.program, status = ?status.code(), "process exited");
        Ok(ToolStatus {
            code: status.code(),
        })
    }
}

/// Records invocations instead of spawning them.
///
/// By default every invocation succeeds. [`RecordingRunner::fail_on`] makes
/// invocations whose program or first argument matches exit with code 1.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    echo: bool,
    failing: Vec<String>,
    calls: RefCell<Vec<Invocation>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prints each command as it would have run.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Fails every invocation whose program or action equals `selector`.
    pub fn fail_on(mut self, selector: impl Into<String>) -> Self {
        self.failing.push(selector.into());
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Invocations whose program is `program`, in call order.
    pub fn calls_to(&self, program: &str) -> Vec<Invocation> {
        self.calls
            .borrow()
            .iter()
            .filter(|inv| inv.program == program)
            .cloned()
            .collect()
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolStatus, AutolifeError> {
        if self.echo {
            println!("[dry-run] {}", invocation.display());
        }
        self.calls.borrow_mut().push(invocation.clone());

        let fails = self.failing.iter().any(|selector| {
            *selector == invocation.program || Some(selector.as_str()) == invocation.action()
        });
        Ok(if fails {
            ToolStatus::from_code(1)
        } else {
            ToolStatus::SUCCESS
        })
    }
}
