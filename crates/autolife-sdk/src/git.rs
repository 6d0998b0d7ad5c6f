//! Repository checkout.
//!
//! `start` clones the configured repository into `<cwd>/<name>` or, when
//! that directory is already a working copy, fast-forwards it. Git never
//! prompts: credentials must come from the URL, an SSH agent or a helper
//! that works without a terminal.

use std::collections::BTreeMap;
use std::path::Path;

use crate::builders::common::run_stage;
use crate::runner::{Invocation, ProcessRunner};
use crate::types::{AutolifeError, Stage};
use crate::ui;

/// Environment that keeps `git` and credential managers non-interactive.
const NON_INTERACTIVE_ENV: &[(&str, &str)] = &[
    ("GIT_TERMINAL_PROMPT", "0"),
    ("GCM_INTERACTIVE", "never"),
    ("GIT_ASKPASS", "echo"),
];

/// What [`sync_repository`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Cloned,
    Pulled,
}

/// A branch worth naming on the command line. `main` is left to the
/// remote's default so repositories still on `master` clone too.
fn explicit_branch(branch: Option<&str>) -> Option<&str> {
    branch.filter(|b| !b.is_empty() && *b != "main")
}

fn non_interactive(invocation: Invocation, env: &BTreeMap<String, String>) -> Invocation {
    NON_INTERACTIVE_ENV
        .iter()
        .fold(invocation.envs(env), |inv, (key, value)| inv.env(*key, *value))
}

/// `git clone [--branch <branch>] <url> <dest>`.
pub fn clone_invocation(repo_url: &str, branch: Option<&str>, dest: &Path) -> Invocation {
    let mut invocation = Invocation::new("git").arg("clone");
    if let Some(branch) = explicit_branch(branch) {
        invocation = invocation.args(["--branch", branch]);
    }
    invocation
        .arg(repo_url)
        .arg(dest.display().to_string())
}

/// `git pull --ff-only`, run inside the working copy.
pub fn pull_invocation(dir: &Path) -> Invocation {
    Invocation::new("git")
        .args(["pull", "--ff-only"])
        .current_dir(dir)
}

/// Clones `repo_url` into `dest`, or pulls when `dest` is already a clone.
///
/// A `dest` that exists without a `.git` entry is refused rather than
/// cloned over.
pub fn sync_repository(
    runner: &dyn ProcessRunner,
    repo_url: &str,
    branch: Option<&str>,
    dest: &Path,
    env: &BTreeMap<String, String>,
) -> Result<SyncOutcome, AutolifeError> {
    if dest.join(".git").exists() {
        ui::info(&format!("Updating existing clone in {}", dest.display()));
        run_stage(runner, Stage::Checkout, &non_interactive(pull_invocation(dest), env))?;
        return Ok(SyncOutcome::Pulled);
    }
    if dest.exists() {
        return Err(AutolifeError::Config(format!(
            "{} exists but is not a git repository",
            dest.display()
        )));
    }

    match explicit_branch(branch) {
        Some(branch) => ui::info(&format!("Cloning repository (branch: {branch})...")),
        None => ui::info("Cloning repository..."),
    }
    let mut invocation = clone_invocation(repo_url, branch, dest);
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        invocation = invocation.current_dir(parent);
    }
    run_stage(runner, Stage::Checkout, &non_interactive(invocation, env))?;
    tracing::info!(dest = %dest.display(), "repository cloned");
    Ok(SyncOutcome::Cloned)
}
