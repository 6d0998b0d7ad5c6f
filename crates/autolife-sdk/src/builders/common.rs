//! Helpers shared by the iOS stages.
//!
//! All errors name the path or command involved so the console message is
//! actionable on its own.

use std::fs;
use std::path::{Path, PathBuf};

use crate::runner::{Invocation, ProcessRunner};
use crate::types::{AutolifeError, ProjectTarget, Stage};
use crate::ui;

/// Finds the Xcode workspace or project in `dir` (non-recursive).
///
/// Any `*.xcworkspace` wins over any `*.xcodeproj`. Within a pattern,
/// entries are taken in file name order. The returned path is relative to
/// `dir`, which is where `xcodebuild` runs.
pub fn locate_project(dir: &Path) -> Option<ProjectTarget> {
    ui::info("Auto-detecting Xcode workspace/project...");

    if let Some(name) = first_with_extension(dir, "xcworkspace") {
        ui::success(&format!("Found workspace: {}", name.display()));
        return Some(ProjectTarget::Workspace(name));
    }
    if let Some(name) = first_with_extension(dir, "xcodeproj") {
        ui::success(&format!("Found project: {}", name.display()));
        return Some(ProjectTarget::Project(name));
    }

    ui::warning("No workspace or project found in current directory");
    None
}

fn first_with_extension(dir: &Path, extension: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut names: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| PathBuf::from(entry.file_name()))
        .filter(|name| name.extension().and_then(|e| e.to_str()) == Some(extension))
        .collect();
    names.sort();
    names.into_iter().next()
}

/// Creates `path` and its parents, mapping failures to
/// [`AutolifeError::CreateDir`].
pub fn ensure_dir(path: &Path) -> Result<(), AutolifeError> {
    fs::create_dir_all(path).map_err(|source| AutolifeError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves `path` against `base` unless it is already absolute.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Runs one stage's tool invocation, turning a non-zero exit into
/// [`AutolifeError::Tool`].
pub fn run_stage(
    runner: &dyn ProcessRunner,
    stage: Stage,
    invocation: &Invocation,
) -> Result<(), AutolifeError> {
    ui::info(&format!("Executing: {}", invocation.display()));
    let status = runner.run(invocation)?;
    if !status.success() {
        tracing::error!(%stage, %status, "tool exited unsuccessfully");
        return Err(AutolifeError::Tool { stage, status });
    }
    Ok(())
}
