//! Stage orchestration.
//!
//! iOS: `Locate → InstallDependencies → Build → Archive → Export → (Upload)`.
//! Other languages: `InstallDependencies → Build` or
//! `InstallDependencies → Test`.
//!
//! Dependency installation failures are reported as warnings, including a
//! missing tool; every other stage failure halts the pipeline and is
//! returned unchanged. Nothing is cleaned up after a failure.

use std::env;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::builders::{IosBuilder, StandardBuilder};
use crate::types::{AutolifeError, Stage};
use crate::ui;

/// Changes the process working directory and restores the previous one
/// when dropped, including on early return.
#[derive(Debug)]
pub struct WorkingDirGuard {
    previous: PathBuf,
}

impl WorkingDirGuard {
    pub fn enter(path: &Path) -> Result<Self, AutolifeError> {
        let previous = env::current_dir().map_err(|source| AutolifeError::ProjectDir {
            path: path.to_path_buf(),
            source,
        })?;
        env::set_current_dir(path).map_err(|source| AutolifeError::ProjectDir {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(dir = %path.display(), "entered project directory");
        Ok(Self { previous })
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Err(err) = env::set_current_dir(&self.previous) {
            tracing::warn!(dir = %self.previous.display(), error = %err, "failed to restore working directory");
        }
    }
}

/// Runs `f` with `project_dir` as the working directory.
pub fn run_in<T>(
    project_dir: &Path,
    f: impl FnOnce() -> Result<T, AutolifeError>,
) -> Result<T, AutolifeError> {
    let _guard = WorkingDirGuard::enter(project_dir)?;
    f()
}

/// Yes/no question asked before uploading.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> bool;
}

/// Asks on the terminal. Only `y`/`yes` (any case) is a yes.
#[derive(Debug, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, question: &str) -> bool {
        print!("{question} [y/N]: ");
        let _ = io::stdout().flush();

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// Always gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&mut self, _question: &str) -> bool {
        self.0
    }
}

/// How a successful build pipeline ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Uploaded { ipa: PathBuf },
    /// The user answered no at the upload prompt.
    UploadDeclined { ipa: PathBuf },
    /// Upload was disabled or no credentials were configured.
    UploadSkipped { ipa: PathBuf, reason: String },
}

impl PipelineOutcome {
    pub fn ipa(&self) -> &Path {
        match self {
            PipelineOutcome::Uploaded { ipa }
            | PipelineOutcome::UploadDeclined { ipa }
            | PipelineOutcome::UploadSkipped { ipa, .. } => ipa,
        }
    }
}

/// Downgrades a failure to a warning when `stage` does not halt the
/// pipeline. Launch failures count the same as non-zero exits.
pub fn tolerate<T>(
    stage: Stage,
    result: Result<T, AutolifeError>,
) -> Result<Option<T>, AutolifeError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if !stage.is_fatal() => {
            ui::warning(&format!("Failed {stage}: {err}"));
            tracing::warn!(%stage, error = %err, "continuing after non-fatal failure");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn locate_and_install(builder: &mut IosBuilder<'_>) -> Result<(), AutolifeError> {
    ui::step(1, "Locating Xcode workspace/project");
    builder.locate();

    ui::step(2, "Installing dependencies");
    tolerate(Stage::InstallDependencies, builder.install_dependencies())?;
    Ok(())
}

/// Runs the full build pipeline and, when allowed and confirmed, uploads.
pub fn run_build_pipeline(
    builder: &mut IosBuilder<'_>,
    upload_after_build: bool,
    confirm: &mut dyn Confirm,
) -> Result<PipelineOutcome, AutolifeError> {
    ui::headline(&format!("iOS Build Pipeline: {}", builder.target().scheme));
    locate_and_install(builder)?;

    ui::step(3, "Building");
    builder.build()?;

    ui::step(4, "Archiving");
    let archive = builder.archive()?;

    ui::step(5, "Exporting IPA");
    let ipa = builder.export_ipa(&archive)?;

    let reason = if !upload_after_build {
        "upload_to_testflight is disabled"
    } else if !builder.has_usable_credentials() {
        "no App Store Connect credentials configured"
    } else {
        println!();
        if !confirm.confirm("Upload to TestFlight?") {
            ui::info("Upload skipped");
            ui::manual_upload_hint(&ipa);
            return Ok(PipelineOutcome::UploadDeclined { ipa });
        }
        ui::step(6, "Uploading to TestFlight");
        builder.upload(&ipa)?;
        return Ok(PipelineOutcome::Uploaded { ipa });
    };

    tracing::info!(reason, "skipping TestFlight upload");
    ui::success(&format!("Build complete: {}", ipa.display()));
    ui::manual_upload_hint(&ipa);
    Ok(PipelineOutcome::UploadSkipped {
        ipa,
        reason: reason.to_string(),
    })
}

/// Locates the project, installs dependencies and runs the test action.
pub fn run_test_pipeline(builder: &mut IosBuilder<'_>) -> Result<(), AutolifeError> {
    ui::headline(&format!("iOS Tests: {}", builder.target().scheme));
    locate_and_install(builder)?;

    ui::step(3, "Running tests");
    builder.test()
}

/// Installs dependencies and runs the build command of a non-iOS project.
pub fn run_standard_build_pipeline(builder: &StandardBuilder<'_>) -> Result<(), AutolifeError> {
    ui::step(1, "Installing dependencies");
    tolerate(Stage::InstallDependencies, builder.install_dependencies())?;

    ui::step(2, "Building project");
    builder.build()
}

/// Installs dependencies and runs the test command of a non-iOS project.
pub fn run_standard_test_pipeline(builder: &StandardBuilder<'_>) -> Result<(), AutolifeError> {
    ui::step(1, "Installing dependencies");
    tolerate(Stage::InstallDependencies, builder.install_dependencies())?;

    ui::step(2, "Running tests");
    builder.test()
}
