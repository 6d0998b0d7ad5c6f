//! iOS build pipeline SDK
//!
//! `autolife-sdk` drives an Xcode project from source to TestFlight:
//! locate the workspace, install dependencies, build, archive, export an
//! `.ipa` and optionally upload it with `xcrun altool`.
//!
//! # Architecture
//!
//! - **Types**: [`BuildTarget`], [`SigningPolicy`], [`ExportSettings`] and
//!   [`CredentialSet`] describe the inputs; [`AutolifeError`] is the single
//!   error type
//! - **Runner**: every external tool goes through a [`runner::ProcessRunner`],
//!   so a [`runner::RecordingRunner`] can stand in for real processes
//! - **Builders**: [`builders::IosBuilder`] implements one method per stage
//! - **Pipeline**: [`pipeline::run_build_pipeline`] sequences the stages and
//!   asks before uploading
//! - **Other languages**: [`builders::StandardBuilder`] runs configured or
//!   default install, build and test commands
//! - **Checkout**: [`git::sync_repository`] clones or updates the repository
//!
//! # Example
//!
//! ```no_run
//! use autolife_sdk::builders::IosBuilder;
//! use autolife_sdk::pipeline::{StdinConfirm, run_build_pipeline};
//! use autolife_sdk::runner::SystemRunner;
//! use autolife_sdk::{BuildTarget, ExportSettings, SigningPolicy};
//!
//! fn main() -> Result<(), autolife_sdk::AutolifeError> {
//!     let runner = SystemRunner;
//!     let signing = SigningPolicy::Manual {
//!         code_sign_identity: "Apple Distribution".into(),
//!         provisioning_profile: "AppStore".into(),
//!         team_id: "ABCDE12345".into(),
//!     };
//!     let mut builder = IosBuilder::new(&runner, "MyApp", BuildTarget::new("MyApp"), signing)
//!         .export_settings(ExportSettings {
//!             project_name: Some("MyApp".into()),
//!             ..Default::default()
//!         });
//!
//!     let outcome = run_build_pipeline(&mut builder, false, &mut StdinConfirm)?;
//!     println!("IPA: {}", outcome.ipa().display());
//!     Ok(())
//! }
//! ```

pub mod builders;
pub mod git;
pub mod pipeline;
pub mod runner;
pub mod types;
pub mod ui;

pub use pipeline::{PipelineOutcome, WorkingDirGuard};
pub use runner::{Invocation, ProcessRunner, RecordingRunner, SystemRunner};
pub use types::{
    ApiKey, AppleAccount, AutolifeError, BuildTarget, CredentialSet, ExportSettings,
    ProjectTarget, SigningPolicy, Stage, ToolStatus, UploadCredentials,
};

/// Library version, matching `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
