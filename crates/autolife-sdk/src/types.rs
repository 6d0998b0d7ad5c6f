//! Core types for autolife-sdk.
//!
//! This module defines the inputs every stage consumes and the single error
//! type they return:
//!
//! - [`AutolifeError`] - Error types for every pipeline stage
//! - [`Stage`] - The pipeline states, in execution order
//! - [`BuildTarget`] / [`ProjectTarget`] - What `xcodebuild` should build
//! - [`SigningPolicy`] - Automatic vs. manual code signing
//! - [`ExportSettings`] - Export method, team and output directory
//! - [`CredentialSet`] / [`UploadCredentials`] - App Store Connect credentials

use std::fmt;
use std::path::PathBuf;

/// SDK used for archives and device builds.
pub const DEVICE_SDK: &str = "iphoneos";

/// SDK used for tests unless another SDK is configured.
pub const SIMULATOR_SDK: &str = "iphonesimulator";

/// Destination passed to `xcodebuild test` when running on the simulator.
pub const DEFAULT_SIMULATOR_DESTINATION: &str = "platform=iOS Simulator,name=iPhone 15";

/// File name of the archive when no archive path is configured.
pub const DEFAULT_ARCHIVE_NAME: &str = "app.xcarchive";

/// File name of the generated export options property list.
pub const EXPORT_OPTIONS_FILE: &str = "ExportOptions.plist";

/// Export method used when none is configured.
pub const DEFAULT_EXPORT_METHOD: &str = "app-store";

/// Extension of the installable package produced by an export.
pub const IPA_EXTENSION: &str = "ipa";

/// Error types for autolife-sdk operations.
///
/// Every stage returns one of these instead of panicking. The orchestrator
/// decides per [`Stage`] whether a failure halts the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AutolifeError {
    /// Invalid or missing configuration, detected before any tool runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// A directory required by a stage could not be created.
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A generated file could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The project directory could not be entered or restored.
    #[error("could not change to project directory {}: {source}", .path.display())]
    ProjectDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external tool could not be started at all.
    #[error("failed to start {program}: {source}. Ensure the tool is installed and available on PATH")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external tool ran and exited unsuccessfully.
    #[error("{stage} failed: {status}")]
    Tool { stage: Stage, status: ToolStatus },

    /// The export succeeded but no package could be found afterwards.
    #[error("could not find IPA file in export directory: {}", .0.display())]
    PackageNotFound(PathBuf),

    /// Upload was attempted without any usable credential set.
    #[error("no valid App Store Connect credentials provided")]
    NoCredentials,
}

/// Exit information reported by a [`crate::runner::ProcessRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStatus {
    /// Exit code, or `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ToolStatus {
    pub const SUCCESS: ToolStatus = ToolStatus { code: Some(0) };

    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Pipeline states in strict forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Cloning or updating the repository, before any build.
    Checkout,
    Locate,
    InstallDependencies,
    Build,
    Test,
    Archive,
    Export,
    Upload,
}

impl Stage {
    /// Returns the string representation of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Checkout => "repository checkout",
            Stage::Locate => "locate",
            Stage::InstallDependencies => "dependency installation",
            Stage::Build => "build",
            Stage::Test => "tests",
            Stage::Archive => "archive",
            Stage::Export => "export",
            Stage::Upload => "TestFlight upload",
        }
    }

    /// Whether a failure in this stage stops the pipeline.
    ///
    /// Only dependency installation is downgraded to a warning, whether the
    /// tool exited unsuccessfully or could not be started.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Stage::InstallDependencies)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The top-level Xcode descriptor to hand to `xcodebuild`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectTarget {
    Workspace(PathBuf),
    Project(PathBuf),
}

impl ProjectTarget {
    /// The `xcodebuild` flag selecting this kind of target.
    pub fn flag(&self) -> &'static str {
        match self {
            ProjectTarget::Workspace(_) => "-workspace",
            ProjectTarget::Project(_) => "-project",
        }
    }

    pub fn path(&self) -> &PathBuf {
        match self {
            ProjectTarget::Workspace(path) | ProjectTarget::Project(path) => path,
        }
    }
}

/// Identifies what to build.
///
/// `target` is `None` until either configuration or
/// [`crate::builders::locate_project`] supplies one; stages that need it fail
/// with [`AutolifeError::Config`].
///
/// # Example
///
/// ```
/// use autolife_sdk::{BuildTarget, ProjectTarget};
///
/// let target = BuildTarget::new("App")
///     .with_target(Some(ProjectTarget::Workspace("App.xcworkspace".into())))
///     .with_configuration("Release");
/// assert_eq!(target.configuration.as_deref(), Some("Release"));
/// assert!(target.sdk.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub target: Option<ProjectTarget>,
    pub scheme: String,
    pub configuration: Option<String>,
    pub sdk: Option<String>,
}

impl BuildTarget {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            target: None,
            scheme: scheme.into(),
            configuration: None,
            sdk: None,
        }
    }

    pub fn with_target(mut self, target: Option<ProjectTarget>) -> Self {
        self.target = target;
        self
    }

    /// Sets the build configuration; an empty string leaves it unset.
    pub fn with_configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration = non_empty(configuration.into());
        self
    }

    /// Sets the SDK; an empty string leaves it unset.
    pub fn with_sdk(mut self, sdk: impl Into<String>) -> Self {
        self.sdk = non_empty(sdk.into());
        self
    }
}

/// Code signing configuration for build and archive.
///
/// Exactly one variant is active per build. Field presence is validated by
/// the configuration loader, not here; empty fields are simply not emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningPolicy {
    Automatic {
        team_id: String,
        bundle_id: String,
    },
    Manual {
        code_sign_identity: String,
        provisioning_profile: String,
        team_id: String,
    },
}

/// Settings consumed by the export stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSettings {
    /// Export method (`app-store`, `ad-hoc`, ...). Defaults to `app-store`.
    pub method: Option<String>,
    /// iOS team ID, preferred for the export options.
    pub team_id: String,
    /// App Store Connect team ID, used when `team_id` is empty.
    pub fallback_team_id: String,
    /// Output directory. Defaults to the project directory.
    pub export_dir: Option<PathBuf>,
    /// Used to look for `<export_dir>/<project_name>.ipa` first.
    pub project_name: Option<String>,
}

impl ExportSettings {
    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or(DEFAULT_EXPORT_METHOD)
    }

    pub fn team_id(&self) -> &str {
        if self.team_id.is_empty() {
            &self.fallback_team_id
        } else {
            &self.team_id
        }
    }
}

/// App Store Connect API key credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiKey {
    pub key_id: String,
    pub issuer_id: String,
    /// Path to the `.p8` key file, if configured.
    pub key_path: Option<PathBuf>,
}

/// Apple ID credentials with an app-specific password.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppleAccount {
    pub apple_id: String,
    pub app_specific_password: String,
}

/// The credential scheme selected for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadCredentials<'a> {
    ApiKey(&'a ApiKey),
    AppleAccount(&'a AppleAccount),
}

/// Every credential the configuration supplied, possibly both schemes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    pub api_key: ApiKey,
    pub apple_account: AppleAccount,
}

impl CredentialSet {
    /// Picks the scheme used for upload. The API key wins whenever a key ID
    /// is present.
    pub fn select(&self) -> Option<UploadCredentials<'_>> {
        if !self.api_key.key_id.is_empty() {
            Some(UploadCredentials::ApiKey(&self.api_key))
        } else if !self.apple_account.apple_id.is_empty() {
            Some(UploadCredentials::AppleAccount(&self.apple_account))
        } else {
            None
        }
    }

    /// Whether enough credentials exist to offer an upload at all.
    pub fn is_usable(&self) -> bool {
        (!self.api_key.key_id.is_empty() && !self.api_key.issuer_id.is_empty())
            || !self.apple_account.apple_id.is_empty()
    }
}

pub(crate) fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
