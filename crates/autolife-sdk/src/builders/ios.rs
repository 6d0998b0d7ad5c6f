//! iOS build automation
//!
//! [`IosBuilder`] turns a [`BuildTarget`] and [`SigningPolicy`] into
//! `xcodebuild` invocations, one method per pipeline stage. Each stage's
//! output is the next stage's input: archive path, then IPA path, then the
//! upload.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::builders::common::{ensure_dir, locate_project, resolve_against, run_stage};
use crate::builders::deps::{self, DependencyManager};
use crate::builders::export::{resolve_ipa, write_export_options};
use crate::builders::signing::signing_args;
use crate::builders::standard::parse_command;
use crate::builders::upload::upload_invocation;
use crate::runner::{Invocation, ProcessRunner};
use crate::types::{
    AutolifeError, BuildTarget, CredentialSet, DEFAULT_ARCHIVE_NAME,
    DEFAULT_SIMULATOR_DESTINATION, DEVICE_SDK, ExportSettings, ProjectTarget, SIMULATOR_SDK,
    SigningPolicy, Stage,
};
use crate::ui;

/// iOS builder that drives `xcodebuild` through build, archive and export.
pub struct IosBuilder<'r> {
    runner: &'r dyn ProcessRunner,
    /// Directory containing the workspace or project; every tool runs here
    project_root: PathBuf,
    target: BuildTarget,
    signing: SigningPolicy,
    archive_path: Option<PathBuf>,
    export: ExportSettings,
    credentials: CredentialSet,
    simulator_destination: String,
    /// Extra environment attached to every invocation
    env: BTreeMap<String, String>,
    /// Runs instead of dependency manager detection when set
    install_command: Option<Invocation>,
}

impl<'r> IosBuilder<'r> {
    /// Creates a new iOS builder
    ///
    /// # Arguments
    ///
    /// * `runner` - Launches the external tools
    /// * `project_root` - Directory containing the `.xcworkspace` / `.xcodeproj`
    /// * `target` - Scheme, configuration, SDK and (optionally) the project file
    /// * `signing` - Code signing policy for build and archive
    pub fn new(
        runner: &'r dyn ProcessRunner,
        project_root: impl Into<PathBuf>,
        target: BuildTarget,
        signing: SigningPolicy,
    ) -> Self {
        Self {
            runner,
            project_root: project_root.into(),
            target,
            signing,
            archive_path: None,
            export: ExportSettings::default(),
            credentials: CredentialSet::default(),
            simulator_destination: DEFAULT_SIMULATOR_DESTINATION.to_string(),
            env: BTreeMap::new(),
            install_command: None,
        }
    }

    /// Archives to `path` instead of the temporary directory.
    pub fn archive_path(mut self, path: Option<PathBuf>) -> Self {
        self.archive_path = path;
        self
    }

    pub fn export_settings(mut self, export: ExportSettings) -> Self {
        self.export = export;
        self
    }

    pub fn credentials(mut self, credentials: CredentialSet) -> Self {
        self.credentials = credentials;
        self
    }

    /// Overrides the simulator used by [`IosBuilder::test`]. Empty keeps the default.
    pub fn simulator_destination(mut self, destination: impl Into<String>) -> Self {
        let destination = destination.into();
        if !destination.is_empty() {
            self.simulator_destination = destination;
        }
        self
    }

    pub fn env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Replaces dependency manager detection with `command`. Blank keeps
    /// detection.
    pub fn install_command(mut self, command: &str) -> Self {
        self.install_command = parse_command(command);
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn target(&self) -> &BuildTarget {
        &self.target
    }

    pub fn has_usable_credentials(&self) -> bool {
        self.credentials.is_usable()
    }

    /// Fills in the workspace or project by scanning the project root, unless
    /// one is already configured.
    pub fn locate(&mut self) -> Option<&ProjectTarget> {
        if self.target.target.is_none() {
            self.target.target = locate_project(&self.project_root);
        } else {
            tracing::debug!(target = ?self.target.target, "using configured project target");
        }
        self.target.target.as_ref()
    }

    /// Runs the configured install command, or the dependency manager found
    /// in the project root. The manager is `None` for a configured command.
    pub fn install_dependencies(&self) -> Result<Option<DependencyManager>, AutolifeError> {
        let Some(command) = &self.install_command else {
            return deps::install_dependencies(self.runner, &self.project_root, &self.env);
        };
        let invocation = command
            .clone()
            .envs(&self.env)
            .current_dir(&self.project_root);
        run_stage(self.runner, Stage::InstallDependencies, &invocation)?;
        ui::success("Dependencies installed successfully");
        Ok(None)
    }

    fn target_args(&self) -> Result<Vec<String>, AutolifeError> {
        let target = self.target.target.as_ref().ok_or_else(|| {
            AutolifeError::Config(
                "no workspace or project file found; set ios.workspace_path or ios.project_path"
                    .to_string(),
            )
        })?;
        Ok(vec![
            target.flag().to_string(),
            target.path().display().to_string(),
            "-scheme".to_string(),
            self.target.scheme.clone(),
        ])
    }

    fn configuration_args(&self) -> Vec<String> {
        match &self.target.configuration {
            Some(configuration) => vec!["-configuration".to_string(), configuration.clone()],
            None => Vec::new(),
        }
    }

    /// Arguments for `xcodebuild build`.
    pub fn build_args(&self) -> Result<Vec<String>, AutolifeError> {
        let mut args = vec!["build".to_string()];
        args.extend(self.target_args()?);
        args.extend(self.configuration_args());
        if let Some(sdk) = &self.target.sdk {
            args.extend(["-sdk".to_string(), sdk.clone()]);
        }
        args.extend(signing_args(&self.signing));
        Ok(args)
    }

    /// Arguments for `xcodebuild test`.
    ///
    /// Without an SDK, or with the simulator SDK, the simulator SDK and the
    /// configured destination are forced.
    pub fn test_args(&self) -> Result<Vec<String>, AutolifeError> {
        let mut args = vec!["test".to_string()];
        args.extend(self.target_args()?);
        args.extend(self.configuration_args());
        match self.target.sdk.as_deref() {
            None | Some(SIMULATOR_SDK) => args.extend([
                "-sdk".to_string(),
                SIMULATOR_SDK.to_string(),
                "-destination".to_string(),
                self.simulator_destination.clone(),
            ]),
            Some(sdk) => args.extend(["-sdk".to_string(), sdk.to_string()]),
        }
        args.extend(signing_args(&self.signing));
        Ok(args)
    }

    /// Arguments for `xcodebuild archive` into `archive_path`.
    pub fn archive_args(&self, archive_path: &Path) -> Result<Vec<String>, AutolifeError> {
        let mut args = vec!["archive".to_string()];
        args.extend(self.target_args()?);
        args.extend(self.configuration_args());
        args.extend([
            "-sdk".to_string(),
            self.target.sdk.as_deref().unwrap_or(DEVICE_SDK).to_string(),
            "-archivePath".to_string(),
            archive_path.display().to_string(),
        ]);
        args.extend(signing_args(&self.signing));
        Ok(args)
    }

    /// The archive location used when none is configured.
    pub fn default_archive_path() -> PathBuf {
        env::temp_dir().join(DEFAULT_ARCHIVE_NAME)
    }

    /// Resolved archive location: configured (relative to the project root)
    /// or under the system temporary directory.
    pub fn resolved_archive_path(&self) -> PathBuf {
        match &self.archive_path {
            Some(path) => resolve_against(&self.project_root, path),
            None => Self::default_archive_path(),
        }
    }

    /// Resolved export directory: configured (relative to the project root)
    /// or the project root itself.
    pub fn resolved_export_dir(&self) -> PathBuf {
        match &self.export.export_dir {
            Some(dir) => resolve_against(&self.project_root, dir),
            None => self.project_root.clone(),
        }
    }

    fn xcodebuild(&self, args: Vec<String>) -> Invocation {
        Invocation::new("xcodebuild")
            .args(args)
            .envs(&self.env)
            .current_dir(&self.project_root)
    }

    /// Builds the app.
    pub fn build(&self) -> Result<(), AutolifeError> {
        let args = self.build_args()?;
        ui::info("Building iOS app...");
        run_stage(self.runner, Stage::Build, &self.xcodebuild(args))?;
        ui::success("Build completed successfully");
        Ok(())
    }

    /// Runs the scheme's tests.
    pub fn test(&self) -> Result<(), AutolifeError> {
        let args = self.test_args()?;
        ui::info("Running iOS tests...");
        run_stage(self.runner, Stage::Test, &self.xcodebuild(args))?;
        ui::success("Tests completed successfully");
        Ok(())
    }

    /// Archives the app and returns the `.xcarchive` path.
    ///
    /// The archive's parent directory is created first; a failure there is
    /// reported before `xcodebuild` runs.
    pub fn archive(&self) -> Result<PathBuf, AutolifeError> {
        let archive_path = self.resolved_archive_path();
        let args = self.archive_args(&archive_path)?;
        if let Some(parent) = archive_path.parent() {
            ensure_dir(parent)?;
        }

        ui::info("Creating archive...");
        run_stage(self.runner, Stage::Archive, &self.xcodebuild(args))?;
        ui::success(&format!("Archive created: {}", archive_path.display()));
        Ok(archive_path)
    }

    /// Exports `archive` to an `.ipa` and returns the package path.
    pub fn export_ipa(&self, archive: &Path) -> Result<PathBuf, AutolifeError> {
        let export_dir = self.resolved_export_dir();
        ensure_dir(&export_dir)?;

        ui::info("Exporting IPA...");
        let options = write_export_options(&export_dir, &self.export)?;
        tracing::debug!(path = %options.display(), method = self.export.method(), "wrote export options");

        let args = vec![
            "-exportArchive".to_string(),
            "-archivePath".to_string(),
            archive.display().to_string(),
            "-exportPath".to_string(),
            export_dir.display().to_string(),
            "-exportOptionsPlist".to_string(),
            options.display().to_string(),
        ];
        run_stage(self.runner, Stage::Export, &self.xcodebuild(args))?;

        let ipa = resolve_ipa(&export_dir, self.export.project_name.as_deref())?;
        ui::success(&format!("IPA exported: {}", ipa.display()));
        Ok(ipa)
    }

    /// Uploads `ipa` to TestFlight. The package is left in place either way.
    pub fn upload(&self, ipa: &Path) -> Result<(), AutolifeError> {
        let mut invocation = upload_invocation(ipa, &self.credentials)?;
        for (key, value) in &self.env {
            invocation
                .env
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        let invocation = invocation.current_dir(&self.project_root);

        ui::info("Uploading to TestFlight...");
        run_stage(self.runner, Stage::Upload, &invocation)?;
        ui::success("Successfully uploaded to TestFlight");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RecordingRunner;
    use crate::types::{ApiKey, AppleAccount};
    use std::fs;
    use tempfile::TempDir;

    fn automatic() -> SigningPolicy {
        SigningPolicy::Automatic {
            team_id: "TEAM1".into(),
            bundle_id: String::new(),
        }
    }

    fn workspace_target() -> BuildTarget {
        BuildTarget::new("App").with_target(Some(ProjectTarget::Workspace(
            "App.xcworkspace".into(),
        )))
    }

    fn window(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }

    #[test]
    fn test_build_args_without_configuration_or_sdk() {
        let runner = RecordingRunner::new();
        let builder = IosBuilder::new(&runner, "/work/App", workspace_target(), automatic());

        let args = builder.build_args().unwrap();
        assert_eq!(
            &args[..5],
            &["build", "-workspace", "App.xcworkspace", "-scheme", "App"]
        );
        assert!(!args.iter().any(|a| a == "-configuration"));
        assert!(!args.iter().any(|a| a == "-sdk"));
        assert!(args.contains(&"CODE_SIGN_STYLE=Automatic".to_string()));
    }

    #[test]
    fn test_build_runs_in_project_root_with_env() {
        let runner = RecordingRunner::new();
        let mut env = BTreeMap::new();
        env.insert("CI".to_string(), "1".to_string());
        let target = workspace_target().with_configuration("Release").with_sdk("iphoneos");
        let builder = IosBuilder::new(&runner, "/work/App", target, automatic()).env(env);

        builder.build().unwrap();
        let calls = runner.calls_to("xcodebuild");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].current_dir.as_deref(), Some(Path::new("/work/App")));
        assert_eq!(calls[0].env.get("CI").map(String::as_str), Some("1"));
        assert_eq!(window(&calls[0].args, "-configuration").as_deref(), Some("Release"));
        assert_eq!(window(&calls[0].args, "-sdk").as_deref(), Some("iphoneos"));
    }

    #[test]
    fn test_configured_install_command_replaces_detection() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Podfile"), "").unwrap();
        let runner = RecordingRunner::new();
        let builder = IosBuilder::new(&runner, dir.path(), workspace_target(), automatic())
            .install_command("bundle exec pod install --repo-update");

        assert_eq!(builder.install_dependencies().unwrap(), None);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].display(), "bundle exec pod install --repo-update");
        assert_eq!(calls[0].current_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_missing_target_is_config_error_before_any_call() {
        let runner = RecordingRunner::new();
        let builder = IosBuilder::new(&runner, "/work/App", BuildTarget::new("App"), automatic());

        let err = builder.build().unwrap_err();
        assert!(matches!(err, AutolifeError::Config(_)));
        assert!(builder.archive().is_err());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_locate_fills_missing_target() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("Demo.xcodeproj")).unwrap();
        let runner = RecordingRunner::new();
        let mut builder =
            IosBuilder::new(&runner, dir.path(), BuildTarget::new("Demo"), automatic());

        let found = builder.locate().cloned();
        assert_eq!(found, Some(ProjectTarget::Project("Demo.xcodeproj".into())));
        assert_eq!(&builder.build_args().unwrap()[1..3], &["-project", "Demo.xcodeproj"]);
    }

    #[test]
    fn test_locate_keeps_configured_target() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("Other.xcworkspace")).unwrap();
        let runner = RecordingRunner::new();
        let mut builder = IosBuilder::new(&runner, dir.path(), workspace_target(), automatic());

        builder.locate();
        assert_eq!(
            builder.target().target,
            Some(ProjectTarget::Workspace("App.xcworkspace".into()))
        );
    }

    #[test]
    fn test_test_forces_simulator() {
        let runner = RecordingRunner::new();
        let builder = IosBuilder::new(&runner, "/work/App", workspace_target(), automatic());

        let args = builder.test_args().unwrap();
        assert_eq!(args[0], "test");
        assert_eq!(window(&args, "-sdk").as_deref(), Some(SIMULATOR_SDK));
        assert_eq!(
            window(&args, "-destination").as_deref(),
            Some(DEFAULT_SIMULATOR_DESTINATION)
        );

        let target = workspace_target().with_sdk(SIMULATOR_SDK);
        let builder = IosBuilder::new(&runner, "/work/App", target, automatic())
            .simulator_destination("platform=iOS Simulator,name=iPhone 16 Pro");
        let args = builder.test_args().unwrap();
        assert_eq!(
            window(&args, "-destination").as_deref(),
            Some("platform=iOS Simulator,name=iPhone 16 Pro")
        );
    }

    #[test]
    fn test_test_with_device_sdk_has_no_destination() {
        let runner = RecordingRunner::new();
        let target = workspace_target().with_sdk("macosx");
        let builder = IosBuilder::new(&runner, "/work/App", target, automatic());

        let args = builder.test_args().unwrap();
        assert_eq!(window(&args, "-sdk").as_deref(), Some("macosx"));
        assert!(!args.iter().any(|a| a == "-destination"));
    }

    #[test]
    fn test_default_archive_path_under_temp_dir() {
        let path = IosBuilder::default_archive_path();
        assert!(path.starts_with(env::temp_dir()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("xcarchive"));
    }

    #[test]
    fn test_archive_defaults_to_device_sdk() {
        let runner = RecordingRunner::new();
        let builder = IosBuilder::new(&runner, "/work/App", workspace_target(), automatic());

        let archive = builder.archive().unwrap();
        assert_eq!(archive, IosBuilder::default_archive_path());
        let call = &runner.calls_to("xcodebuild")[0];
        assert_eq!(call.action(), Some("archive"));
        assert_eq!(window(&call.args, "-sdk").as_deref(), Some(DEVICE_SDK));
        assert_eq!(
            window(&call.args, "-archivePath"),
            Some(archive.display().to_string())
        );
    }

    #[test]
    fn test_archive_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let runner = RecordingRunner::new();
        let builder = IosBuilder::new(&runner, dir.path(), workspace_target(), automatic())
            .archive_path(Some(PathBuf::from("build/archives/App.xcarchive")));

        let archive = builder.archive().unwrap();
        assert_eq!(archive, dir.path().join("build/archives/App.xcarchive"));
        assert!(dir.path().join("build/archives").is_dir());
    }

    #[test]
    fn test_archive_directory_failure_reported_before_tool() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blocker"), "").unwrap();
        let runner = RecordingRunner::new();
        let builder = IosBuilder::new(&runner, dir.path(), workspace_target(), automatic())
            .archive_path(Some(PathBuf::from("blocker/sub/App.xcarchive")));

        let err = builder.archive().unwrap_err();
        assert!(matches!(err, AutolifeError::CreateDir { .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_archive_failure_returns_no_path() {
        let runner = RecordingRunner::new().fail_on("archive");
        let builder = IosBuilder::new(&runner, "/work/App", workspace_target(), automatic());

        let err = builder.archive().unwrap_err();
        assert!(matches!(
            err,
            AutolifeError::Tool {
                stage: Stage::Archive,
                ..
            }
        ));
    }

    #[test]
    fn test_export_writes_options_and_resolves_ipa() {
        let dir = TempDir::new().unwrap();
        let export_dir = dir.path().join("export");
        fs::create_dir(&export_dir).unwrap();
        fs::write(export_dir.join("MyApp.ipa"), "").unwrap();

        let runner = RecordingRunner::new();
        let builder = IosBuilder::new(&runner, dir.path(), workspace_target(), automatic())
            .export_settings(ExportSettings {
                method: Some("ad-hoc".into()),
                team_id: "TEAM1".into(),
                export_dir: Some(PathBuf::from("export")),
                project_name: Some("MyApp".into()),
                ..Default::default()
            });

        let ipa = builder.export_ipa(Path::new("/tmp/app.xcarchive")).unwrap();
        assert_eq!(ipa, export_dir.join("MyApp.ipa"));

        let plist = fs::read_to_string(export_dir.join("ExportOptions.plist")).unwrap();
        assert!(plist.contains("<string>ad-hoc</string>"));

        let call = &runner.calls_to("xcodebuild")[0];
        assert_eq!(call.action(), Some("-exportArchive"));
        assert_eq!(
            window(&call.args, "-archivePath").as_deref(),
            Some("/tmp/app.xcarchive")
        );
        assert_eq!(
            window(&call.args, "-exportPath"),
            Some(export_dir.display().to_string())
        );
    }

    #[test]
    fn test_export_defaults_to_project_root() {
        let dir = TempDir::new().unwrap();
        let runner = RecordingRunner::new();
        let builder = IosBuilder::new(&runner, dir.path(), workspace_target(), automatic());

        assert_eq!(builder.resolved_export_dir(), dir.path());
        let err = builder.export_ipa(Path::new("/tmp/app.xcarchive")).unwrap_err();
        assert!(matches!(err, AutolifeError::PackageNotFound(ref d) if d == dir.path()));
        assert!(dir.path().join("ExportOptions.plist").exists());
    }

    #[test]
    fn test_upload_keeps_key_dir_over_config_env() {
        let runner = RecordingRunner::new();
        let mut env = BTreeMap::new();
        env.insert("API_PRIVATE_KEYS_DIR".to_string(), "/elsewhere".to_string());
        env.insert("LANG".to_string(), "C".to_string());
        let credentials = CredentialSet {
            api_key: ApiKey {
                key_id: "KEY".into(),
                issuer_id: "ISSUER".into(),
                key_path: Some(PathBuf::from("/keys/AuthKey_KEY.p8")),
            },
            apple_account: AppleAccount::default(),
        };
        let builder = IosBuilder::new(&runner, "/work/App", workspace_target(), automatic())
            .credentials(credentials)
            .env(env);

        builder.upload(Path::new("/work/App/App.ipa")).unwrap();
        let call = &runner.calls_to("xcrun")[0];
        assert_eq!(
            call.env.get("API_PRIVATE_KEYS_DIR").map(String::as_str),
            Some("/keys")
        );
        assert_eq!(call.env.get("LANG").map(String::as_str), Some("C"));
    }

    #[test]
    fn test_upload_without_credentials_runs_nothing() {
        let runner = RecordingRunner::new();
        let builder = IosBuilder::new(&runner, "/work/App", workspace_target(), automatic());

        let err = builder.upload(Path::new("App.ipa")).unwrap_err();
        assert!(matches!(err, AutolifeError::NoCredentials));
        assert!(runner.calls().is_empty());
    }
}
