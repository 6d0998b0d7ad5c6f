//! iOS dependency manager detection and installation.

use std::collections::BTreeMap;
use std::path::Path;

use crate::builders::common::run_stage;
use crate::runner::{Invocation, ProcessRunner};
use crate::types::{AutolifeError, Stage};
use crate::ui;

/// Dependency managers recognised in a project directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyManager {
    /// `Podfile`, installed with `pod install`.
    CocoaPods,
    /// `Package.swift`, resolved by `xcodebuild` itself.
    SwiftPackageManager,
    /// `Cartfile`, installed with `carthage update --platform iOS`.
    Carthage,
}

impl DependencyManager {
    /// Detects the manager from marker files, in priority order.
    pub fn detect(dir: &Path) -> Option<Self> {
        [
            ("Podfile", DependencyManager::CocoaPods),
            ("Package.swift", DependencyManager::SwiftPackageManager),
            ("Cartfile", DependencyManager::Carthage),
        ]
        .into_iter()
        .find(|(marker, _)| dir.join(marker).exists())
        .map(|(_, manager)| manager)
    }

    /// The install command, or `None` when nothing has to run.
    pub fn install_invocation(&self) -> Option<Invocation> {
        match self {
            DependencyManager::CocoaPods => Some(Invocation::new("pod").arg("install")),
            DependencyManager::SwiftPackageManager => None,
            DependencyManager::Carthage => {
                Some(Invocation::new("carthage").args(["update", "--platform", "iOS"]))
            }
        }
    }
}

/// Installs dependencies for the project in `dir`.
///
/// Returns the detected manager. Failures are returned as errors; the
/// pipeline treats them as warnings.
pub fn install_dependencies(
    runner: &dyn ProcessRunner,
    dir: &Path,
    env: &BTreeMap<String, String>,
) -> Result<Option<DependencyManager>, AutolifeError> {
    ui::info("Installing iOS dependencies...");

    let Some(manager) = DependencyManager::detect(dir) else {
        ui::info("No dependency manager detected, skipping...");
        return Ok(None);
    };

    match manager.install_invocation() {
        Some(invocation) => {
            let invocation = invocation.envs(env).current_dir(dir);
            run_stage(runner, Stage::InstallDependencies, &invocation)?;
            ui::success(match manager {
                DependencyManager::Carthage => "Carthage dependencies installed",
                _ => "CocoaPods dependencies installed",
            });
        }
        None => {
            ui::info("Found Package.swift, resolving Swift packages...");
            ui::success("Swift Package Manager will resolve packages during build");
        }
    }
    Ok(Some(manager))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RecordingRunner;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_podfile_runs_pod_install() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Podfile"), "platform :ios").unwrap();
        fs::write(dir.path().join("Cartfile"), "").unwrap();
        let runner = RecordingRunner::new();

        let manager = install_dependencies(&runner, dir.path(), &BTreeMap::new()).unwrap();
        assert_eq!(manager, Some(DependencyManager::CocoaPods));
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "pod");
        assert_eq!(calls[0].args, vec!["install"]);
        assert_eq!(calls[0].current_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_swift_package_runs_nothing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Package.swift"), "// swift-tools-version:5.9").unwrap();
        let runner = RecordingRunner::new();

        let manager = install_dependencies(&runner, dir.path(), &BTreeMap::new()).unwrap();
        assert_eq!(manager, Some(DependencyManager::SwiftPackageManager));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_carthage_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cartfile"), "github \"Alamofire/Alamofire\"").unwrap();
        let runner = RecordingRunner::new().fail_on("carthage");

        let err = install_dependencies(&runner, dir.path(), &BTreeMap::new()).unwrap_err();
        assert!(matches!(
            err,
            AutolifeError::Tool {
                stage: Stage::InstallDependencies,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_pod_binary_is_a_spawn_error() {
        struct NothingInstalled;
        impl ProcessRunner for NothingInstalled {
            fn run(&self, invocation: &Invocation) -> Result<crate::types::ToolStatus, AutolifeError> {
                Err(AutolifeError::Spawn {
                    program: invocation.program.clone(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                })
            }
        }

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Podfile"), "").unwrap();

        let err = install_dependencies(&NothingInstalled, dir.path(), &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, AutolifeError::Spawn { ref program, .. } if program == "pod"));
    }

    #[test]
    fn test_no_manager_detected() {
        let dir = TempDir::new().unwrap();
        assert_eq!(DependencyManager::detect(dir.path()), None);
        let runner = RecordingRunner::new();
        assert_eq!(
            install_dependencies(&runner, dir.path(), &BTreeMap::new()).unwrap(),
            None
        );
    }
}
