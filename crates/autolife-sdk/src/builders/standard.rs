//! Builds and tests for projects outside the iOS pipeline.
//!
//! The commands come from configuration. Any command that is not set falls
//! back to a default for the project's language. Command strings are split
//! on whitespace and launched directly, without a shell.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::builders::common::{ensure_dir, resolve_against, run_stage};
use crate::runner::{Invocation, ProcessRunner};
use crate::types::{AutolifeError, Stage};
use crate::ui;

/// Splits a configured command line into an [`Invocation`]. Blank input
/// yields `None`.
pub fn parse_command(command: &str) -> Option<Invocation> {
    let mut parts = command.split_whitespace();
    let program = parts.next()?;
    Some(Invocation::new(program).args(parts))
}

/// The dependency install command detected for `language` in `dir`.
///
/// `Ok(None)` means the language is known but the project has nothing to
/// install. Unknown languages are a configuration error.
pub fn auto_install_invocation(
    language: &str,
    dir: &Path,
) -> Result<Option<Invocation>, AutolifeError> {
    let has = |name: &str| dir.join(name).exists();
    let command = match language.to_ascii_lowercase().as_str() {
        "go" | "golang" => has("go.mod").then_some("go mod download"),
        "node" | "nodejs" | "javascript" | "typescript" => {
            if !has("package.json") {
                None
            } else if has("yarn.lock") {
                Some("yarn install")
            } else {
                Some("npm install")
            }
        }
        "python" => {
            if has("requirements.txt") {
                Some("pip install -r requirements.txt")
            } else if has("Pipfile") {
                Some("pipenv install")
            } else {
                None
            }
        }
        "dotnet" | "c#" | "csharp" => Some("dotnet restore"),
        "rust" => Some("cargo fetch"),
        "ruby" => has("Gemfile").then_some("bundle install"),
        _ => {
            return Err(AutolifeError::Config(format!(
                "could not determine how to install dependencies for language: {language}"
            )));
        }
    };
    Ok(command.and_then(parse_command))
}

/// Default build command for `language`. Go and .NET write their output to
/// `output_dir` when one is configured.
pub fn default_build_invocation(language: &str, output_dir: Option<&Path>) -> Option<Invocation> {
    let out = output_dir.map(|dir| format!("{}/", dir.display().to_string().trim_end_matches('/')));
    let invocation = match language.to_ascii_lowercase().as_str() {
        "go" | "golang" => match out {
            Some(out) => Invocation::new("go").args(["build", "-o", out.as_str(), "./..."]),
            None => Invocation::new("go").args(["build", "./..."]),
        },
        "node" | "nodejs" | "javascript" | "typescript" => {
            Invocation::new("npm").args(["run", "build"])
        }
        "python" => Invocation::new("python").args(["-m", "compileall", "-q", "."]),
        "dotnet" | "c#" | "csharp" => match out {
            Some(out) => Invocation::new("dotnet").args(["build", "-o", out.as_str()]),
            None => Invocation::new("dotnet").arg("build"),
        },
        "rust" => Invocation::new("cargo").args(["build", "--release"]),
        "java" => Invocation::new("mvn").arg("package"),
        _ => return None,
    };
    Some(invocation)
}

/// Default test command for `language`.
pub fn default_test_invocation(language: &str) -> Option<Invocation> {
    let command = match language.to_ascii_lowercase().as_str() {
        "go" | "golang" => "go test ./...",
        "node" | "nodejs" | "javascript" | "typescript" => "npm test",
        "python" => "pytest",
        "dotnet" | "c#" | "csharp" => "dotnet test",
        "rust" => "cargo test",
        "ruby" => "bundle exec rspec",
        "java" => "mvn test",
        _ => return None,
    };
    parse_command(command)
}

/// Runs configured or default commands for a non-iOS project.
pub struct StandardBuilder<'r> {
    runner: &'r dyn ProcessRunner,
    project_root: PathBuf,
    language: String,
    install_command: Option<Invocation>,
    build_command: Option<Invocation>,
    test_command: Option<Invocation>,
    /// Relative to `project_root` unless absolute
    output_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl<'r> StandardBuilder<'r> {
    pub fn new(
        runner: &'r dyn ProcessRunner,
        project_root: impl Into<PathBuf>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            project_root: project_root.into(),
            language: language.into(),
            install_command: None,
            build_command: None,
            test_command: None,
            output_dir: None,
            env: BTreeMap::new(),
        }
    }

    /// Replaces dependency detection. Blank keeps detection.
    pub fn install_command(mut self, command: &str) -> Self {
        self.install_command = parse_command(command);
        self
    }

    pub fn build_command(mut self, command: &str) -> Self {
        self.build_command = parse_command(command);
        self
    }

    pub fn test_command(mut self, command: &str) -> Self {
        self.test_command = parse_command(command);
        self
    }

    /// Created before the build; empty leaves it unset.
    pub fn output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir.filter(|d| !d.as_os_str().is_empty());
        self
    }

    pub fn env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    fn prepare(&self, invocation: Invocation) -> Invocation {
        invocation.envs(&self.env).current_dir(&self.project_root)
    }

    /// The install command that would run, if any.
    pub fn install_invocation(&self) -> Result<Option<Invocation>, AutolifeError> {
        let invocation = match &self.install_command {
            Some(configured) => Some(configured.clone()),
            None => auto_install_invocation(&self.language, &self.project_root)?,
        };
        Ok(invocation.map(|inv| self.prepare(inv)))
    }

    pub fn build_invocation(&self) -> Result<Invocation, AutolifeError> {
        let invocation = match &self.build_command {
            Some(configured) => configured.clone(),
            None => {
                let default = default_build_invocation(&self.language, self.output_dir.as_deref())
                    .ok_or_else(|| {
                        AutolifeError::Config(format!(
                            "no default build command for language '{}'; set build.build_command",
                            self.language
                        ))
                    })?;
                ui::info(&format!(
                    "Using default build command for {}: {}",
                    self.language,
                    default.display()
                ));
                default
            }
        };
        Ok(self.prepare(invocation))
    }

    pub fn test_invocation(&self) -> Result<Invocation, AutolifeError> {
        let invocation = match &self.test_command {
            Some(configured) => configured.clone(),
            None => {
                let default = default_test_invocation(&self.language).ok_or_else(|| {
                    AutolifeError::Config(format!(
                        "no default test command for language '{}'; set build.test_command",
                        self.language
                    ))
                })?;
                ui::info(&format!(
                    "Using default test command for {}: {}",
                    self.language,
                    default.display()
                ));
                default
            }
        };
        Ok(self.prepare(invocation))
    }

    /// Installs dependencies. Returns whether a command ran.
    pub fn install_dependencies(&self) -> Result<bool, AutolifeError> {
        let Some(invocation) = self.install_invocation()? else {
            ui::info("No dependency manifest found, skipping...");
            return Ok(false);
        };
        run_stage(self.runner, Stage::InstallDependencies, &invocation)?;
        ui::success("Dependencies installed successfully");
        Ok(true)
    }

    pub fn build(&self) -> Result<(), AutolifeError> {
        let invocation = self.build_invocation()?;
        if let Some(dir) = &self.output_dir {
            ensure_dir(&resolve_against(&self.project_root, dir))?;
        }
        run_stage(self.runner, Stage::Build, &invocation)?;
        ui::success("Build completed successfully!");
        Ok(())
    }

    pub fn test(&self) -> Result<(), AutolifeError> {
        run_stage(self.runner, Stage::Test, &self.test_invocation()?)?;
        ui::success("All tests passed successfully!");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RecordingRunner;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_command_splits_on_whitespace() {
        let inv = parse_command("  npm  run build:prod ").unwrap();
        assert_eq!(inv.program, "npm");
        assert_eq!(inv.args, vec!["run", "build:prod"]);
        assert!(parse_command("   ").is_none());
    }

    #[test]
    fn test_auto_install_detects_manifests() {
        let dir = TempDir::new().unwrap();
        assert!(auto_install_invocation("go", dir.path()).unwrap().is_none());

        fs::write(dir.path().join("go.mod"), "module example.com/svc").unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        fs::write(dir.path().join("yarn.lock"), "").unwrap();

        let go = auto_install_invocation("Go", dir.path()).unwrap().unwrap();
        assert_eq!(go.display(), "go mod download");
        let node = auto_install_invocation("typescript", dir.path()).unwrap().unwrap();
        assert_eq!(node.display(), "yarn install");
        let rust = auto_install_invocation("rust", dir.path()).unwrap().unwrap();
        assert_eq!(rust.display(), "cargo fetch");
    }

    #[test]
    fn test_auto_install_unknown_language() {
        let dir = TempDir::new().unwrap();
        let err = auto_install_invocation("cobol", dir.path()).unwrap_err();
        assert!(err.to_string().contains("cobol"));
    }

    #[test]
    fn test_default_build_uses_output_dir() {
        let go = default_build_invocation("go", Some(Path::new("./bin/"))).unwrap();
        assert_eq!(go.display(), "go build -o ./bin/ ./...");
        let go = default_build_invocation("go", None).unwrap();
        assert_eq!(go.display(), "go build ./...");
        assert!(default_build_invocation("ruby", None).is_none());
        assert_eq!(default_test_invocation("ruby").unwrap().display(), "bundle exec rspec");
    }

    #[test]
    fn test_configured_commands_win() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("go.mod"), "").unwrap();
        let runner = RecordingRunner::new();
        let mut env = BTreeMap::new();
        env.insert("ENV".to_string(), "production".to_string());
        let builder = StandardBuilder::new(&runner, dir.path(), "go")
            .install_command("make deps")
            .build_command("make all")
            .test_command("make check")
            .env(env);

        assert!(builder.install_dependencies().unwrap());
        builder.build().unwrap();
        builder.test().unwrap();

        let calls = runner.calls();
        let shown: Vec<String> = calls.iter().map(Invocation::display).collect();
        assert_eq!(shown, vec!["make deps", "make all", "make check"]);
        for call in &calls {
            assert_eq!(call.current_dir.as_deref(), Some(dir.path()));
            assert_eq!(call.env.get("ENV").map(String::as_str), Some("production"));
        }
    }

    #[test]
    fn test_build_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let runner = RecordingRunner::new();
        let builder = StandardBuilder::new(&runner, dir.path(), "go")
            .output_dir(Some(PathBuf::from("./bin")));

        builder.build().unwrap();
        assert!(dir.path().join("bin").is_dir());
        assert_eq!(runner.calls()[0].display(), "go build -o ./bin/ ./...");
    }

    #[test]
    fn test_missing_default_is_config_error_before_any_call() {
        let dir = TempDir::new().unwrap();
        let runner = RecordingRunner::new();
        let builder = StandardBuilder::new(&runner, dir.path(), "ruby");

        let err = builder.build().unwrap_err();
        assert!(matches!(err, AutolifeError::Config(_)));
        assert!(err.to_string().contains("build.build_command"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_failing_tests_report_test_stage() {
        let dir = TempDir::new().unwrap();
        let runner = RecordingRunner::new().fail_on("go");
        let builder = StandardBuilder::new(&runner, dir.path(), "go");

        let err = builder.test().unwrap_err();
        assert!(matches!(err, AutolifeError::Tool { stage: Stage::Test, .. }));
    }
}
