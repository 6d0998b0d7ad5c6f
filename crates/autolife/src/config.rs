//! Configuration file support for autolife.
//!
//! The configuration describes the repository, the build toolchain and the
//! iOS pipeline. It is read from `ConfigFile.json` in the current directory
//! unless `--config` points elsewhere; files ending in `.toml` are parsed as
//! TOML.
//!
//! ## Example Configuration
//!
//! ```json
//! {
//!   "project": { "name": "MyApp", "type": "mobile" },
//!   "git": { "repo_url": "https://github.com/acme/MyApp.git", "branch": "main" },
//!   "build": { "language": "swift" },
//!   "ios": {
//!     "scheme": "MyApp",
//!     "configuration": "Release",
//!     "automatic_signing": true,
//!     "team_id": "ABCDE12345",
//!     "upload_to_testflight": true
//!   },
//!   "app_store_connect": {
//!     "api_key_id": "$ASC_KEY_ID",
//!     "api_issuer_id": "${ASC_ISSUER_ID}",
//!     "api_key_path": "~/keys/AuthKey.p8"
//!   }
//! }
//! ```
//!
//! Every string value may reference environment variables (`$VAR`,
//! `${VAR}`) and the home directory (`~`). Variables from `.env.local` are
//! visible because the CLI loads that file first.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use autolife_sdk::{
    ApiKey, AppleAccount, BuildTarget, CredentialSet, ExportSettings, ProjectTarget,
    SigningPolicy,
};

/// The default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "ConfigFile.json";

/// Languages that select the iOS pipeline.
const IOS_LANGUAGES: &[&str] = &["swift", "objective-c", "objc"];

const VALID_CONFIGURATIONS: &[&str] = &["Debug", "Release"];
const VALID_SDKS: &[&str] = &["iphoneos", "iphonesimulator", "macosx"];
const VALID_EXPORT_METHODS: &[&str] = &["app-store", "ad-hoc", "development", "enterprise"];

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutolifeConfig {
    pub project: ProjectConfig,
    pub git: GitConfig,
    pub build: BuildConfig,
    pub ios: IosConfig,
    pub app_store_connect: AppStoreConnectConfig,
    pub environment: EnvironmentConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Also the expected `.ipa` file name after export.
    pub name: String,
    #[serde(rename = "type")]
    pub project_type: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// The project directory is named after the last segment of this URL.
    pub repo_url: String,
    /// Checked out by `start`; empty or `main` follows the remote default.
    pub branch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// `swift`, `objective-c` or `objc` select the iOS pipeline.
    pub language: String,
    /// Replaces dependency detection, for iOS projects too.
    pub install_command: String,
    /// Defaults per language when empty.
    pub build_command: String,
    /// Defaults per language when empty.
    pub test_command: String,
    /// Created before the build; Go and .NET default builds write here.
    pub output_dir: String,
}

/// iOS pipeline configuration.
///
/// Empty strings mean "not set". Workspace and project paths are detected
/// when both are empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IosConfig {
    pub workspace_path: String,
    pub project_path: String,
    pub scheme: String,
    /// `Debug` or `Release`.
    pub configuration: String,
    /// `iphoneos`, `iphonesimulator` or `macosx`.
    pub sdk: String,
    /// `app-store`, `ad-hoc`, `development` or `enterprise`.
    pub export_method: String,
    pub bundle_id: String,
    pub team_id: String,
    pub provisioning_profile: String,
    pub code_sign_identity: String,
    pub automatic_signing: bool,
    /// Defaults to `app.xcarchive` in the system temporary directory.
    pub archive_path: String,
    /// Defaults to the project directory.
    pub export_path: String,
    /// Offer a TestFlight upload after a successful export.
    pub upload_to_testflight: bool,
    /// `xcodebuild -destination` used by `test` on the simulator.
    pub simulator_destination: String,
}

/// App Store Connect credentials.
///
/// Either the API key triple or the Apple ID pair is needed for upload; the
/// API key is used when both are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppStoreConnectConfig {
    pub apple_id: String,
    pub app_specific_password: String,
    pub api_key_id: String,
    pub api_issuer_id: String,
    pub api_key_path: String,
    pub team_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Passed to every external tool the pipeline launches.
    pub variables: BTreeMap<String, String>,
}

impl AutolifeConfig {
    /// Loads configuration from the specified file and expands environment
    /// references against the process environment.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("config file not found: {}", path.display()))?;

        let mut config = Self::parse(&contents, is_toml(path))
            .with_context(|| format!("failed to decode config: {}", path.display()))?;

        let home = std::env::var_os("HOME").map(PathBuf::from);
        config.expand(&|name| std::env::var(name).ok(), home.as_deref());
        Ok(config)
    }

    /// Parses configuration text without expanding it.
    pub fn parse(contents: &str, toml_format: bool) -> Result<Self> {
        if toml_format {
            toml::from_str(contents).context("invalid TOML")
        } else {
            serde_json::from_str(contents).context("invalid JSON")
        }
    }

    /// Expands `$VAR`, `${VAR}` and `~` in every string field and every
    /// environment value.
    pub fn expand(&mut self, lookup: &dyn Fn(&str) -> Option<String>, home: Option<&Path>) {
        let ex = |value: &mut String| *value = expand_env_vars(value, lookup, home);

        ex(&mut self.project.name);
        ex(&mut self.project.project_type);
        ex(&mut self.project.description);

        ex(&mut self.git.repo_url);
        ex(&mut self.git.branch);

        ex(&mut self.build.language);
        ex(&mut self.build.install_command);
        ex(&mut self.build.build_command);
        ex(&mut self.build.test_command);
        ex(&mut self.build.output_dir);

        let ios = &mut self.ios;
        for field in [
            &mut ios.workspace_path,
            &mut ios.project_path,
            &mut ios.scheme,
            &mut ios.configuration,
            &mut ios.sdk,
            &mut ios.export_method,
            &mut ios.bundle_id,
            &mut ios.team_id,
            &mut ios.provisioning_profile,
            &mut ios.code_sign_identity,
            &mut ios.archive_path,
            &mut ios.export_path,
            &mut ios.simulator_destination,
        ] {
            ex(field);
        }

        let asc = &mut self.app_store_connect;
        for field in [
            &mut asc.apple_id,
            &mut asc.app_specific_password,
            &mut asc.api_key_id,
            &mut asc.api_issuer_id,
            &mut asc.api_key_path,
            &mut asc.team_id,
        ] {
            ex(field);
        }

        for value in self.environment.variables.values_mut() {
            ex(value);
        }
    }

    /// Checks the configuration before any tool runs.
    pub fn validate(&self) -> Result<()> {
        if self.git.repo_url.is_empty() {
            bail!("git.repo_url is required");
        }
        if self.project.project_type.is_empty() {
            bail!("project.type is required");
        }
        if self.is_ios() {
            self.validate_ios()?;
        }
        Ok(())
    }

    fn validate_ios(&self) -> Result<()> {
        let ios = &self.ios;
        if ios.scheme.is_empty() {
            bail!("ios.scheme is required for iOS projects");
        }
        if !ios.automatic_signing {
            if ios.provisioning_profile.is_empty() {
                bail!("ios.provisioning_profile is required when automatic_signing is false");
            }
            if ios.code_sign_identity.is_empty() {
                bail!("ios.code_sign_identity is required when automatic_signing is false");
            }
        }
        if !ios.configuration.is_empty() && !VALID_CONFIGURATIONS.contains(&ios.configuration.as_str())
        {
            bail!("ios.configuration must be 'Debug' or 'Release'");
        }
        if !ios.sdk.is_empty() && !VALID_SDKS.contains(&ios.sdk.as_str()) {
            bail!("ios.sdk must be one of: {}", VALID_SDKS.join(", "));
        }
        if !ios.export_method.is_empty()
            && !VALID_EXPORT_METHODS.contains(&ios.export_method.as_str())
        {
            bail!(
                "ios.export_method must be one of: {}",
                VALID_EXPORT_METHODS.join(", ")
            );
        }
        if ios.upload_to_testflight {
            self.validate_app_store_connect()?;
        }
        Ok(())
    }

    fn validate_app_store_connect(&self) -> Result<()> {
        let asc = &self.app_store_connect;
        let has_api_key =
            !asc.api_key_id.is_empty() && !asc.api_issuer_id.is_empty() && !asc.api_key_path.is_empty();
        let has_apple_id = !asc.apple_id.is_empty() && !asc.app_specific_password.is_empty();

        if !has_api_key && !has_apple_id {
            bail!(
                "app_store_connect credentials required for TestFlight upload. \
                 Provide either (api_key_id, api_issuer_id, api_key_path) or (apple_id, app_specific_password)"
            );
        }
        if has_api_key && !Path::new(&asc.api_key_path).exists() {
            bail!(
                "App Store Connect API key file not found at: {}",
                asc.api_key_path
            );
        }
        Ok(())
    }

    pub fn is_ios(&self) -> bool {
        IOS_LANGUAGES.contains(&self.build.language.as_str())
    }

    /// Directory name the repository is cloned into: the last URL segment
    /// without `.git`.
    pub fn project_dir_name(&self) -> Option<String> {
        project_dir_name(&self.git.repo_url)
    }

    pub fn build_target(&self) -> BuildTarget {
        let target = if !self.ios.workspace_path.is_empty() {
            Some(ProjectTarget::Workspace(PathBuf::from(&self.ios.workspace_path)))
        } else if !self.ios.project_path.is_empty() {
            Some(ProjectTarget::Project(PathBuf::from(&self.ios.project_path)))
        } else {
            None
        };
        BuildTarget::new(self.ios.scheme.clone())
            .with_target(target)
            .with_configuration(self.ios.configuration.clone())
            .with_sdk(self.ios.sdk.clone())
    }

    pub fn signing_policy(&self) -> SigningPolicy {
        if self.ios.automatic_signing {
            SigningPolicy::Automatic {
                team_id: self.ios.team_id.clone(),
                bundle_id: self.ios.bundle_id.clone(),
            }
        } else {
            SigningPolicy::Manual {
                code_sign_identity: self.ios.code_sign_identity.clone(),
                provisioning_profile: self.ios.provisioning_profile.clone(),
                team_id: self.ios.team_id.clone(),
            }
        }
    }

    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings {
            method: non_empty(&self.ios.export_method),
            team_id: self.ios.team_id.clone(),
            fallback_team_id: self.app_store_connect.team_id.clone(),
            export_dir: non_empty(&self.ios.export_path).map(PathBuf::from),
            project_name: non_empty(&self.project.name),
        }
    }

    pub fn branch(&self) -> Option<&str> {
        Some(self.git.branch.as_str()).filter(|b| !b.is_empty())
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        non_empty(&self.build.output_dir).map(PathBuf::from)
    }

    pub fn archive_path(&self) -> Option<PathBuf> {
        non_empty(&self.ios.archive_path).map(PathBuf::from)
    }

    pub fn credentials(&self) -> CredentialSet {
        let asc = &self.app_store_connect;
        CredentialSet {
            api_key: ApiKey {
                key_id: asc.api_key_id.clone(),
                issuer_id: asc.api_issuer_id.clone(),
                key_path: non_empty(&asc.api_key_path).map(PathBuf::from),
            },
            apple_account: AppleAccount {
                apple_id: asc.apple_id.clone(),
                app_specific_password: asc.app_specific_password.clone(),
            },
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("toml")
}

/// Last path segment of a repository URL, without a trailing `/` or `.git`.
pub fn project_dir_name(repo_url: &str) -> Option<String> {
    let trimmed = repo_url.trim_end_matches('/');
    let segment = trimmed.rsplit(['/', ':']).next()?;
    let name = segment.strip_suffix(".git").unwrap_or(segment);
    non_empty(name)
}

/// Expands `$VAR` and `${VAR}` through `lookup` (unset variables become
/// empty), then `~`, a leading `~/` and any ` ~/` against `home`.
pub fn expand_env_vars(
    value: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
    home: Option<&Path>,
) -> String {
    if value.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                out.push_str(&lookup(&braced[..end]).unwrap_or_default());
                rest = &braced[end + 1..];
                continue;
            }
        } else {
            let len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            if len > 0 {
                out.push_str(&lookup(&after[..len]).unwrap_or_default());
                rest = &after[len..];
                continue;
            }
        }

        out.push('$');
        rest = after;
    }
    out.push_str(rest);

    match home {
        Some(home) if out.contains('~') => expand_tildes(&out, home),
        _ => out,
    }
}

fn expand_tildes(value: &str, home: &Path) -> String {
    let home = home.display().to_string();
    if value == "~" {
        return home;
    }
    let value = match value.strip_prefix("~/") {
        Some(rest) => format!("{home}/{rest}"),
        None => value.to_string(),
    };
    value.replace(" ~/", &format!(" {home}/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn vars(name: &str) -> Option<String> {
        match name {
            "HOME" => Some("/home/dev".to_string()),
            "KEY_ID" => Some("ABC123".to_string()),
            "TEAM" => Some("TEAM1".to_string()),
            _ => None,
        }
    }

    fn ios_config() -> AutolifeConfig {
        AutolifeConfig {
            project: ProjectConfig {
                name: "MyApp".into(),
                project_type: "mobile".into(),
                ..Default::default()
            },
            git: GitConfig {
                repo_url: "https://github.com/acme/MyApp.git".into(),
                ..Default::default()
            },
            build: BuildConfig {
                language: "swift".into(),
                ..Default::default()
            },
            ios: IosConfig {
                scheme: "MyApp".into(),
                automatic_signing: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_expand_dollar_forms() {
        let home = Path::new("/home/dev");
        assert_eq!(expand_env_vars("$KEY_ID", &vars, Some(home)), "ABC123");
        assert_eq!(expand_env_vars("id-${TEAM}-x", &vars, Some(home)), "id-TEAM1-x");
        assert_eq!(expand_env_vars("$UNSET/path", &vars, Some(home)), "/path");
        assert_eq!(expand_env_vars("cost $", &vars, Some(home)), "cost $");
        assert_eq!(expand_env_vars("${UNCLOSED", &vars, Some(home)), "${UNCLOSED");
    }

    #[test]
    fn test_expand_tilde_forms() {
        let home = Path::new("/home/dev");
        assert_eq!(expand_env_vars("~", &vars, Some(home)), "/home/dev");
        assert_eq!(
            expand_env_vars("~/keys/AuthKey.p8", &vars, Some(home)),
            "/home/dev/keys/AuthKey.p8"
        );
        assert_eq!(
            expand_env_vars("cp ~/a ~/b", &vars, Some(home)),
            "cp /home/dev/a /home/dev/b"
        );
        assert_eq!(expand_env_vars("a~b", &vars, Some(home)), "a~b");
        assert_eq!(expand_env_vars("~/x", &vars, None), "~/x");
    }

    #[test]
    fn test_load_json_and_expand() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            r#"{
  "project": { "name": "MyApp", "type": "mobile" },
  "git": { "repo_url": "https://github.com/acme/MyApp.git", "auth_type": "token" },
  "build": { "language": "swift" },
  "ios": { "scheme": "MyApp", "automatic_signing": true, "sdk": "iphoneos" },
  "environment": { "variables": { "ENV": "production" } }
}"#,
        )
        .unwrap();

        let config = AutolifeConfig::load_from_file(&path).unwrap();
        assert_eq!(config.ios.scheme, "MyApp");
        assert_eq!(config.ios.sdk, "iphoneos");
        assert!(config.is_ios());
        assert_eq!(
            config.environment.variables.get("ENV").map(String::as_str),
            Some("production")
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_load_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("autolife.toml");
        fs::write(
            &path,
            r#"
[project]
name = "MyApp"
type = "mobile"

[git]
repo_url = "git@github.com:acme/MyApp.git"

[ios]
scheme = "MyApp"
export_method = "ad-hoc"
"#,
        )
        .unwrap();

        let config = AutolifeConfig::load_from_file(&path).unwrap();
        assert_eq!(config.ios.export_method, "ad-hoc");
        assert_eq!(config.project_dir_name().as_deref(), Some("MyApp"));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = AutolifeConfig::load_from_file(&temp_dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_expand_config_fields() {
        let mut config = ios_config();
        config.app_store_connect.api_key_id = "$KEY_ID".into();
        config.app_store_connect.api_key_path = "~/keys/AuthKey.p8".into();
        config.environment.variables.insert("TEAM".into(), "${TEAM}".into());

        config.expand(&vars, Some(Path::new("/home/dev")));
        assert_eq!(config.app_store_connect.api_key_id, "ABC123");
        assert_eq!(config.app_store_connect.api_key_path, "/home/dev/keys/AuthKey.p8");
        assert_eq!(config.environment.variables["TEAM"], "TEAM1");
    }

    #[test]
    fn test_validate_required_fields() {
        let mut config = ios_config();
        config.git.repo_url.clear();
        assert_eq!(config.validate().unwrap_err().to_string(), "git.repo_url is required");

        let mut config = ios_config();
        config.project.project_type.clear();
        assert_eq!(config.validate().unwrap_err().to_string(), "project.type is required");

        let mut config = ios_config();
        config.ios.scheme.clear();
        assert!(config.validate().unwrap_err().to_string().contains("ios.scheme"));
    }

    #[test]
    fn test_validate_ios_rules_skipped_for_other_languages() {
        let mut config = ios_config();
        config.build.language = "go".into();
        config.ios.scheme.clear();
        config.ios.sdk = "android".into();
        config.validate().unwrap();
    }

    #[test]
    fn test_checkout_and_output_settings() {
        let mut config = ios_config();
        assert_eq!(config.branch(), None);
        assert_eq!(config.output_dir(), None);

        config.git.branch = "release/2.0".into();
        config.build.output_dir = "./bin".into();
        assert_eq!(config.branch(), Some("release/2.0"));
        assert_eq!(config.output_dir(), Some(PathBuf::from("./bin")));
    }

    #[test]
    fn test_validate_manual_signing() {
        let mut config = ios_config();
        config.ios.automatic_signing = false;
        config.ios.code_sign_identity = "iPhone Distribution".into();
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("ios.provisioning_profile"));

        config.ios.provisioning_profile = "Dist".into();
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_enumerations() {
        let mut config = ios_config();
        config.ios.configuration = "Profile".into();
        assert!(config.validate().is_err());

        let mut config = ios_config();
        config.ios.sdk = "watchos".into();
        assert!(config.validate().unwrap_err().to_string().contains("ios.sdk"));

        let mut config = ios_config();
        config.ios.export_method = "store".into();
        assert!(config.validate().unwrap_err().to_string().contains("ios.export_method"));
    }

    #[test]
    fn test_validate_upload_credentials() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = ios_config();
        config.ios.upload_to_testflight = true;
        assert!(config.validate().unwrap_err().to_string().contains("credentials required"));

        config.app_store_connect.api_key_id = "KEY".into();
        config.app_store_connect.api_issuer_id = "ISSUER".into();
        config.app_store_connect.api_key_path =
            temp_dir.path().join("AuthKey_KEY.p8").display().to_string();
        assert!(config.validate().unwrap_err().to_string().contains("API key file not found"));

        fs::write(temp_dir.path().join("AuthKey_KEY.p8"), "key").unwrap();
        config.validate().unwrap();

        let mut config = ios_config();
        config.ios.upload_to_testflight = true;
        config.app_store_connect.apple_id = "dev@example.com".into();
        config.app_store_connect.app_specific_password = "abcd-efgh".into();
        config.validate().unwrap();
    }

    #[test]
    fn test_project_dir_name() {
        assert_eq!(
            project_dir_name("https://github.com/acme/MyApp.git").as_deref(),
            Some("MyApp")
        );
        assert_eq!(
            project_dir_name("https://github.com/acme/MyApp/").as_deref(),
            Some("MyApp")
        );
        assert_eq!(
            project_dir_name("git@github.com:acme/tool.git").as_deref(),
            Some("tool")
        );
        assert_eq!(project_dir_name(""), None);
    }

    #[test]
    fn test_sdk_conversions() {
        let mut config = ios_config();
        config.ios.workspace_path = "MyApp.xcworkspace".into();
        config.ios.project_path = "MyApp.xcodeproj".into();
        config.ios.configuration = "Release".into();
        config.ios.export_path = "build/export".into();
        config.app_store_connect.team_id = "ASC1".into();

        let target = config.build_target();
        assert_eq!(
            target.target,
            Some(ProjectTarget::Workspace("MyApp.xcworkspace".into()))
        );
        assert_eq!(target.configuration.as_deref(), Some("Release"));
        assert!(target.sdk.is_none());

        let export = config.export_settings();
        assert_eq!(export.team_id(), "ASC1");
        assert_eq!(export.method(), "app-store");
        assert_eq!(export.export_dir, Some(PathBuf::from("build/export")));
        assert_eq!(export.project_name.as_deref(), Some("MyApp"));

        assert!(matches!(config.signing_policy(), SigningPolicy::Automatic { .. }));
        assert!(config.archive_path().is_none());
        assert!(!config.credentials().is_usable());
    }
}
