//! TestFlight upload through `xcrun altool`.

use std::path::Path;

use crate::runner::Invocation;
use crate::types::{AutolifeError, CredentialSet, UploadCredentials};

/// Environment variable `altool` reads to locate `AuthKey_<id>.p8`.
const PRIVATE_KEYS_DIR_VAR: &str = "API_PRIVATE_KEYS_DIR";

/// Builds the `altool` invocation for the preferred credential scheme.
///
/// The API key is used whenever a key ID is configured, even if Apple ID
/// credentials are present as well. Without either, nothing is built.
pub fn upload_invocation(
    ipa: &Path,
    credentials: &CredentialSet,
) -> Result<Invocation, AutolifeError> {
    let base = Invocation::new("xcrun").args([
        "altool",
        "--upload-app",
        "--type",
        "ios",
        "--file",
    ]);
    let base = base.arg(ipa.display().to_string());

    match credentials.select() {
        Some(UploadCredentials::ApiKey(key)) => {
            tracing::info!(key_id = %key.key_id, "using App Store Connect API key authentication");
            let mut inv = base
                .args(["--apiKey", key.key_id.as_str()])
                .args(["--apiIssuer", key.issuer_id.as_str()]);
            let keys_dir = key
                .key_path
                .as_deref()
                .and_then(Path::parent)
                .filter(|dir| !dir.as_os_str().is_empty());
            if let Some(dir) = keys_dir {
                inv = inv.env(PRIVATE_KEYS_DIR_VAR, dir.display().to_string());
            }
            Ok(inv)
        }
        Some(UploadCredentials::AppleAccount(account)) => {
            tracing::info!(apple_id = %account.apple_id, "using Apple ID authentication");
            Ok(base
                .args(["--username", account.apple_id.as_str()])
                .args(["--password", account.app_specific_password.as_str()]))
        }
        None => Err(AutolifeError::NoCredentials),
    }
}
