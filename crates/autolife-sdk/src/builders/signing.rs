//! Code signing build setting overrides.

use crate::types::SigningPolicy;

/// Derives the `xcodebuild` build setting overrides for a signing policy.
///
/// Always starts with exactly one `CODE_SIGN_STYLE=` entry. Optional
/// settings are emitted only for non-empty fields, in a fixed order.
///
/// # Example
///
/// ```
/// use autolife_sdk::SigningPolicy;
/// use autolife_sdk::builders::signing_args;
///
/// let policy = SigningPolicy::Automatic {
///     team_id: "ABCDE12345".into(),
///     bundle_id: String::new(),
/// };
/// assert_eq!(
///     signing_args(&policy),
///     vec!["CODE_SIGN_STYLE=Automatic", "DEVELOPMENT_TEAM=ABCDE12345"]
/// );
/// ```
pub fn signing_args(policy: &SigningPolicy) -> Vec<String> {
    let mut args = Vec::new();
    match policy {
        SigningPolicy::Automatic { team_id, bundle_id } => {
            args.push("CODE_SIGN_STYLE=Automatic".to_string());
            push_setting(&mut args, "DEVELOPMENT_TEAM", team_id);
            push_setting(&mut args, "PRODUCT_BUNDLE_IDENTIFIER", bundle_id);
        }
        SigningPolicy::Manual {
            code_sign_identity,
            provisioning_profile,
            team_id,
        } => {
            args.push("CODE_SIGN_STYLE=Manual".to_string());
            push_setting(&mut args, "CODE_SIGN_IDENTITY", code_sign_identity);
            push_setting(&mut args, "PROVISIONING_PROFILE_SPECIFIER", provisioning_profile);
            push_setting(&mut args, "DEVELOPMENT_TEAM", team_id);
        }
    }
    args
}

fn push_setting(args: &mut Vec<String>, key: &str, value: &str) {
    if !value.is_empty() {
        args.push(format!("{key}={value}"));
    }
}
