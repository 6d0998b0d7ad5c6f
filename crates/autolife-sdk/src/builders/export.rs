//! Export options and exported package resolution.

use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{AutolifeError, EXPORT_OPTIONS_FILE, ExportSettings, IPA_EXTENSION};

/// Renders the export options property list handed to
/// `xcodebuild -exportArchive`.
///
/// Bitcode upload and compilation are always disabled and symbol upload is
/// always enabled.
pub fn render_export_options(settings: &ExportSettings) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>method</key>
    <string>{}</string>
    <key>teamID</key>
    <string>{}</string>
    <key>uploadBitcode</key>
    <false/>
    <key>uploadSymbols</key>
    <true/>
    <key>compileBitcode</key>
    <false/>
</dict>
</plist>
"#,
        escape_xml(settings.method()),
        escape_xml(settings.team_id())
    )
}

/// Writes the export options into `export_dir`, replacing any previous file.
pub fn write_export_options(
    export_dir: &Path,
    settings: &ExportSettings,
) -> Result<PathBuf, AutolifeError> {
    let path = export_dir.join(EXPORT_OPTIONS_FILE);
    fs::write(&path, render_export_options(settings)).map_err(|source| {
        AutolifeError::WriteFile {
            path: path.clone(),
            source,
        }
    })?;
    Ok(path)
}

/// Finds the `.ipa` produced by an export.
///
/// `xcodebuild` picks the file name itself, so this first checks
/// `<export_dir>/<project_name>.ipa` and otherwise takes the first `.ipa`
/// file in the directory. Entries are sorted by name so repeated calls on an
/// unchanged directory agree.
pub fn resolve_ipa(export_dir: &Path, project_name: Option<&str>) -> Result<PathBuf, AutolifeError> {
    if let Some(name) = project_name.filter(|n| !n.is_empty()) {
        let candidate = export_dir.join(format!("{name}.{IPA_EXTENSION}"));
        if candidate.is_file() {
            return Ok(candidate);
        }
        tracing::debug!(candidate = %candidate.display(), "expected IPA not found, scanning export directory");
    }

    let suffix = format!(".{IPA_EXTENSION}");
    let mut matches: Vec<PathBuf> = fs::read_dir(export_dir)
        .map(|entries| {
            entries
                .flatten()
                .filter(|entry| entry.path().is_file())
                .filter(|entry| entry.file_name().to_string_lossy().ends_with(&suffix))
                .map(|entry| entry.path())
                .collect()
        })
        .unwrap_or_default();
    matches.sort();

    matches
        .into_iter()
        .next()
        .ok_or_else(|| AutolifeError::PackageNotFound(export_dir.to_path_buf()))
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
