//! Filesystem-safe names for retrieved assets.
//!
//! Final files are named `<clean_name>___<asset_id>.<extension>`; the id
//! suffix keeps same-named assets apart and makes the name stable across
//! runs, which is what skip-if-exists relies on. In-flight writes go to a
//! hidden `.part` sibling.

use std::path::{Path, PathBuf};

use crate::provider::AssetDescriptor;

/// Base name used when nothing printable survives cleaning.
pub const UNTITLED: &str = "untitled";

/// Extension used when the provider reports none.
pub const FALLBACK_EXTENSION: &str = "bin";

/// Separator between the cleaned name and the asset id.
const ID_SEPARATOR: &str = "___";

/// Upper bound on the cleaned base name, in characters.
const MAX_BASE_CHARS: usize = 120;

/// Turns a display name into a filesystem-safe base name.
///
/// Whitespace, `-` and `_` runs collapse to one `_`; ASCII punctuation other
/// than `.` and control characters are dropped without breaking a separator
/// run. A trailing `.<extension>` is removed case-insensitively.
///
/// ```
/// use soundgrab_core::download::clean_name;
///
/// assert_eq!(clean_name("Rain - Heavy.wav", "wav"), "Rain_Heavy");
/// assert_eq!(clean_name("???", "wav"), "untitled");
/// ```
#[must_use]
pub fn clean_name(display_name: &str, extension: &str) -> String {
    let mut out = String::with_capacity(display_name.len());
    let mut pending_separator = false;

    for ch in display_name.chars() {
        if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_separator = true;
        } else if ch.is_control() || (ch.is_ascii_punctuation() && ch != '.') {
            continue;
        } else {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(ch);
        }
    }

    let extension = clean_extension(extension);
    let stem = strip_extension(&out, &extension);
    let truncated: String = stem.chars().take(MAX_BASE_CHARS).collect();
    let trimmed = truncated
        .trim_start_matches('.')
        .trim_end_matches(['_', '.']);

    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Reduces an extension to lower-case ASCII alphanumerics.
#[must_use]
pub fn clean_extension(extension: &str) -> String {
    let cleaned: String = extension
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if cleaned.is_empty() {
        FALLBACK_EXTENSION.to_string()
    } else {
        cleaned
    }
}

/// Final filename for an asset: `<clean_name>___<id>.<extension>`.
#[must_use]
pub fn asset_filename(asset: &AssetDescriptor) -> String {
    format!(
        "{}{ID_SEPARATOR}{}.{}",
        clean_name(&asset.display_name, &asset.extension),
        asset.id,
        clean_extension(&asset.extension)
    )
}

/// Temporary path an asset is written to before the final rename.
#[must_use]
pub fn partial_path(target_dir: &Path, filename: &str) -> PathBuf {
    target_dir.join(format!(".{filename}.part"))
}

fn strip_extension<'a>(name: &'a str, extension: &str) -> &'a str {
    let suffix_len = extension.len() + 1;
    if name.len() < suffix_len {
        return name;
    }
    let split = name.len() - suffix_len;
    match (name.get(..split), name.get(split..)) {
        (Some(stem), Some(suffix))
            if suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(extension) =>
        {
            stem
        }
        _ => name,
    }
}
