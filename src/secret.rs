//! API key lookup.
//!
//! The key is read once at startup and handed to [`chat_api::ChatApiConfig`];
//! it is never written to logs or error messages.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use transcript_store::expand_user_path;

/// Key file used when neither a key file nor `OPENROUTER_API_KEY` is configured.
pub const DEFAULT_API_KEY_FILE: &str = "~/api-openrouter.txt";

/// Resolves the API key.
///
/// An explicit key file wins over the inline key, which wins over
/// [`DEFAULT_API_KEY_FILE`]. Surrounding whitespace is stripped.
pub fn resolve_api_key(key_file: Option<&str>, inline_key: Option<&str>) -> anyhow::Result<String> {
    if let Some(file) = key_file {
        return read_api_key_file(&expand_user_path(file));
    }

    if let Some(key) = inline_key.map(str::trim).filter(|key| !key.is_empty()) {
        return Ok(key.to_string());
    }

    read_api_key_file(&expand_user_path(DEFAULT_API_KEY_FILE))
}

pub fn read_api_key_file(path: &Path) -> anyhow::Result<String> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading API key file {}", path.display()))?;
    let key = raw.trim();
    if key.is_empty() {
        bail!("API key file {} is empty", path.display());
    }
    Ok(key.to_string())
}
