//! Application configuration loading for CLI defaults.
//!
//! The config file is a flat `key = value` subset of TOML. Strings are
//! double-quoted, integers are bare, `#` starts a comment.
//!
//! ```toml
//! client_id = "abc123"
//! client_secret = "s3cret"
//! output_dir = "/data/sounds"
//! concurrency = 4
//! minute_limit = 60
//! ```

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use soundgrab_core::engine::{MAX_CONCURRENCY, MIN_CONCURRENCY};

/// Environment variable overriding `client_id`.
pub const ENV_CLIENT_ID: &str = "SOUNDGRAB_CLIENT_ID";

/// Environment variable overriding `client_secret`.
pub const ENV_CLIENT_SECRET: &str = "SOUNDGRAB_CLIENT_SECRET";

/// Environment variable supplying a ready access token.
pub const ENV_ACCESS_TOKEN: &str = "SOUNDGRAB_ACCESS_TOKEN";

/// File-backed defaults. Every field is optional; absent fields fall back
/// to the engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// OAuth2 application client id.
    pub client_id: Option<String>,
    /// OAuth2 application client secret.
    pub client_secret: Option<String>,
    /// Default output directory.
    pub output_dir: Option<PathBuf>,
    /// Default concurrency (same range as CLI).
    pub concurrency: Option<usize>,
    /// Default attempts per asset.
    pub max_retries: Option<u32>,
    /// Requests per day.
    pub daily_limit: Option<u32>,
    /// Requests per hour.
    pub hourly_limit: Option<u32>,
    /// Requests per minute.
    pub minute_limit: Option<u32>,
    /// Headroom kept below every ceiling.
    pub rate_buffer: Option<u32>,
    /// Longest cumulative wait for one throttle slot, in seconds.
    pub max_throttle_wait_secs: Option<u64>,
}

impl FileConfig {
    /// Validates config values against CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency)
        {
            bail!(
                "Invalid config value for `concurrency`: {concurrency}. Expected range: {MIN_CONCURRENCY}..={MAX_CONCURRENCY}"
            );
        }

        if let Some(max_retries) = self.max_retries
            && !(1..=10).contains(&max_retries)
        {
            bail!("Invalid config value for `max_retries`: {max_retries}. Expected range: 1..=10");
        }

        for (field, value) in [
            ("daily_limit", self.daily_limit),
            ("hourly_limit", self.hourly_limit),
            ("minute_limit", self.minute_limit),
        ] {
            if value == Some(0) {
                bail!("Invalid config value for `{field}`: 0. Expected a positive integer");
            }
        }

        if let Some(secs) = self.max_throttle_wait_secs
            && secs > 24 * 60 * 60
        {
            bail!(
                "Invalid config value for `max_throttle_wait_secs`: {secs}. Expected range: 0..=86400"
            );
        }

        Ok(())
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/soundgrab/config.toml`
/// 2. `$HOME/.config/soundgrab/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    resolve_config_path_with(|name| env::var_os(name))
}

fn resolve_config_path_with(lookup: impl Fn(&str) -> Option<OsString>) -> Option<PathBuf> {
    let non_empty = |name: &str| lookup(name).filter(|value| !value.is_empty());

    if let Some(xdg_config_home) = non_empty("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("soundgrab")
                .join("config.toml"),
        );
    }

    let home = non_empty("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("soundgrab")
            .join("config.toml"),
    )
}

/// Loads config from default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

/// Loads and validates a config file.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Reads a non-empty environment variable.
#[must_use]
pub fn env_non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let line_no = line_index + 1;
        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "client_id" => cfg.client_id = Some(parse_string_literal(value).with_context(invalid)?),
            "client_secret" => {
                cfg.client_secret = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "output_dir" => {
                cfg.output_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "concurrency" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                cfg.concurrency = Some(usize::try_from(parsed).with_context(invalid)?);
            }
            "max_retries" => cfg.max_retries = Some(parse_integer_u32(value).with_context(invalid)?),
            "daily_limit" => cfg.daily_limit = Some(parse_integer_u32(value).with_context(invalid)?),
            "hourly_limit" => {
                cfg.hourly_limit = Some(parse_integer_u32(value).with_context(invalid)?);
            }
            "minute_limit" => {
                cfg.minute_limit = Some(parse_integer_u32(value).with_context(invalid)?);
            }
            "rate_buffer" => cfg.rate_buffer = Some(parse_integer_u32(value).with_context(invalid)?),
            "max_throttle_wait_secs" => {
                cfg.max_throttle_wait_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_integer_u32(raw_value: &str) -> Result<u32> {
    let value = parse_integer_u64(raw_value)?;
    u32::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u32"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_all_fields() {
        let raw = r#"
# credentials
client_id = "abc"
client_secret = "s3cret#1"   # hash inside quotes is kept
output_dir = "/data/sounds"
concurrency = 8
max_retries = 5
daily_limit = 1000
hourly_limit = 500
minute_limit = 30
rate_buffer = 2
max_throttle_wait_secs = 120
"#;
        let cfg = parse_config_str(raw).unwrap();
        assert_eq!(cfg.client_id.as_deref(), Some("abc"));
        assert_eq!(cfg.client_secret.as_deref(), Some("s3cret#1"));
        assert_eq!(cfg.output_dir, Some(PathBuf::from("/data/sounds")));
        assert_eq!(cfg.concurrency, Some(8));
        assert_eq!(cfg.max_retries, Some(5));
        assert_eq!(cfg.daily_limit, Some(1000));
        assert_eq!(cfg.hourly_limit, Some(500));
        assert_eq!(cfg.minute_limit, Some(30));
        assert_eq!(cfg.rate_buffer, Some(2));
        assert_eq!(cfg.max_throttle_wait_secs, Some(120));
    }

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str("concurrency = 2\n").unwrap();
        assert_eq!(
            cfg,
            FileConfig {
                concurrency: Some(2),
                ..FileConfig::default()
            }
        );
    }

    #[test]
    fn test_parse_config_rejects_unknown_key() {
        let err = parse_config_str("rate_limit = 1000").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("concurrency 4").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string() {
        let err = parse_config_str("client_id = abc").unwrap_err();
        assert!(format!("{err:#}").contains("double-quoted"));
    }

    #[test]
    fn test_parse_config_rejects_out_of_range_concurrency() {
        let err = parse_config_str("concurrency = 64").unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_parse_config_rejects_zero_limit() {
        let err = parse_config_str("minute_limit = 0").unwrap_err();
        assert!(err.to_string().contains("minute_limit"));
    }

    #[test]
    fn test_parse_config_rejects_negative_integer() {
        assert!(parse_config_str("max_retries = -1").is_err());
    }

    #[test]
    fn test_resolve_prefers_xdg_config_home() {
        let path = resolve_config_path_with(|name| match name {
            "XDG_CONFIG_HOME" => Some(OsString::from("/xdg")),
            "HOME" => Some(OsString::from("/home/u")),
            _ => None,
        });
        assert_eq!(path, Some(PathBuf::from("/xdg/soundgrab/config.toml")));
    }

    #[test]
    fn test_resolve_falls_back_to_home() {
        let path = resolve_config_path_with(|name| match name {
            "XDG_CONFIG_HOME" => Some(OsString::new()),
            "HOME" => Some(OsString::from("/home/u")),
            _ => None,
        });
        assert_eq!(
            path,
            Some(PathBuf::from("/home/u/.config/soundgrab/config.toml"))
        );
    }

    #[test]
    fn test_resolve_without_home_is_none() {
        assert_eq!(resolve_config_path_with(|_| None), None);
    }

    #[test]
    fn test_load_file_config_reads_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "output_dir = \"/tmp/x\"\n").unwrap();
        let cfg = load_file_config(&path).unwrap();
        assert_eq!(cfg.output_dir, Some(PathBuf::from("/tmp/x")));
    }
}
