// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup into an immutable [`Config`] that is handed to the
//! components that need it.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `REDIS_HOST` | Redis host | `localhost` |
//! | `REDIS_PORT` | Redis port | `6379` |
//! | `REDIS_PASSWORD` | Redis password | empty |
//! | `REDIS_DB` | Redis logical database | `0` |
//! | `REDIS_PREFIX` | Prefix applied to every record key | `okuru_` |
//! | `OKURU_TOKEN_SEPARATOR` | Separator between storage key and encryption key | `~` |
//! | `NO_SSL` | Keep `http` links instead of upgrading to `https` | `false` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `OKURU_APP_PORT` | Server bind port | `4000` |
//! | `OKURU_APP_NAME` | Display name | `送る` |
//! | `OKURU_LOGO` | Logo URL | empty |
//! | `OKURU_DISCLAIMER` | Disclaimer text | MIT-style warranty notice |
//! | `OKURU_COPYRIGHT` | Copyright line | empty |
//! | `OKURU_FILE_FOLDER` | Directory holding file bundles | `data/` |
//! | `OKURU_MAX_FILE_SIZE` | Upload limit in MiB | `1024` |
//! | `OKURU_STRICT_VIEWS` | Atomic view accounting | `false` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const REDIS_HOST_ENV: &str = "REDIS_HOST";
pub const REDIS_PORT_ENV: &str = "REDIS_PORT";
pub const REDIS_PASSWORD_ENV: &str = "REDIS_PASSWORD";
pub const REDIS_DB_ENV: &str = "REDIS_DB";
pub const REDIS_PREFIX_ENV: &str = "REDIS_PREFIX";
pub const TOKEN_SEPARATOR_ENV: &str = "OKURU_TOKEN_SEPARATOR";
pub const NO_SSL_ENV: &str = "NO_SSL";
pub const HOST_ENV: &str = "HOST";
pub const APP_PORT_ENV: &str = "OKURU_APP_PORT";
pub const APP_NAME_ENV: &str = "OKURU_APP_NAME";
pub const LOGO_ENV: &str = "OKURU_LOGO";
pub const DISCLAIMER_ENV: &str = "OKURU_DISCLAIMER";
pub const COPYRIGHT_ENV: &str = "OKURU_COPYRIGHT";
pub const FILE_FOLDER_ENV: &str = "OKURU_FILE_FOLDER";
pub const MAX_FILE_SIZE_ENV: &str = "OKURU_MAX_FILE_SIZE";
pub const STRICT_VIEWS_ENV: &str = "OKURU_STRICT_VIEWS";

/// Environment variable selecting the log output format (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

pub const DEFAULT_REDIS_PREFIX: &str = "okuru_";
pub const DEFAULT_TOKEN_SEPARATOR: &str = "~";

/// Upload limit in MiB when `OKURU_MAX_FILE_SIZE` is unset or unparsable.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 1024;

const DEFAULT_DISCLAIMER: &str = "\
THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR\n\
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,\n\
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE\n\
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER\n\
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,\n\
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE\n\
SOFTWARE.";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name} '{value}'")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("token separator '{0}' collides with storage or encryption key characters")]
    UnsafeSeparator(String),
    #[error("cannot resolve file folder: {0}")]
    FileFolder(#[from] std::io::Error),
}

/// Connection settings for the Redis metadata store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

/// Display strings returned by the info endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branding {
    pub app_name: String,
    pub logo: String,
    pub disclaimer: String,
    pub copyright: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub redis: RedisConfig,
    pub key_prefix: String,
    pub token_separator: String,
    pub no_ssl: bool,
    pub host: String,
    pub port: u16,
    pub branding: Branding,
    pub file_folder: PathBuf,
    /// Upload limit in bytes.
    pub max_file_size: u64,
    pub strict_views: bool,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let get_or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let redis = RedisConfig {
            host: get_or(REDIS_HOST_ENV, "localhost"),
            port: parse_number(REDIS_PORT_ENV, get(REDIS_PORT_ENV), 6379)?,
            password: get(REDIS_PASSWORD_ENV),
            db: parse_number(REDIS_DB_ENV, get(REDIS_DB_ENV), 0)?,
        };

        let key_prefix = get_or(REDIS_PREFIX_ENV, DEFAULT_REDIS_PREFIX);

        let token_separator = get_or(TOKEN_SEPARATOR_ENV, DEFAULT_TOKEN_SEPARATOR);
        validate_separator(&token_separator)?;

        let no_ssl = get(NO_SSL_ENV).map(|v| parse_flag(&v)).unwrap_or(false);
        let strict_views = get(STRICT_VIEWS_ENV)
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let host = get_or(HOST_ENV, "0.0.0.0");
        let port = parse_number(APP_PORT_ENV, get(APP_PORT_ENV), 4000)?;

        let branding = Branding {
            app_name: get_or(APP_NAME_ENV, "送る"),
            logo: get(LOGO_ENV).unwrap_or_default(),
            disclaimer: get_or(DISCLAIMER_ENV, DEFAULT_DISCLAIMER),
            copyright: get(COPYRIGHT_ENV).unwrap_or_default(),
        };

        let file_folder = absolute(Path::new(&get_or(FILE_FOLDER_ENV, "data/")))?;

        // An unparsable size silently falls back to the default limit.
        let max_file_size_mb = get(MAX_FILE_SIZE_ENV)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_MAX_FILE_SIZE_MB);

        Ok(Self {
            redis,
            key_prefix,
            token_separator,
            no_ssl,
            host,
            port,
            branding,
            file_folder,
            max_file_size: max_file_size_mb.saturating_mul(1024 * 1024),
            strict_views,
        })
    }

    /// Configuration suitable for tests and local tooling.
    pub fn for_tests(file_folder: impl Into<PathBuf>) -> Self {
        Self {
            redis: RedisConfig {
                host: "localhost".to_string(),
                port: 6379,
                password: None,
                db: 0,
            },
            key_prefix: DEFAULT_REDIS_PREFIX.to_string(),
            token_separator: DEFAULT_TOKEN_SEPARATOR.to_string(),
            no_ssl: true,
            host: "127.0.0.1".to_string(),
            port: 4000,
            branding: Branding {
                app_name: "送る".to_string(),
                logo: String::new(),
                disclaimer: DEFAULT_DISCLAIMER.to_string(),
                copyright: String::new(),
            },
            file_folder: file_folder.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE_MB * 1024 * 1024,
            strict_views: false,
        }
    }

    /// Socket address string the HTTP server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Storage keys are UUIDs and encryption keys are URL-safe base64, so a
/// separator made of those characters would make tokens ambiguous.
fn validate_separator(separator: &str) -> Result<(), ConfigError> {
    if separator.is_empty() {
        return Err(ConfigError::Empty(TOKEN_SEPARATOR_ENV));
    }
    if separator
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::UnsafeSeparator(separator.to_string()));
    }
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf, std::io::Error> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.redis.host, "localhost");
        assert_eq!(config.redis.port, 6379);
        assert_eq!(config.redis.password, None);
        assert_eq!(config.redis.db, 0);
        assert_eq!(config.key_prefix, "okuru_");
        assert_eq!(config.token_separator, "~");
        assert!(!config.no_ssl);
        assert!(!config.strict_views);
        assert_eq!(config.port, 4000);
        assert_eq!(config.max_file_size, 1024 * 1024 * 1024);
        assert!(config.file_folder.is_absolute());
        assert!(config.file_folder.ends_with("data"));
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            (REDIS_HOST_ENV, "redis.internal"),
            (REDIS_PORT_ENV, "6380"),
            (REDIS_PASSWORD_ENV, "hunter2"),
            (REDIS_DB_ENV, "3"),
            (REDIS_PREFIX_ENV, "tenant_a_"),
            (TOKEN_SEPARATOR_ENV, "!"),
            (NO_SSL_ENV, "true"),
            (STRICT_VIEWS_ENV, "1"),
            (MAX_FILE_SIZE_ENV, "10"),
            (FILE_FOLDER_ENV, "/srv/okuru"),
        ])
        .unwrap();

        assert_eq!(config.redis.host, "redis.internal");
        assert_eq!(config.redis.port, 6380);
        assert_eq!(config.redis.password.as_deref(), Some("hunter2"));
        assert_eq!(config.redis.db, 3);
        assert_eq!(config.key_prefix, "tenant_a_");
        assert_eq!(config.token_separator, "!");
        assert!(config.no_ssl);
        assert!(config.strict_views);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.file_folder, PathBuf::from("/srv/okuru"));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = load(&[(REDIS_PORT_ENV, "not-a-port")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                name: REDIS_PORT_ENV,
                ..
            }
        ));
    }

    #[test]
    fn unparsable_max_file_size_falls_back() {
        let config = load(&[(MAX_FILE_SIZE_ENV, "lots")]).unwrap();
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE_MB * 1024 * 1024);
    }

    #[test]
    fn separator_must_not_overlap_key_alphabet() {
        assert!(matches!(
            load(&[(TOKEN_SEPARATOR_ENV, "-")]).unwrap_err(),
            ConfigError::UnsafeSeparator(_)
        ));
        assert!(matches!(
            load(&[(TOKEN_SEPARATOR_ENV, "ab")]).unwrap_err(),
            ConfigError::UnsafeSeparator(_)
        ));
        assert!(load(&[(TOKEN_SEPARATOR_ENV, "::")]).is_ok());
    }
}
