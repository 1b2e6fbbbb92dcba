// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Start-up configuration.
//!
//! Every option can come from a flag or an environment variable; clap merges
//! the two into [`Args`]. [`Config::from_args`] is the only place that turns
//! those raw strings into typed values, and the resulting [`Config`] is
//! handed to every component explicitly. Nothing else in the crate reads the
//! process environment.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args as ClapArgs;

/// Files above 2 GiB are refused by the platform's client API.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// How long an operator has to drop a login code or password file.
pub const DEFAULT_SECRET_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const DEFAULT_SESSION_FILE: &str = "session.json";
pub const DEFAULT_CODE_FILE: &str = "telegram_code.txt";
pub const DEFAULT_PASSWORD_FILE: &str = "telegram_password.txt";

/// Raw command-line / environment surface.
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct Args {
    /// Telegram API ID from https://my.telegram.org
    #[arg(long = "api-id", env = "TELEGRAM_API_ID")]
    pub api_id: Option<String>,

    /// Telegram API hash from https://my.telegram.org
    #[arg(long = "api-hash", env = "TELEGRAM_API_HASH", hide_env_values = true)]
    pub api_hash: Option<String>,

    /// Phone number with country code, e.g. +1234567890
    #[arg(long, env = "TELEGRAM_PHONE", hide_env_values = true)]
    pub phone: Option<String>,

    /// Download folder path
    #[arg(long, env = "TELEGRAM_FOLDER")]
    pub folder: Option<PathBuf>,

    /// Allowed user ID (the only sender whose documents are saved)
    #[arg(long, env = "TELEGRAM_USER_ID")]
    pub user: Option<String>,

    /// Channel/group ID to monitor instead of private messages
    #[arg(long, env = "TELEGRAM_CHANNEL_ID")]
    pub channel: Option<String>,

    /// Comma-separated allowed file extensions, e.g. pdf,txt,docx (empty = all)
    #[arg(long, env = "TELEGRAM_ALLOWED_TYPES")]
    pub types: Option<String>,

    /// Debug logging (true/false)
    #[arg(long, env = "TELEGRAM_DEBUG")]
    pub debug: Option<String>,

    /// Session file path for storing authentication
    #[arg(long, env = "TELEGRAM_SESSION_FILE")]
    pub session: Option<PathBuf>,

    /// File to read the verification code from (waited for)
    #[arg(long = "code-file", env = "TELEGRAM_CODE_FILE")]
    pub code_file: Option<PathBuf>,

    /// File to read the 2FA password from (waited for, only if required)
    #[arg(long = "password-file", env = "TELEGRAM_PASSWORD_FILE")]
    pub password_file: Option<PathBuf>,

    /// Maximum accepted document size in bytes
    #[arg(long = "max-size", env = "TELEGRAM_MAX_FILE_SIZE")]
    pub max_size: Option<String>,

    /// Seconds to wait for a code/password file before giving up
    #[arg(long = "secret-timeout", env = "TELEGRAM_SECRET_TIMEOUT")]
    pub secret_timeout: Option<String>,
}

/// Credentials for the login handshake.
#[derive(Clone)]
pub struct ApiCredentials {
    pub api_id: i32,
    pub api_hash: String,
    pub phone: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .field("phone", &crate::utils::mask_sensitive(&self.phone, 3))
            .finish()
    }
}

/// Resolved, immutable configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiCredentials,
    pub download_dir: PathBuf,
    pub allowed_user: i64,
    /// Present in container mode; `None` means direct-message mode.
    pub container: Option<i64>,
    /// Lower-case, without leading dot. Empty means every type is accepted.
    pub allowed_extensions: Vec<String>,
    pub max_file_size: u64,
    pub session_file: PathBuf,
    pub code_file: PathBuf,
    pub password_file: PathBuf,
    pub secret_timeout: Duration,
    pub debug: bool,
}

/// Fatal start-up configuration problem.
#[derive(Debug)]
pub enum ConfigError {
    /// A required option was not supplied.
    Missing {
        what: &'static str,
        flag: &'static str,
        env: &'static str,
        help: &'static str,
    },
    /// An option was supplied but could not be parsed.
    Invalid {
        flag: &'static str,
        value: String,
        reason: String,
    },
    /// The download folder could not be created.
    DownloadDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { what, flag, env, help } => {
                write!(f, "{} is required. ", what)?;
                if !help.is_empty() {
                    write!(f, "{}. ", help)?;
                }
                write!(f, "Use --{} flag or {} environment variable", flag, env)
            }
            Self::Invalid { flag, value, reason } => {
                write!(f, "Invalid value {:?} for --{}: {}", value, flag, reason)
            }
            Self::DownloadDir { path, source } => {
                write!(f, "Failed to create download folder {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DownloadDir { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Routing strategy implied by the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    /// One-to-one messages from the allowed user.
    Direct,
    /// Posts inside one channel or group.
    Container { container_id: i64 },
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "private messages"),
            Self::Container { container_id } => write!(f, "channel/group {}", container_id),
        }
    }
}

fn required<'a>(
    value: &'a Option<String>,
    what: &'static str,
    flag: &'static str,
    env: &'static str,
    help: &'static str,
) -> Result<&'a str, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing { what, flag, env, help }),
    }
}

fn parse_number<T>(flag: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        flag,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a boolean leniently: `1`, `t`, `true`, `yes`, `on` (any case) are
/// true; `0`, `f`, `false`, `no`, `off` and the empty string are false.
pub fn parse_bool_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "f" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Split a comma-separated extension list into lower-case entries without
/// leading dots, dropping blanks and duplicates.
pub fn parse_extensions(raw: &str) -> Vec<String> {
    let mut extensions: Vec<String> = Vec::new();
    for item in raw.split(',') {
        let ext = item.trim().trim_start_matches('.').to_lowercase();
        if !ext.is_empty() && !extensions.contains(&ext) {
            extensions.push(ext);
        }
    }
    extensions
}

impl Config {
    /// Resolve raw arguments into a validated configuration.
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let api_id_raw = required(
            &args.api_id,
            "API ID",
            "api-id",
            "TELEGRAM_API_ID",
            "Get it from https://my.telegram.org",
        )?;
        let api_id: i32 = parse_number("api-id", api_id_raw)?;
        if api_id == 0 {
            return Err(ConfigError::Missing {
                what: "API ID",
                flag: "api-id",
                env: "TELEGRAM_API_ID",
                help: "Get it from https://my.telegram.org",
            });
        }

        let api_hash = required(
            &args.api_hash,
            "API Hash",
            "api-hash",
            "TELEGRAM_API_HASH",
            "Get it from https://my.telegram.org",
        )?
        .to_string();
        let phone = required(&args.phone, "Phone number", "phone", "TELEGRAM_PHONE", "")?.to_string();

        let download_dir = match &args.folder {
            Some(p) if !p.as_os_str().is_empty() => p.clone(),
            _ => {
                return Err(ConfigError::Missing {
                    what: "Download folder path",
                    flag: "folder",
                    env: "TELEGRAM_FOLDER",
                    help: "",
                })
            }
        };

        let allowed_user: i64 = parse_number(
            "user",
            required(&args.user, "Allowed user ID", "user", "TELEGRAM_USER_ID", "")?,
        )?;

        let container = match args.channel.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let id: i64 = parse_number("channel", raw)?;
                // An explicit zero means "no container", as if unset.
                (id != 0).then_some(id)
            }
            _ => None,
        };

        let allowed_extensions = args
            .types
            .as_deref()
            .map(parse_extensions)
            .unwrap_or_default();

        let debug = match args.debug.as_deref() {
            Some(raw) => parse_bool_flag(raw).unwrap_or_else(|| {
                tracing::warn!("Unrecognised debug value {:?}, debug logging stays off", raw);
                false
            }),
            None => false,
        };

        let max_file_size = match args.max_size.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let size: u64 = parse_number("max-size", raw)?;
                if size == 0 {
                    return Err(ConfigError::Invalid {
                        flag: "max-size",
                        value: raw.to_string(),
                        reason: "must be greater than zero".to_string(),
                    });
                }
                size
            }
            _ => DEFAULT_MAX_FILE_SIZE,
        };

        let secret_timeout = match args.secret_timeout.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let secs: u64 = parse_number("secret-timeout", raw)?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        flag: "secret-timeout",
                        value: raw.to_string(),
                        reason: "must be at least one second".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            _ => DEFAULT_SECRET_TIMEOUT,
        };

        Ok(Self {
            api: ApiCredentials {
                api_id,
                api_hash,
                phone,
            },
            download_dir,
            allowed_user,
            container,
            allowed_extensions,
            max_file_size,
            session_file: args
                .session
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE)),
            code_file: args
                .code_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CODE_FILE)),
            password_file: args
                .password_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PASSWORD_FILE)),
            secret_timeout,
            debug,
        })
    }

    /// The routing strategy, fixed for the life of the process.
    pub fn routing_mode(&self) -> RoutingMode {
        match self.container {
            Some(container_id) => RoutingMode::Container { container_id },
            None => RoutingMode::Direct,
        }
    }

    /// Create the download folder (and parents) if it does not exist.
    pub fn ensure_download_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.download_dir).map_err(|source| ConfigError::DownloadDir {
            path: self.download_dir.clone(),
            source,
        })
    }

    /// Whether a file with the given extension passes the type policy.
    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions.is_empty()
            || self
                .allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }

    /// Log the effective configuration, the way operators expect to see it
    /// at start-up.
    pub fn log_summary(&self) {
        tracing::info!("Download folder: {}", self.download_dir.display());
        match self.routing_mode() {
            RoutingMode::Container { container_id } => {
                tracing::info!("Monitoring channel/group ID: {}", container_id)
            }
            RoutingMode::Direct => tracing::info!("Monitoring private messages"),
        }
        tracing::info!("Allowed user ID: {}", self.allowed_user);
        tracing::info!("Phone: {}", crate::utils::mask_sensitive(&self.api.phone, 3));
        tracing::info!("Session file: {}", self.session_file.display());
        tracing::info!(
            "File size limit: {}",
            crate::progress::format_bytes(self.max_file_size)
        );
        if self.allowed_extensions.is_empty() {
            tracing::info!("All file types allowed");
        } else {
            tracing::info!("Allowed file types: {}", self.allowed_extensions.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            api_id: Some("12345".into()),
            api_hash: Some("abcdef".into()),
            phone: Some("+15550001111".into()),
            folder: Some(PathBuf::from("/tmp/downloads")),
            user: Some("42".into()),
            ..Args::default()
        }
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_args(&base_args()).unwrap();
        assert_eq!(config.api.api_id, 12345);
        assert_eq!(config.allowed_user, 42);
        assert_eq!(config.container, None);
        assert_eq!(config.routing_mode(), RoutingMode::Direct);
        assert!(config.allowed_extensions.is_empty());
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.session_file, PathBuf::from(DEFAULT_SESSION_FILE));
        assert_eq!(config.code_file, PathBuf::from(DEFAULT_CODE_FILE));
        assert_eq!(config.password_file, PathBuf::from(DEFAULT_PASSWORD_FILE));
        assert_eq!(config.secret_timeout, DEFAULT_SECRET_TIMEOUT);
        assert!(!config.debug);
    }

    #[test]
    fn test_missing_user_names_flag_and_env() {
        let mut args = base_args();
        args.user = None;
        let err = Config::from_args(&args).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Allowed user ID is required"));
        assert!(msg.contains("--user"));
        assert!(msg.contains("TELEGRAM_USER_ID"));
    }

    #[test]
    fn test_blank_required_value_is_missing() {
        let mut args = base_args();
        args.api_hash = Some("   ".into());
        assert!(matches!(
            Config::from_args(&args),
            Err(ConfigError::Missing { flag: "api-hash", .. })
        ));
    }

    #[test]
    fn test_missing_folder() {
        let mut args = base_args();
        args.folder = None;
        let msg = Config::from_args(&args).unwrap_err().to_string();
        assert!(msg.contains("--folder"));
        assert!(msg.contains("TELEGRAM_FOLDER"));
    }

    #[test]
    fn test_invalid_user_id() {
        let mut args = base_args();
        args.user = Some("not-a-number".into());
        assert!(matches!(
            Config::from_args(&args),
            Err(ConfigError::Invalid { flag: "user", .. })
        ));
    }

    #[test]
    fn test_zero_api_id_is_missing() {
        let mut args = base_args();
        args.api_id = Some("0".into());
        assert!(matches!(
            Config::from_args(&args),
            Err(ConfigError::Missing { flag: "api-id", .. })
        ));
    }

    #[test]
    fn test_channel_switches_routing_mode() {
        let mut args = base_args();
        args.channel = Some("-1001234".into());
        let config = Config::from_args(&args).unwrap();
        assert_eq!(
            config.routing_mode(),
            RoutingMode::Container { container_id: -1001234 }
        );

        args.channel = Some("0".into());
        assert_eq!(Config::from_args(&args).unwrap().routing_mode(), RoutingMode::Direct);
    }

    #[test]
    fn test_parse_extensions_normalizes() {
        assert_eq!(
            parse_extensions(" .PDF, txt,,Docx , pdf"),
            vec!["pdf".to_string(), "txt".to_string(), "docx".to_string()]
        );
        assert!(parse_extensions("").is_empty());
        assert!(parse_extensions(" , ").is_empty());
    }

    #[test]
    fn test_extension_policy() {
        let mut args = base_args();
        args.types = Some("pdf,txt".into());
        let config = Config::from_args(&args).unwrap();
        assert!(config.is_extension_allowed("pdf"));
        assert!(config.is_extension_allowed("PDF"));
        assert!(!config.is_extension_allowed("exe"));
        assert!(!config.is_extension_allowed(""));

        let open = Config::from_args(&base_args()).unwrap();
        assert!(open.is_extension_allowed("exe"));
    }

    #[test]
    fn test_parse_bool_flag() {
        assert_eq!(parse_bool_flag("TRUE"), Some(true));
        assert_eq!(parse_bool_flag("1"), Some(true));
        assert_eq!(parse_bool_flag("f"), Some(false));
        assert_eq!(parse_bool_flag(""), Some(false));
        assert_eq!(parse_bool_flag("maybe"), None);
    }

    #[test]
    fn test_debug_and_overrides() {
        let mut args = base_args();
        args.debug = Some("true".into());
        args.max_size = Some("1000".into());
        args.secret_timeout = Some("30".into());
        args.code_file = Some(PathBuf::from("/run/secrets/code"));
        let config = Config::from_args(&args).unwrap();
        assert!(config.debug);
        assert_eq!(config.max_file_size, 1000);
        assert_eq!(config.secret_timeout, Duration::from_secs(30));
        assert_eq!(config.code_file, PathBuf::from("/run/secrets/code"));
    }

    #[test]
    fn test_unrecognised_debug_value_means_off() {
        let mut args = base_args();
        args.debug = Some("verbose".into());
        let config = Config::from_args(&args).unwrap();
        assert!(!config.debug);
    }

    #[test]
    fn test_zero_max_size_rejected() {
        let mut args = base_args();
        args.max_size = Some("0".into());
        assert!(matches!(
            Config::from_args(&args),
            Err(ConfigError::Invalid { flag: "max-size", .. })
        ));
    }

    #[test]
    fn test_ensure_download_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = base_args();
        args.folder = Some(dir.path().join("a").join("b"));
        let config = Config::from_args(&args).unwrap();
        config.ensure_download_dir().unwrap();
        assert!(dir.path().join("a").join("b").is_dir());
    }

    #[test]
    fn test_api_hash_not_in_debug_output() {
        let config = Config::from_args(&base_args()).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("abcdef"));
        assert!(!debug.contains("+15550001111"));
    }
}
