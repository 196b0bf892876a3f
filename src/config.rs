//! Server configuration, read once from the environment at startup.
//!
//! A `.env` file in the working directory is loaded first when present.
//!
//! | Variable | Default |
//! |---|---|
//! | `HOST` | `127.0.0.1` |
//! | `PORT` | `3000` |
//! | `DEV_MODE` | `false` |
//! | `DASHBOARD_PASSWORD_HASH` | required unless dev mode (sha256 hex) |
//! | `JWT_SECRET` | required unless dev mode |
//! | `JWT_TTL_DAYS` | `30` |
//! | `GOOGLE_SERVICE_ACCOUNT_JSON` | required unless dev mode (path) |
//! | `GOOGLE_SHEETS_ID` | required unless dev mode |
//! | `GOOGLE_SHEETS_WORKSHEET` | `Sheet1` |
//! | `GOOGLE_DRIVE_FOLDER_ID` | required unless dev mode |
//! | `GEMINI_API_KEY` | required |
//! | `GEMINI_MODEL` | `gemini-flash-latest` |
//! | `MAX_UPLOAD_MB` | `100` |

use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-flash-latest";
pub const DEFAULT_WORKSHEET: &str = "Sheet1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Lowercase hex sha256 of the dashboard password.
    pub dashboard_password_hash: Option<String>,
    pub jwt_secret: Option<String>,
    pub jwt_ttl_days: i64,
}

impl AuthConfig {
    pub fn auth_required(&self, dev_mode: bool) -> bool {
        !dev_mode
    }
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub service_account_json: PathBuf,
    pub sheets_id: String,
    pub worksheet: String,
    pub drive_folder_id: String,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub dev_mode: bool,
    pub auth: AuthConfig,
    /// `None` only in dev mode, where in-memory backends are used.
    pub google: Option<GoogleConfig>,
    pub ai: AiConfig,
    pub max_upload_bytes: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let dev_mode = match get("DEV_MODE") {
            Some(v) => parse_bool("DEV_MODE", &v)?,
            None => false,
        };

        let mut missing = missing_credentials(&get);
        if dev_mode {
            // Google settings are optional in dev mode.
            missing.retain(|key| key == "GEMINI_API_KEY");
        } else {
            for key in ["DASHBOARD_PASSWORD_HASH", "JWT_SECRET"] {
                if get(key).is_none() {
                    missing.push(key.to_string());
                }
            }
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let port = match get("PORT") {
            Some(v) => v.parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                value: v.clone(),
                reason: e.to_string(),
            })?,
            None => 3000,
        };

        let jwt_ttl_days = match get("JWT_TTL_DAYS") {
            Some(v) => match v.parse::<i64>() {
                Ok(days) if days > 0 => days,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "JWT_TTL_DAYS",
                        value: v,
                        reason: "expected a positive number of days".to_string(),
                    })
                }
            },
            None => 30,
        };

        let max_upload_mb = match get("MAX_UPLOAD_MB") {
            Some(v) => match v.parse::<u64>() {
                Ok(mb) if mb > 0 => mb,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "MAX_UPLOAD_MB",
                        value: v,
                        reason: "expected a positive number of megabytes".to_string(),
                    })
                }
            },
            None => 100,
        };

        let dashboard_password_hash = match get("DASHBOARD_PASSWORD_HASH") {
            Some(v) => Some(parse_sha256_hex(&v)?),
            None => None,
        };

        let google = match (
            get("GOOGLE_SERVICE_ACCOUNT_JSON"),
            get("GOOGLE_SHEETS_ID"),
            get("GOOGLE_DRIVE_FOLDER_ID"),
        ) {
            (Some(service_account_json), Some(sheets_id), Some(drive_folder_id)) => {
                Some(GoogleConfig {
                    service_account_json: PathBuf::from(service_account_json),
                    sheets_id,
                    worksheet: get("GOOGLE_SHEETS_WORKSHEET")
                        .unwrap_or_else(|| DEFAULT_WORKSHEET.to_string()),
                    drive_folder_id,
                })
            }
            _ => None,
        };

        Ok(Config {
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            dev_mode,
            auth: AuthConfig {
                dashboard_password_hash,
                jwt_secret: get("JWT_SECRET"),
                jwt_ttl_days,
            },
            google,
            ai: AiConfig {
                api_key: get("GEMINI_API_KEY").unwrap_or_default(),
                model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            },
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        })
    }
}

/// External-service credentials that are not set.
pub fn missing_credentials<F>(get: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    [
        "GEMINI_API_KEY",
        "GOOGLE_DRIVE_FOLDER_ID",
        "GOOGLE_SHEETS_ID",
        "GOOGLE_SERVICE_ACCOUNT_JSON",
    ]
    .into_iter()
    .filter(|key| get(key).is_none())
    .map(str::to_string)
    .collect()
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_sha256_hex(value: &str) -> Result<String, ConfigError> {
    let valid = value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(ConfigError::Invalid {
            key: "DASHBOARD_PASSWORD_HASH",
            value: value.to_string(),
            reason: "expected 64 hex characters".to_string(),
        });
    }
    Ok(value.to_ascii_lowercase())
}
