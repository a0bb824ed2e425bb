use std::env;
use std::path::PathBuf;

use crate::api::upload::UploadConfig;
use crate::utils::ConfigError;

pub const DEFAULT_UPLOAD_DIR: &str = "./public/uploads";

/// Runtime configuration, read from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub upload: UploadConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = match var("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value: raw })?,
            None => 3000,
        };

        let max_file_size = match var("UPLOAD_MAX_FILE_SIZE") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "UPLOAD_MAX_FILE_SIZE",
                value: raw,
            })?),
            None => None,
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_url: var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            upload: UploadConfig {
                dir: PathBuf::from(var("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string())),
                max_file_size,
            },
        })
    }
}
