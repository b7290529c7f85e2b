use std::env;

use crate::config::db::must_var;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeConfig {
    pub redis_url: String,
}

impl RealtimeConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let redis_url = must_var(&lookup, "REDIS_URL")?;
        if !(redis_url.starts_with("redis://") || redis_url.starts_with("rediss://")) {
            return Err(AppError::config(format!(
                "REDIS_URL must use the redis:// or rediss:// scheme, got '{redis_url}'"
            )));
        }
        Ok(Self { redis_url })
    }
}
