//! Server configuration from the environment

use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_THREAD_ID: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Parent of every thread's artifact directory
    pub storage_root: PathBuf,
    /// Step ceiling handed to graphs when the request sets none
    pub recursion_limit: Option<u32>,
    /// Thread used when a request names none
    pub default_thread_id: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let port = parse_var(&var, "BOT_RELAY_PORT").unwrap_or(DEFAULT_PORT);

        let storage_root = var("BOT_RELAY_STORAGE_ROOT").map_or_else(
            || {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.bot-relay/threads"))
            },
            PathBuf::from,
        );

        let recursion_limit = parse_var(&var, "BOT_RELAY_RECURSION_LIMIT");

        let default_thread_id = var("BOT_RELAY_DEFAULT_THREAD")
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_THREAD_ID.to_string());

        Self {
            port,
            storage_root,
            recursion_limit,
            default_thread_id,
        }
    }
}

/// Parse a variable if set; a value that does not parse is logged and ignored.
fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = key, value = %raw, "Ignoring invalid value");
            None
        }
    }
}
