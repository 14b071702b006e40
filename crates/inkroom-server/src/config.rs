//! Server configuration from flags and environment.

use crate::auth::{OpenSessions, SessionProvider, TokenSessions};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("auth token entry {0:?} is not of the form token=user")]
    InvalidToken(String),
    #[error("hydrate limit must be at least 1")]
    ZeroHydrateLimit,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "inkroom-server", about = "Inkroom collaboration relay")]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "INKROOM_BIND", default_value = "0.0.0.0:3030")]
    pub bind: SocketAddr,

    /// SQLite URL. Elements are kept in memory when unset.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum number of elements sent to a client after it joins a room.
    #[arg(long, env = "INKROOM_HYDRATE_LIMIT", default_value_t = 500)]
    pub hydrate_limit: usize,

    /// Comma separated `token=user` pairs. Any non-empty token is accepted when unset.
    #[arg(long, env = "INKROOM_AUTH_TOKENS", value_delimiter = ',')]
    pub auth_tokens: Vec<String>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hydrate_limit == 0 {
            return Err(ConfigError::ZeroHydrateLimit);
        }
        Ok(())
    }

    pub fn session_provider(&self) -> Result<Arc<dyn SessionProvider>, ConfigError> {
        let entries: Vec<&str> = self
            .auth_tokens
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .collect();
        if entries.is_empty() {
            return Ok(Arc::new(OpenSessions));
        }
        let tokens = entries
            .into_iter()
            .map(|entry| match entry.split_once('=') {
                Some((token, user)) if !token.is_empty() && !user.is_empty() => {
                    Ok((token.to_string(), user.to_string()))
                }
                _ => Err(ConfigError::InvalidToken(entry.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Arc::new(TokenSessions::new(tokens)))
    }
}
