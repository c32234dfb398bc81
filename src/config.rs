//! Server configuration resolved from environment variables, with CLI flags
//! taking precedence in the binary.

use std::env;
use std::path::PathBuf;

pub const DEFAULT_HTTP_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub http_port: u16,
    /// Ed25519 signing-seed file. When absent an ephemeral key is generated,
    /// which invalidates all outstanding tokens on restart.
    pub key_seed_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "vestibule".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            http_port: DEFAULT_HTTP_PORT,
            key_seed_path: None,
        }
    }
}

impl ServerConfig {
    /// Env vars: `VESTIBULE_HTTP_PORT`, `VESTIBULE_KEY_SEED`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(port) = parse_port_env("VESTIBULE_HTTP_PORT") {
            cfg.http_port = port;
        }
        if let Ok(path) = env::var("VESTIBULE_KEY_SEED") {
            if !path.trim().is_empty() {
                cfg.key_seed_path = Some(PathBuf::from(path));
            }
        }
        cfg
    }
}

pub fn parse_port_env(name: &str) -> Option<u16> {
    match env::var(name) {
        Ok(val) => val.parse::<u16>().ok(),
        Err(_) => None,
    }
}
