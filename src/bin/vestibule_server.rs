//!
//! vestibule server binary
//! -----------------------
//! Command-line entry point for the session/auth HTTP server. Supports
//! configuration via environment variables with CLI flag overrides.

use std::env;
use std::sync::Arc;

use anyhow::Result;

use vestibule::config::ServerConfig;
use vestibule::identity::{MemoryCache, MemoryUserDirectory, SessionService, SessionStore, TokenCodec};
use vestibule::server::api::{self, ApiState};
use vestibule::server::HttpServer;

fn parse_port_arg(args: &[String], flag: &str) -> Option<u16> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return args[i + 1].parse::<u16>().ok();
        }
        i += 1;
    }
    None
}

fn parse_value_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber with env filter if provided
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!(
            "vestibule server\n\nUSAGE:\n  vestibule_server [--http-port N] [--key-seed PATH]\n\nOPTIONS:\n  --http-port N     HTTP port (env: VESTIBULE_HTTP_PORT, default 8080)\n  --key-seed PATH   Ed25519 signing-seed file (env: VESTIBULE_KEY_SEED).\n                    Generated on first start when absent; without it an\n                    ephemeral key is used and restarts invalidate tokens.\n\nENVIRONMENT:\n  VESTIBULE_ADMIN_PASSWORD  Password for the seeded admin user (default: vestibule)\n"
        );
        return Ok(());
    }

    let mut config = ServerConfig::from_env();
    if let Some(port) = parse_port_arg(&args, "--http-port") {
        config.http_port = port;
    }
    if let Some(path) = parse_value_arg(&args, "--key-seed") {
        config.key_seed_path = Some(path.into());
    }

    let codec = match &config.key_seed_path {
        Some(path) => TokenCodec::load_or_generate(path)?,
        None => TokenCodec::generate()?,
    };

    let cache = Arc::new(MemoryCache::new());
    let sessions = Arc::new(SessionService::new(codec, SessionStore::new(cache)));

    // Ensure a default admin exists so a fresh install is usable.
    let users = Arc::new(MemoryUserDirectory::new());
    let admin_password =
        env::var("VESTIBULE_ADMIN_PASSWORD").unwrap_or_else(|_| "vestibule".to_string());
    users.add_user("admin", "Administrator", "admin@vestibule.local", &admin_password)?;

    let mut server = HttpServer::new(&config);
    server.merge_routes(api::router(ApiState {
        sessions: Arc::clone(&sessions),
        users,
    }));
    server.on_bootstrap(sessions.bootstrap_hook());

    let handle = server.listen().await?;
    handle.join().await
}
