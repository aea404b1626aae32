//! CLI argument parsing, validation, and startup helpers.

use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::ServerConfig;
use crate::accounts::AccountService;
use crate::clock::Clock;
use crate::db::Database;
use crate::error::AuthError;
use crate::jwt::{JwtSettings, MAX_ACCESS_TTL_MINUTES, MIN_SECRET_LENGTH};
use crate::session::{MAX_REFRESH_TTL_DAYS, SessionSettings};

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "facility-api",
    about = "Facility management REST backend with JWT session auth"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file (":memory:" for a throwaway database)
    #[arg(short, long, env = "DATABASE_URL", default_value = "facility.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Issuer placed in and required of every access token
    #[arg(long, env = "JWT_ISSUER")]
    pub jwt_issuer: String,

    /// Comma-separated list of accepted audiences
    #[arg(long, env = "JWT_AUDIENCE", default_value = "web,ios,android")]
    pub jwt_audience: String,

    /// Access token lifetime in minutes
    #[arg(long, env = "JWT_ACCESS_TTL_MINUTES", default_value = "15",
        value_parser = clap::value_parser!(i64).range(1..=MAX_ACCESS_TTL_MINUTES))]
    pub access_ttl_minutes: i64,

    /// Refresh token lifetime in days
    #[arg(long, env = "JWT_REFRESH_TTL_DAYS", default_value = "30",
        value_parser = clap::value_parser!(i64).range(1..=MAX_REFRESH_TTL_DAYS))]
    pub refresh_ttl_days: i64,

    /// Maximum concurrent sessions per user
    #[arg(long, env = "MAX_SESSIONS", default_value = "3",
        value_parser = clap::value_parser!(u32).range(1..))]
    pub max_sessions: u32,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECONDS", default_value = "30",
        value_parser = clap::value_parser!(u64).range(1..))]
    pub request_timeout_seconds: u64,

    /// Create an admin account with this username on startup (password from ADMIN_PASSWORD)
    #[arg(long, value_name = "USERNAME")]
    pub create_admin: Option<String>,

    /// Log output format
    #[arg(short, long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    /// Log filter directive (e.g. "info" or "facility_api=debug,sqlx=warn")
    #[arg(long, env = "LOG_LEVEL", default_value = "debug")]
    pub log_level: String,
}

/// Initialize logging based on the specified format and filter.
pub fn init_logging(format: &LogFormat, level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<Vec<u8>> {
    let secret = if let Some(secret) = take_env("JWT_SECRET") {
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} bytes. Use a longer secret",
            MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret.into_bytes())
}

/// Read an environment variable and clear it so it does not leak to children.
fn take_env(name: &str) -> Option<String> {
    let value = std::env::var(name).ok()?;
    // SAFETY: Called during single-threaded startup, before the runtime
    // spawns any task that could read the environment.
    unsafe { std::env::remove_var(name) };
    Some(value)
}

/// Split a comma-separated audience list, dropping blanks.
pub fn parse_audience(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate the token settings.
/// Returns None and logs an error if validation fails.
pub fn build_jwt_settings(args: &Args, secret: Vec<u8>) -> Option<JwtSettings> {
    let issuer = args.jwt_issuer.trim();
    if issuer.is_empty() {
        error!("JWT issuer must not be empty");
        return None;
    }

    let audience = parse_audience(&args.jwt_audience);
    if audience.is_empty() {
        error!("JWT audience must contain at least one entry");
        return None;
    }

    Some(JwtSettings {
        secret,
        issuer: issuer.to_string(),
        audience,
        access_ttl_minutes: args.access_ttl_minutes,
    })
}

/// Handle the --create-admin flag: create the admin unless the username is taken.
pub async fn handle_create_admin(db: &Database, username: &str) {
    let Some(password) = take_env("ADMIN_PASSWORD") else {
        error!("ADMIN_PASSWORD must be set when using --create-admin");
        std::process::exit(1);
    };

    let accounts = AccountService::new(db.clone());
    match accounts.register(username, &password, "admin").await {
        Ok(id) => {
            info!(user_id = id, username = %username, "Admin user created");
        }
        Err(AuthError::UserAlreadyExists) => {
            warn!(username = %username, "User already exists, leaving it untouched");
        }
        Err(e) => {
            error!(error = %e, "Failed to create admin user");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt: JwtSettings) -> ServerConfig {
    ServerConfig {
        db,
        jwt,
        sessions: SessionSettings {
            refresh_ttl_days: args.refresh_ttl_days,
            max_sessions: args.max_sessions as usize,
        },
        request_timeout: Duration::from_secs(args.request_timeout_seconds),
        clock: Clock::system(),
    }
}

/// Log the effective configuration without the secret.
pub fn log_config_summary(args: &Args, config: &ServerConfig) {
    info!(
        port = args.port,
        database = %args.database,
        issuer = %config.jwt.issuer,
        audience = ?config.jwt.audience,
        access_ttl_minutes = config.jwt.access_ttl_minutes,
        refresh_ttl_days = config.sessions.refresh_ttl_days,
        max_sessions = config.sessions.max_sessions,
        request_timeout_seconds = args.request_timeout_seconds,
        "Configuration loaded"
    );
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
