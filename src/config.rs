use serde::Deserialize;
use tracing::warn;

const DEV_SECRET: &str = "campus-auth-dev-secret";

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub secret: String,
    /// Reject tokens older than this; `None` keeps tokens valid indefinitely.
    pub token_max_age_secs: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let secret = std::env::var("AUTH_SECRET").unwrap_or_else(|_| {
            warn!("AUTH_SECRET not set; using the development secret");
            DEV_SECRET.into()
        });
        let auth = AuthConfig {
            secret,
            token_max_age_secs: std::env::var("AUTH_TOKEN_MAX_AGE_SECS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v > 0),
        };
        let db_max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(20);
        Ok(Self {
            database_url,
            db_max_connections,
            auth,
        })
    }
}
