//! Process configuration, read from the environment exactly once at startup
//! and passed down explicitly. No component reads an env var on its own.

use tribunal_auth::TokenConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub token: TokenConfig,
    /// When set, storage runs against Postgres; otherwise in-memory.
    pub database_url: Option<String>,
    pub discord: Option<DiscordConfig>,
}

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            "dev-secret".to_string()
        });
        let issuer = std::env::var("TOKEN_ISSUER").unwrap_or_else(|_| "tribunal".to_string());
        let audience =
            std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

        let discord = match (
            std::env::var("DISCORD_CLIENT_ID"),
            std::env::var("DISCORD_CLIENT_SECRET"),
            std::env::var("DISCORD_REDIRECT_URL"),
        ) {
            (Ok(client_id), Ok(client_secret), Ok(redirect_url)) => Some(DiscordConfig {
                client_id,
                client_secret,
                redirect_url,
            }),
            _ => None,
        };

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            token: TokenConfig {
                secret,
                issuer,
                audience,
            },
            database_url: std::env::var("DATABASE_URL").ok(),
            discord,
        }
    }
}
