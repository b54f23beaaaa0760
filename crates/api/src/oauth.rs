//! External identity provider boundary.
//!
//! The redirect/token exchange is a collaborator concern: the core only
//! needs "prove who this is and which email they own". The Discord
//! implementation lives here; everything else talks to the trait.

use async_trait::async_trait;
use serde::Deserialize;

use tribunal_core::DomainError;

use crate::config::DiscordConfig;

/// Identity facts returned by a provider after a successful exchange.
#[derive(Debug, Clone)]
pub struct ProviderIdentity {
    pub subject: String,
    pub email: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Where to send the user's browser to start the flow.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange the callback `code` for the provider-held identity.
    async fn exchange(&self, code: &str) -> Result<ProviderIdentity, DomainError>;
}

const DISCORD_AUTHORIZE_URL: &str = "https://discord.com/api/oauth2/authorize";
const DISCORD_TOKEN_URL: &str = "https://discord.com/api/oauth2/token";
const DISCORD_ME_URL: &str = "https://discord.com/api/users/@me";

pub struct DiscordProvider {
    http: reqwest::Client,
    config: DiscordConfig,
}

#[derive(Debug, Deserialize)]
struct DiscordToken {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    email: Option<String>,
}

impl DiscordProvider {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

fn provider_unavailable(op: &'static str) -> impl Fn(reqwest::Error) -> DomainError {
    move |e| {
        tracing::error!(error = %e, operation = op, "identity provider call failed");
        DomainError::Unavailable
    }
}

#[async_trait]
impl IdentityProvider for DiscordProvider {
    fn provider_name(&self) -> &'static str {
        "discord"
    }

    fn authorize_url(&self, state: &str) -> String {
        // Infallible: the base URL is a constant and params are encoded.
        let url = reqwest::Url::parse_with_params(
            DISCORD_AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", "identify email"),
                ("state", state),
            ],
        )
        .expect("static discord authorize url");
        url.to_string()
    }

    async fn exchange(&self, code: &str) -> Result<ProviderIdentity, DomainError> {
        let token: DiscordToken = self
            .http
            .post(DISCORD_TOKEN_URL)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_url.as_str()),
            ])
            .send()
            .await
            .map_err(provider_unavailable("token exchange"))?
            .error_for_status()
            .map_err(provider_unavailable("token exchange"))?
            .json()
            .await
            .map_err(provider_unavailable("token exchange"))?;

        let user: DiscordUser = self
            .http
            .get(DISCORD_ME_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(provider_unavailable("fetch user"))?
            .error_for_status()
            .map_err(provider_unavailable("fetch user"))?
            .json()
            .await
            .map_err(provider_unavailable("fetch user"))?;

        let email = user.email.ok_or_else(|| {
            DomainError::validation("the provider did not share an email address")
        })?;

        Ok(ProviderIdentity {
            subject: user.id,
            email,
        })
    }
}
