//! Service wiring.
//!
//! One store instance backs every port; which backend is built depends on
//! configuration (Postgres when `DATABASE_URL` is set, otherwise in-memory
//! for dev/test).

use std::sync::Arc;

use rand::{Rng, distributions::Alphanumeric};

use tribunal_auth::{Argon2Hasher, CredentialService, PasswordHasher};
use tribunal_catalog::{TemplateCatalog, TemplateStore};
use tribunal_directory::{Directory, OrganisationStore, PrincipalStore};
use tribunal_registry::{AppealStore, CaseRegistry, ResponseProcessor, ResponseStore};
use tribunal_storage::{MemoryStore, PostgresStore};

use crate::config::AppConfig;
use crate::oauth::{DiscordProvider, IdentityProvider};

pub struct AppServices {
    pub credentials: Arc<CredentialService>,
    pub directory: Arc<Directory>,
    pub catalog: Arc<TemplateCatalog>,
    pub registry: Arc<CaseRegistry>,
    pub processor: Arc<ResponseProcessor>,
    pub identity: Option<Arc<dyn IdentityProvider>>,
    /// Anti-forgery state for the OAuth redirect round-trip, minted once
    /// per process.
    pub oauth_state: String,
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    match &config.database_url {
        Some(url) => {
            let store = Arc::new(PostgresStore::connect(url).await?);
            store.migrate().await?;
            tracing::info!("storage: postgres");
            Ok(wire(store, config))
        }
        None => {
            tracing::info!("storage: in-memory (set DATABASE_URL for persistence)");
            Ok(wire(Arc::new(MemoryStore::new()), config))
        }
    }
}

fn wire<S>(store: Arc<S>, config: &AppConfig) -> AppServices
where
    S: PrincipalStore + OrganisationStore + TemplateStore + AppealStore + ResponseStore + 'static,
{
    let principals: Arc<dyn PrincipalStore> = store.clone();
    let organisations: Arc<dyn OrganisationStore> = store.clone();
    let templates: Arc<dyn TemplateStore> = store.clone();
    let appeals: Arc<dyn AppealStore> = store.clone();
    let responses: Arc<dyn ResponseStore> = store;

    let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2Hasher);

    let credentials = Arc::new(CredentialService::new(config.token.clone()));
    let directory = Arc::new(Directory::new(
        principals.clone(),
        organisations.clone(),
        hasher,
    ));
    let catalog = Arc::new(TemplateCatalog::new(
        templates.clone(),
        organisations.clone(),
        principals.clone(),
    ));
    let registry = Arc::new(CaseRegistry::new(
        appeals.clone(),
        organisations,
        templates,
    ));
    let processor = Arc::new(ResponseProcessor::new(appeals, responses));

    let identity = config
        .discord
        .clone()
        .map(|d| Arc::new(DiscordProvider::new(d)) as Arc<dyn IdentityProvider>);

    let oauth_state: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    AppServices {
        credentials,
        directory,
        catalog,
        registry,
        processor,
        identity,
        oauth_state,
    }
}
