//! `tribunal-directory` — principals, organisations and the management
//! authorization guard.
//!
//! Storage is reached exclusively through the ports in [`store`]; this crate
//! never talks to a database driver.

pub mod guard;
pub mod organisation;
pub mod principal;
pub mod service;
pub mod store;

pub use guard::ManagementGuard;
pub use organisation::{Organisation, OrganisationDraft, OrganisationPatch};
pub use principal::{ExternalIdentity, PlanTier, Principal};
pub use service::Directory;
pub use store::{OrganisationStore, PrincipalStore};
