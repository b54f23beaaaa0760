//! `tribunal-storage` — store implementations behind the domain ports.
//!
//! Two backends:
//! - [`memory::MemoryStore`]: a single lock over the whole dataset; the
//!   serializing lock makes the check-then-insert, replace-then-purge and
//!   cascade operations trivially atomic. Used by tests and dev mode.
//! - [`postgres::PostgresStore`]: sqlx over Postgres; atomicity comes from
//!   transactions plus a partial unique index backing the open-case
//!   invariant (see `schema.sql`).

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
