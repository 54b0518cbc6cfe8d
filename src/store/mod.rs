//! Profile persistence.
//!
//! The pipeline only needs get and upsert keyed by email. Two
//! implementations ship with the crate:
//!
//! | Store | Backing | Use |
//! |-------|---------|-----|
//! | [`InMemoryProfileStore`] | `RwLock<HashMap>` | tests, embedding |
//! | [`SqliteProfileStore`] | SQLite (WAL), one JSON document per email | CLI |
//!
//! Writes for the same email are not serialized by the store beyond what
//! the backend provides; the last upsert wins.

mod memory;
mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Profile;

pub use memory::InMemoryProfileStore;
pub use sqlite::{SqliteProfileStore, PROFILES_SCHEMA};

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// The stored profile for a normalized email, if any.
    async fn get(&self, email: &str) -> Result<Option<Profile>>;

    /// Insert or replace the profile keyed by `profile.email`.
    async fn upsert(&self, profile: &Profile) -> Result<()>;
}
