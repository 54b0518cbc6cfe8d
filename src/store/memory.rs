use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::ProfileStore;
use crate::models::Profile;

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, Profile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.profiles
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, email: &str) -> Result<Option<Profile>> {
        let profiles = self.profiles.read().unwrap_or_else(|p| p.into_inner());
        Ok(profiles.get(email).cloned())
    }

    async fn upsert(&self, profile: &Profile) -> Result<()> {
        let mut profiles = self.profiles.write().unwrap_or_else(|p| p.into_inner());
        profiles.insert(profile.email.clone(), profile.clone());
        Ok(())
    }
}
