//! Saved-items vault.

use anyhow::Result;
use chrono::Utc;
use shared::{LocalStore, MediaType, VaultRecord};
use std::sync::Arc;
use tracing::info;

pub const VAULT_KEY: &str = "vault";

/// User-curated set of titles, keyed by id and media type
pub struct Vault {
    store: Arc<LocalStore>,
}

impl Vault {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    fn load(&self) -> Result<Vec<VaultRecord>> {
        self.store.load(VAULT_KEY)
    }

    /// Add the item if absent, remove it if present; returns whether it is now saved
    pub fn toggle(&self, content_id: u64, media_type: MediaType, title: Option<&str>) -> Result<bool> {
        let mut items = self.load()?;
        let before = items.len();
        items.retain(|item| !(item.content_id == content_id && item.media_type == media_type));

        let saved = items.len() == before;
        if saved {
            items.insert(
                0,
                VaultRecord {
                    content_id,
                    media_type,
                    title: title.map(str::to_string),
                    added_at: Utc::now(),
                },
            );
        }

        self.store.save(VAULT_KEY, &items)?;
        info!(content_id = content_id, media_type = %media_type, saved = saved, "Vault toggled");
        Ok(saved)
    }

    pub fn contains(&self, content_id: u64, media_type: MediaType) -> Result<bool> {
        Ok(self
            .load()?
            .iter()
            .any(|item| item.content_id == content_id && item.media_type == media_type))
    }

    /// Saved items, newest first
    pub fn list(&self) -> Result<Vec<VaultRecord>> {
        let mut items = self.load()?;
        items.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(items)
    }
}
