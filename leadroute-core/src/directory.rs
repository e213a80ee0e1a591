//! Client directory
//!
//! In-memory index of clients by id and by tag in front of [`ClientStore`].
//! The store is authoritative: cache misses fall through to a direct query,
//! and every mutation rebuilds the whole cache.

use crate::store::ClientStore;
use leadroute_common::db::{Client, ClientUpdate, NewClient};
use leadroute_common::{Error, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddClientOutcome {
    Added(String),
    /// Another client already owns the tag
    DuplicateTag,
}

#[derive(Default)]
struct DirectoryCache {
    by_id: HashMap<String, Client>,
    tag_to_id: HashMap<String, String>,
}

impl DirectoryCache {
    fn insert(&mut self, client: Client) {
        self.tag_to_id.insert(client.tag.clone(), client.id.clone());
        self.by_id.insert(client.id.clone(), client);
    }

    fn by_tag(&self, tag: &str) -> Option<&Client> {
        self.tag_to_id.get(tag).and_then(|id| self.by_id.get(id))
    }
}

pub struct ClientDirectory {
    store: ClientStore,
    cache: RwLock<DirectoryCache>,
}

impl ClientDirectory {
    /// Empty directory; call [`load`](Self::load) before use
    pub fn new(store: ClientStore) -> Self {
        Self {
            store,
            cache: RwLock::new(DirectoryCache::default()),
        }
    }

    /// Directory populated from the store
    pub async fn open(store: ClientStore) -> Result<Self> {
        let directory = Self::new(store);
        directory.load().await?;
        Ok(directory)
    }

    /// Rebuild the cache from the store; returns the number of clients
    pub async fn load(&self) -> Result<usize> {
        let clients = self.store.list().await?;
        let mut fresh = DirectoryCache::default();
        for client in clients {
            fresh.insert(client);
        }
        let count = fresh.by_id.len();

        *self.cache.write().await = fresh;
        info!(clients = count, "Client directory loaded");
        Ok(count)
    }

    pub async fn refresh(&self) -> Result<usize> {
        self.load().await
    }

    /// Client owning `tag`, if any
    pub async fn resolve(&self, tag: &str) -> Result<Option<Client>> {
        if let Some(client) = self.cache.read().await.by_tag(tag) {
            return Ok(Some(client.clone()));
        }

        let client = self.store.find_by_tag(tag).await?;
        match &client {
            Some(found) => {
                debug!(tag = %tag, client_id = %found.id, "Client resolved from store");
                self.cache.write().await.insert(found.clone());
            }
            None => debug!(tag = %tag, "No client for tag"),
        }
        Ok(client)
    }

    pub async fn add(&self, client: NewClient) -> Result<AddClientOutcome> {
        let tag = client.tag.trim().to_string();
        if tag.is_empty() {
            return Err(Error::InvalidInput("client tag must not be empty".to_string()));
        }
        if client.name.trim().is_empty() {
            return Err(Error::InvalidInput("client name must not be empty".to_string()));
        }

        if self.store.find_by_tag(&tag).await?.is_some() {
            warn!(tag = %tag, "Client with this tag already exists");
            return Ok(AddClientOutcome::DuplicateTag);
        }

        let id = self.store.insert(&NewClient { tag, ..client }).await?;
        self.load().await?;
        Ok(AddClientOutcome::Added(id))
    }

    /// False when the client is unknown, there is nothing to change, or the
    /// new tag belongs to a different client
    pub async fn update(&self, id: &str, update: ClientUpdate) -> Result<bool> {
        if update.is_empty() {
            return Ok(false);
        }
        if self.store.get(id).await?.is_none() {
            warn!(client_id = %id, "Client not found");
            return Ok(false);
        }

        if let Some(tag) = &update.tag {
            if let Some(owner) = self.store.find_by_tag(tag).await? {
                if owner.id != id {
                    warn!(tag = %tag, owner = %owner.id, "Tag already assigned to another client");
                    return Ok(false);
                }
            }
        }

        let updated = self.store.update(id, &update).await?;
        if updated {
            self.load().await?;
        }
        Ok(updated)
    }

    pub async fn list(&self) -> Result<Vec<Client>> {
        self.store.list().await
    }

    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadroute_common::db::init_database;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, ClientDirectory, ClientStore) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("leads.db")).await.unwrap();
        let store = ClientStore::new(pool);
        let directory = ClientDirectory::open(store.clone()).await.unwrap();
        (dir, directory, store)
    }

    fn new_client(tag: &str) -> NewClient {
        NewClient {
            name: format!("Client {}", tag),
            tag: tag.to_string(),
            use_crm: true,
            webhook_url: Some("http://crm.example/hook".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_add_and_resolve() {
        let (_dir, directory, _store) = setup().await;

        let outcome = directory.add(new_client("[X1] Acme")).await.unwrap();
        let id = match outcome {
            AddClientOutcome::Added(id) => id,
            other => panic!("unexpected outcome {:?}", other),
        };

        let client = directory.resolve("[X1] Acme").await.unwrap().unwrap();
        assert_eq!(client.id, id);
        assert!(directory.resolve("[X2] Other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_tag_rejected() {
        let (_dir, directory, _store) = setup().await;
        directory.add(new_client("A")).await.unwrap();
        assert_eq!(directory.add(new_client("A")).await.unwrap(), AddClientOutcome::DuplicateTag);
        assert_eq!(directory.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_falls_through_to_store() {
        let (_dir, directory, store) = setup().await;

        // Written behind the directory's back
        store.insert(&new_client("B")).await.unwrap();
        assert_eq!(directory.cached_count().await, 0);

        assert!(directory.resolve("B").await.unwrap().is_some());
        assert_eq!(directory.cached_count().await, 1);
    }

    #[tokio::test]
    async fn test_update_reloads_and_guards_tag() {
        let (_dir, directory, _store) = setup().await;
        let a = match directory.add(new_client("A")).await.unwrap() {
            AddClientOutcome::Added(id) => id,
            other => panic!("unexpected outcome {:?}", other),
        };
        directory.add(new_client("B")).await.unwrap();

        let steal = ClientUpdate {
            tag: Some("B".to_string()),
            ..Default::default()
        };
        assert!(!directory.update(&a, steal).await.unwrap());

        let rename = ClientUpdate {
            tag: Some("A2".to_string()),
            use_crm: Some(false),
            ..Default::default()
        };
        assert!(directory.update(&a, rename).await.unwrap());
        assert!(directory.resolve("A").await.unwrap().is_none());
        let client = directory.resolve("A2").await.unwrap().unwrap();
        assert!(!client.use_crm);

        assert!(!directory.update("missing", ClientUpdate { name: Some("x".into()), ..Default::default() }).await.unwrap());
        assert!(!directory.update(&a, ClientUpdate::default()).await.unwrap());
    }

    #[tokio::test]
    async fn test_blank_tag_is_invalid() {
        let (_dir, directory, _store) = setup().await;
        let err = directory.add(new_client("  ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
