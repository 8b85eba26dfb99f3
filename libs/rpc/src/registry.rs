//! Server-side map from client identity to that client's response channel.
//!
//! Lookups share a read lock; inserts take the write lock and re-check, so
//! concurrent first contacts from the same client open exactly one channel.
//! Entries are never rebound and live until explicitly removed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tether_core::{ClientId, Error, Result, ServiceTags};
use tether_fabric::{Transport, TypedPublisher};

use crate::envelope::Reply;

/// Publisher of replies to one client
pub type ReplyPublisher<T, Resp> = TypedPublisher<Reply<Resp>, <T as Transport>::Publisher>;

pub struct ClientRegistry<T: Transport, Resp> {
    transport: T,
    app_name: String,
    tags: ServiceTags,
    clients: RwLock<HashMap<ClientId, Arc<ReplyPublisher<T, Resp>>>>,
}

impl<T: Transport, Resp: Serialize> ClientRegistry<T, Resp> {
    /// Create an empty registry whose channels are owned by `app_name`
    pub fn new(transport: T, app_name: impl Into<String>, tags: ServiceTags) -> Self {
        Self {
            transport,
            app_name: app_name.into(),
            tags,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Look up the response channel of `client_id`, opening it on first contact
    ///
    /// A failed open leaves the registry untouched and yields
    /// [`Error::ChannelCreationFailed`].
    pub fn get_or_create(&self, client_id: ClientId) -> Result<Arc<ReplyPublisher<T, Resp>>> {
        if let Some(publisher) = self.get(client_id) {
            return Ok(publisher);
        }

        let mut clients = self.clients.write();
        // Another caller may have inserted while we waited for the write lock.
        if let Some(publisher) = clients.get(&client_id) {
            return Ok(Arc::clone(publisher));
        }

        let address = self.tags.response_channel(client_id);
        let port = self
            .transport
            .create_publisher(&self.app_name, &address)
            .map_err(|e| {
                tracing::warn!(%client_id, %address, error = %e, "failed to open response channel");
                Error::ChannelCreationFailed(format!("{address}: {e}"))
            })?;

        let publisher = Arc::new(TypedPublisher::new(port));
        clients.insert(client_id, Arc::clone(&publisher));
        tracing::debug!(%client_id, %address, clients = clients.len(), "registered client");
        Ok(publisher)
    }
}

impl<T: Transport, Resp> ClientRegistry<T, Resp> {
    pub fn get(&self, client_id: ClientId) -> Option<Arc<ReplyPublisher<T, Resp>>> {
        self.clients.read().get(&client_id).cloned()
    }

    /// Evict `client_id`
    ///
    /// The channel closes once no in-flight dispatch still holds it.
    pub fn remove(&self, client_id: ClientId) -> bool {
        let removed = self.clients.write().remove(&client_id).is_some();
        if removed {
            tracing::debug!(%client_id, "evicted client");
        }
        removed
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.clients.read().contains_key(&client_id)
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Identities currently registered, in no particular order
    pub fn clients(&self) -> Vec<ClientId> {
        self.clients.read().keys().copied().collect()
    }

    pub fn tags(&self) -> &ServiceTags {
        &self.tags
    }
}
