//! Device address-list synchronization.
//!
//! [`AddressListDevice`] is the capability set needed from a device session
//! (filtered listing, remove by id, add). [`DeviceSync`] drives one session
//! through connect, list, removals, additions and disconnect.

pub mod protocol;
mod routeros;

use async_trait::async_trait;
use std::fmt;
use tracing::{debug, info};

pub use routeros::{Response, RouterOsConnector, RouterOsSession};

use crate::error::{Result, SyncError};

/// Ownership tag written as the comment of every entry managed for `asn`
pub fn tag_for(asn: &str) -> String {
    format!("ASN{}", asn)
}

/// The slice of a device address-list owned by one ASN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedList {
    /// Address-list name
    pub list: String,
    /// Comment identifying owned entries
    pub tag: String,
}

impl TaggedList {
    pub fn for_asn(list: &str, asn: &str) -> Self {
        Self {
            list: list.to_string(),
            tag: tag_for(asn),
        }
    }
}

impl fmt::Display for TaggedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.list, self.tag)
    }
}

/// Trait for an open device session
#[async_trait]
pub trait AddressListDevice: Send {
    /// Addresses of the entries in `scope.list` whose comment is `scope.tag`
    async fn list_tagged(&mut self, scope: &TaggedList) -> Result<Vec<String>>;

    /// Internal ids of the entries in scope with the given address
    async fn find_ids(&mut self, scope: &TaggedList, address: &str) -> Result<Vec<String>>;

    /// Remove one entry by internal id
    async fn remove(&mut self, id: &str) -> Result<()>;

    /// Add `address` to `scope.list` with `scope.tag` as comment
    async fn add(&mut self, scope: &TaggedList, address: &str) -> Result<()>;

    /// Release the session
    async fn close(&mut self) -> Result<()>;
}

/// Opens device sessions
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn AddressListDevice>>;
}

/// Session progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Connected,
    Synchronized,
    PartiallyFailed,
    Disconnected,
}

/// One device session applying a reconciliation
pub struct DeviceSync {
    device: Box<dyn AddressListDevice>,
    state: SyncState,
}

impl DeviceSync {
    /// Connect and authenticate
    pub async fn connect(connector: &dyn DeviceConnector) -> Result<Self> {
        debug!("Connecting to device");
        let device = connector.connect().await?;
        Ok(Self {
            device,
            state: SyncState::Connected,
        })
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Addresses currently tagged for this scope
    pub async fn list_tagged(&mut self, scope: &TaggedList) -> Result<Vec<String>> {
        let current = self.device.list_tagged(scope).await;
        if current.is_err() {
            self.state = SyncState::PartiallyFailed;
        }
        current
    }

    /// Remove each address in order, stopping at the first failure.
    ///
    /// The id is resolved per address right before removal, so removing two
    /// identical addresses deletes two distinct entries.
    pub async fn apply_removals(
        &mut self,
        scope: &TaggedList,
        to_remove: &[String],
    ) -> Result<usize> {
        let result = remove_all(self.device.as_mut(), scope, to_remove).await;
        if result.is_err() {
            self.state = SyncState::PartiallyFailed;
        }
        result
    }

    /// Add each address in order, stopping at the first failure
    pub async fn apply_additions(
        &mut self,
        scope: &TaggedList,
        to_add: &[String],
    ) -> Result<usize> {
        let result = add_all(self.device.as_mut(), scope, to_add).await;
        match result {
            Ok(_) if self.state == SyncState::Connected => self.state = SyncState::Synchronized,
            Ok(_) => {}
            Err(_) => self.state = SyncState::PartiallyFailed,
        }
        result
    }

    /// Close the session; returns the state reached before disconnecting
    pub async fn disconnect(mut self) -> Result<SyncState> {
        let reached = self.state;
        self.state = SyncState::Disconnected;
        self.device.close().await?;
        debug!("Disconnected from device ({:?})", reached);
        Ok(reached)
    }
}

async fn remove_all(
    device: &mut dyn AddressListDevice,
    scope: &TaggedList,
    to_remove: &[String],
) -> Result<usize> {
    for (done, address) in to_remove.iter().enumerate() {
        let ids = device.find_ids(scope, address).await?;
        let Some(id) = ids.first() else {
            return Err(SyncError::EntryNotFound {
                list: scope.list.clone(),
                tag: scope.tag.clone(),
                address: address.clone(),
            });
        };
        device.remove(id).await.map_err(|e| {
            debug!("Removal stopped after {} of {}", done, to_remove.len());
            e
        })?;
        info!("Removed {} from {}", address, scope);
    }
    Ok(to_remove.len())
}

async fn add_all(
    device: &mut dyn AddressListDevice,
    scope: &TaggedList,
    to_add: &[String],
) -> Result<usize> {
    for (done, address) in to_add.iter().enumerate() {
        device.add(scope, address).await.map_err(|e| {
            debug!("Addition stopped after {} of {}", done, to_add.len());
            e
        })?;
        info!("Added {} to {}", address, scope);
    }
    Ok(to_add.len())
}
