//! Pushing packs to players and tracking their answers.
//!
//! Every pack sent to a player gets a pending status slot. The network layer
//! reports the client's answer through [`ResourcePackApplier::complete`],
//! which resolves the slot and drops it. A player disappears from the
//! tracker once nothing is pending for them.

use crate::data::{PackInfo, ResourcePack};
use crate::error::ApplyError;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use util::PlayerId;
use uuid::Uuid;

/// Answer a client sends for a pushed pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackStatus {
    SuccessfullyLoaded,
    Declined,
    FailedDownload,
    Accepted,
    Downloaded,
    InvalidUrl,
    FailedReload,
    Discarded,
}

impl PackStatus {
    /// Accepted and downloaded are progress reports; a final answer follows
    pub fn is_intermediate(self) -> bool {
        matches!(self, Self::Accepted | Self::Downloaded)
    }
}

/// Outbound side of the network layer.
pub trait PackDelivery: Send + Sync {
    /// Push `packs` to `player` in one batch
    fn send_packs(&self, player: PlayerId, packs: &[PackInfo]);
}

type StatusSlot = watch::Sender<Option<PackStatus>>;

/// Pending answer for one pack delivery.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    rx: watch::Receiver<Option<PackStatus>>,
}

impl StatusHandle {
    /// Status if it already arrived
    pub fn status_now(&self) -> Option<PackStatus> {
        *self.rx.borrow()
    }

    /// Wait for the client's answer.
    ///
    /// Fails with [`ApplyError::Abandoned`] when the slot is dropped without
    /// an answer, e.g. because the player left.
    pub async fn wait(mut self) -> Result<PackStatus, ApplyError> {
        let status = *self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ApplyError::Abandoned)?;

        status.ok_or(ApplyError::Abandoned)
    }
}

/// Tracks pending pack deliveries per player.
pub struct ResourcePackApplier {
    delivery: Arc<dyn PackDelivery>,
    pending: DashMap<PlayerId, HashMap<ResourcePack, StatusSlot>>,
}

impl ResourcePackApplier {
    pub fn new(delivery: Arc<dyn PackDelivery>) -> Self {
        Self {
            delivery,
            pending: DashMap::new(),
        }
    }

    /// Register a slot for `pack`, replacing any pending one
    fn register(&self, player: PlayerId, pack: &ResourcePack) -> StatusHandle {
        let (tx, rx) = watch::channel(None);
        self.pending.entry(player).or_default().insert(pack.clone(), tx);

        StatusHandle { rx }
    }

    /// Push one pack to `player`.
    ///
    /// The slot is registered before the pack is sent, so an answer can never
    /// arrive ahead of it.
    pub fn apply(&self, player: PlayerId, pack: &ResourcePack) -> Result<StatusHandle, ApplyError> {
        let info = pack.data().to_info().map_err(|_| ApplyError::Disabled)?;
        let handle = self.register(player, pack);

        tracing::debug!("Sending resource pack '{}' to {}", pack.name(), player);
        self.delivery.send_packs(player, &[info]);

        Ok(handle)
    }

    /// Push several packs to `player` in one batch.
    ///
    /// Disabled packs are not sent. `on_status` runs once for each sent pack
    /// when its answer arrives. The returned future completes once every sent
    /// pack has an answer (or was abandoned) and yields the packs that were
    /// not sent.
    pub fn apply_all<F, I>(
        &self,
        player: PlayerId,
        packs: I,
        on_status: F,
    ) -> impl Future<Output = Vec<ResourcePack>> + Send + 'static
    where
        I: IntoIterator<Item = ResourcePack>,
        F: Fn(&ResourcePack, PackStatus) + Send + Sync + 'static,
    {
        let mut declined = Vec::new();
        let mut infos = Vec::new();
        let mut handles = Vec::new();

        for pack in packs {
            match pack.data().to_info() {
                Ok(info) => {
                    handles.push((pack.clone(), self.register(player, &pack)));
                    infos.push(info);
                }
                Err(_) => declined.push(pack),
            }
        }

        if !infos.is_empty() {
            tracing::debug!("Sending {} resource packs to {}", infos.len(), player);
            self.delivery.send_packs(player, &infos);
        }

        async move {
            let on_status = &on_status;

            futures::future::join_all(handles.into_iter().map(|(pack, handle)| async move {
                match handle.wait().await {
                    Ok(status) => on_status(&pack, status),
                    Err(error) => tracing::debug!("Resource pack '{}': {}", pack.name(), error),
                }
            }))
            .await;

            declined
        }
    }

    /// Record the client's answer for `pack`.
    ///
    /// Returns whether a pending slot existed. The slot is removed, and so is
    /// the player once nothing else is pending.
    pub fn complete(&self, player: PlayerId, pack: &ResourcePack, status: PackStatus) -> bool {
        let slot = match self.pending.get_mut(&player) {
            Some(mut packs) => packs.remove(pack),
            None => return false,
        };

        self.remove_if_idle(player);

        match slot {
            Some(slot) => {
                tracing::debug!("Resource pack '{}' of {} finished with {:?}", pack.name(), player, status);
                slot.send_replace(Some(status));
                true
            }
            None => false,
        }
    }

    /// [`complete`](Self::complete) for the pending pack with identifier `id`.
    ///
    /// Intermediate statuses are ignored and leave the slot pending.
    pub fn complete_by_id(&self, player: PlayerId, id: Uuid, status: PackStatus) -> bool {
        if status.is_intermediate() {
            tracing::trace!("{} reported {:?} for {}", player, status, id);
            return false;
        }

        let pack = self.pending.get(&player).and_then(|packs| {
            packs
                .keys()
                .find(|pack| pack.data().info().is_some_and(|info| info.id == id))
                .cloned()
        });

        match pack {
            Some(pack) => self.complete(player, &pack, status),
            None => false,
        }
    }

    /// Drop everything pending for `player`; waiting handles see
    /// [`ApplyError::Abandoned`]. Returns the number of dropped slots.
    pub fn forget(&self, player: PlayerId) -> usize {
        self.pending
            .remove(&player)
            .map(|(_, packs)| packs.len())
            .unwrap_or(0)
    }

    fn remove_if_idle(&self, player: PlayerId) {
        self.pending.remove_if(&player, |_, packs| packs.is_empty());
    }

    pub fn players(&self) -> Vec<PlayerId> {
        self.pending.iter().map(|entry| *entry.key()).collect()
    }

    pub fn is_applying(&self, player: PlayerId) -> bool {
        self.pending.contains_key(&player)
    }

    pub fn is_applying_pack(&self, player: PlayerId, pack: &ResourcePack) -> bool {
        self.pending
            .get(&player)
            .is_some_and(|packs| packs.contains_key(pack))
    }

    pub fn remaining_packs(&self, player: PlayerId) -> Option<Vec<ResourcePack>> {
        self.pending
            .get(&player)
            .map(|packs| packs.keys().cloned().collect())
    }

    pub fn remaining_statuses(&self, player: PlayerId) -> Option<Vec<(ResourcePack, StatusHandle)>> {
        self.pending.get(&player).map(|packs| {
            packs
                .iter()
                .map(|(pack, slot)| (pack.clone(), StatusHandle { rx: slot.subscribe() }))
                .collect()
        })
    }

    pub fn remaining_pack_status(&self, player: PlayerId, pack: &ResourcePack) -> Option<StatusHandle> {
        self.pending
            .get(&player)
            .and_then(|packs| packs.get(pack).map(|slot| StatusHandle { rx: slot.subscribe() }))
    }
}

impl fmt::Debug for ResourcePackApplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePackApplier")
            .field("players", &self.pending.len())
            .finish_non_exhaustive()
    }
}
