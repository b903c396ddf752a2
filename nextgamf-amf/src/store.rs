//! UE Context Store
//!
//! One arena of UE contexts indexed by AMF UE NGAP ID, with secondary
//! indexes from the radio-local key (association id, RAN UE NGAP ID) and
//! from SUPI. Create, lookup and release run under a single lock so a
//! radio-local key maps to at most one live context and an identifier is
//! never handed out while bound.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nextgamf_common::Supi;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::debug;

use crate::context::UeContext;
use crate::tasks::{channel, TaskHandle, TaskMessage, UeMessage, DEFAULT_CHANNEL_CAPACITY};

/// Largest AMF UE NGAP ID (40 bits).
pub const MAX_AMF_UE_NGAP_ID: u64 = (1 << 40) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("UE context {0} not found")]
    NotFound(u64),
    #[error("AMF UE NGAP ID space exhausted")]
    Exhausted,
}

/// A stored UE context together with its worker's queue.
#[derive(Debug)]
pub struct UeSlot {
    pub amf_ue_ngap_id: u64,
    pub association_id: u64,
    pub ran_ue_ngap_id: u32,
    released: AtomicBool,
    pub context: Mutex<UeContext>,
    mailbox: TaskHandle<UeMessage>,
}

impl UeSlot {
    /// Set once the context has left the store. Results of work started
    /// before that are discarded.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn mailbox(&self) -> &TaskHandle<UeMessage> {
        &self.mailbox
    }
}

/// Result of [`UeContextStore::get_or_create`].
#[derive(Debug)]
pub enum Lookup {
    Existing(Arc<UeSlot>),
    /// A new context; the receiver is the queue its worker must drain
    Created(Arc<UeSlot>, mpsc::Receiver<TaskMessage<UeMessage>>),
}

impl Lookup {
    pub fn slot(&self) -> &Arc<UeSlot> {
        match self {
            Lookup::Existing(slot) | Lookup::Created(slot, _) => slot,
        }
    }
}

#[derive(Debug)]
struct Index {
    by_amf_id: HashMap<u64, Arc<UeSlot>>,
    by_ran: HashMap<(u64, u32), u64>,
    by_supi: HashMap<Supi, u64>,
    next_id: u64,
}

impl Index {
    fn allocate(&mut self, max_id: u64) -> Result<u64, StoreError> {
        if self.by_amf_id.len() as u64 >= max_id {
            return Err(StoreError::Exhausted);
        }
        loop {
            let id = self.next_id;
            self.next_id = if id >= max_id { 1 } else { id + 1 };
            if !self.by_amf_id.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    fn remove(&mut self, id: u64) -> Option<Arc<UeSlot>> {
        let slot = self.by_amf_id.remove(&id)?;
        let ran_key = (slot.association_id, slot.ran_ue_ngap_id);
        if self.by_ran.get(&ran_key) == Some(&id) {
            self.by_ran.remove(&ran_key);
        }
        self.by_supi.retain(|_, bound| *bound != id);
        slot.released.store(true, Ordering::SeqCst);
        Some(slot)
    }
}

/// Shared UE context store.
#[derive(Debug)]
pub struct UeContextStore {
    index: RwLock<Index>,
    max_id: u64,
}

impl Default for UeContextStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UeContextStore {
    pub fn new() -> Self {
        Self::with_max_id(MAX_AMF_UE_NGAP_ID)
    }

    /// Store with a smaller identifier space.
    pub fn with_max_id(max_id: u64) -> Self {
        Self {
            index: RwLock::new(Index {
                by_amf_id: HashMap::new(),
                by_ran: HashMap::new(),
                by_supi: HashMap::new(),
                next_id: 1,
            }),
            max_id: max_id.clamp(1, MAX_AMF_UE_NGAP_ID),
        }
    }

    /// Returns the context for a radio-local key, creating it if absent.
    ///
    /// `preferred_id` is a pre-existing AMF UE NGAP ID offered by the radio
    /// node; it is reused when not bound to a live context.
    pub async fn get_or_create(
        &self,
        association_id: u64,
        ran_ue_ngap_id: u32,
        preferred_id: Option<u64>,
    ) -> Result<Lookup, StoreError> {
        let mut index = self.index.write().await;
        if let Some(id) = index.by_ran.get(&(association_id, ran_ue_ngap_id)) {
            if let Some(slot) = index.by_amf_id.get(id) {
                return Ok(Lookup::Existing(slot.clone()));
            }
        }

        let id = match preferred_id {
            Some(id) if (1..=self.max_id).contains(&id) && !index.by_amf_id.contains_key(&id) => id,
            _ => index.allocate(self.max_id)?,
        };

        let (mailbox, rx) = channel(DEFAULT_CHANNEL_CAPACITY);
        let slot = Arc::new(UeSlot {
            amf_ue_ngap_id: id,
            association_id,
            ran_ue_ngap_id,
            released: AtomicBool::new(false),
            context: Mutex::new(UeContext::new(id, association_id, ran_ue_ngap_id)),
            mailbox,
        });
        index.by_amf_id.insert(id, slot.clone());
        index.by_ran.insert((association_id, ran_ue_ngap_id), id);
        debug!(
            "Created UE context {} for association {} RAN UE {}",
            id, association_id, ran_ue_ngap_id
        );
        Ok(Lookup::Created(slot, rx))
    }

    pub async fn get(&self, amf_ue_ngap_id: u64) -> Result<Arc<UeSlot>, StoreError> {
        self.index
            .read()
            .await
            .by_amf_id
            .get(&amf_ue_ngap_id)
            .cloned()
            .ok_or(StoreError::NotFound(amf_ue_ngap_id))
    }

    pub async fn find_by_supi(&self, supi: &Supi) -> Option<Arc<UeSlot>> {
        let index = self.index.read().await;
        let id = index.by_supi.get(supi)?;
        index.by_amf_id.get(id).cloned()
    }

    /// Binds `supi` to a context. Returns the live context previously bound
    /// to the same SUPI, if it is a different one.
    pub async fn bind_supi(
        &self,
        amf_ue_ngap_id: u64,
        supi: &Supi,
    ) -> Result<Option<Arc<UeSlot>>, StoreError> {
        let mut index = self.index.write().await;
        if !index.by_amf_id.contains_key(&amf_ue_ngap_id) {
            return Err(StoreError::NotFound(amf_ue_ngap_id));
        }
        let previous = index
            .by_supi
            .insert(supi.clone(), amf_ue_ngap_id)
            .filter(|id| *id != amf_ue_ngap_id)
            .and_then(|id| index.by_amf_id.get(&id).cloned());
        Ok(previous)
    }

    /// Removes a context; its identifier becomes free for allocation.
    pub async fn release(&self, amf_ue_ngap_id: u64) -> Result<Arc<UeSlot>, StoreError> {
        let slot = self
            .index
            .write()
            .await
            .remove(amf_ue_ngap_id)
            .ok_or(StoreError::NotFound(amf_ue_ngap_id))?;
        debug!("Released UE context {}", amf_ue_ngap_id);
        Ok(slot)
    }

    /// Removes every context of an association.
    pub async fn release_association(&self, association_id: u64) -> Vec<Arc<UeSlot>> {
        let mut index = self.index.write().await;
        let ids: Vec<u64> = index
            .by_amf_id
            .values()
            .filter(|slot| slot.association_id == association_id)
            .map(|slot| slot.amf_ue_ngap_id)
            .collect();
        ids.into_iter().filter_map(|id| index.remove(id)).collect()
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.by_amf_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
