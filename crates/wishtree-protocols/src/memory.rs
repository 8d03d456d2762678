//! In-process claims store.
//!
//! Keeps every record in memory, hands out increasing ids, and fans each
//! created record out to the open live feeds. Slot uniqueness is enforced
//! unless turned off, which lets tests reproduce the double-claim race of
//! a store without a uniqueness constraint.
//!
//! The fault hooks ([`MemoryClaims::set_available`],
//! [`MemoryClaims::disconnect_subscribers`]) stand in for network trouble.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};
use wishtree_store::{ClaimRecord, SlotCoord};

use crate::error::ServiceError;
use crate::service::{ClaimsService, Subscription};

#[derive(Debug)]
struct Inner {
    records: Vec<ClaimRecord>,
    next_id: u64,
    subscribers: HashMap<u64, mpsc::UnboundedSender<ClaimRecord>>,
    next_subscriber: u64,
    unique_slots: bool,
    available: bool,
}

impl Inner {
    fn slot_taken(&self, record: &ClaimRecord) -> bool {
        self.records
            .iter()
            .any(|r| r.grid_row == record.grid_row && r.grid_col == record.grid_col)
    }

    fn check_available(&self) -> Result<(), ServiceError> {
        if self.available {
            Ok(())
        } else {
            Err(ServiceError::Unavailable("memory store offline".into()))
        }
    }

    fn store(&mut self, mut record: ClaimRecord) -> ClaimRecord {
        let id = self.next_id;
        self.next_id += 1;
        record.id = Some(id);
        self.records.push(record.clone());

        // Closed feeds are dropped on the way.
        self.subscribers
            .retain(|_, tx| tx.send(record.clone()).is_ok());
        record
    }
}

/// A claims store held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryClaims {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryClaims {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClaims {
    /// Empty store with slot uniqueness enforced.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                records: Vec::new(),
                next_id: 1,
                subscribers: HashMap::new(),
                next_subscriber: 1,
                unique_slots: true,
                available: true,
            })),
        }
    }

    /// Empty store that accepts several claims for one slot.
    pub fn without_uniqueness() -> Self {
        let store = Self::new();
        store.lock().unique_slots = false;
        store
    }

    /// Store pre-filled with `records`; ids are assigned in order.
    pub fn with_records<I: IntoIterator<Item = ClaimRecord>>(records: I) -> Self {
        let store = Self::new();
        {
            let mut inner = store.lock();
            for record in records {
                inner.store(record);
            }
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the store offline (`false`) or back online (`true`).
    pub fn set_available(&self, available: bool) {
        info!("Memory claims store {}", if available { "online" } else { "offline" });
        self.lock().available = available;
    }

    /// Drop every open live feed, as a network partition would.
    pub fn disconnect_subscribers(&self) -> usize {
        let mut inner = self.lock();
        let dropped = inner.subscribers.len();
        inner.subscribers.clear();
        debug!("Disconnected {} live feed subscribers", dropped);
        dropped
    }

    /// Number of open live feeds.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Copy of every stored record.
    pub fn records(&self) -> Vec<ClaimRecord> {
        self.lock().records.clone()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }
}

#[async_trait]
impl ClaimsService for MemoryClaims {
    async fn read_all(&self) -> Result<Vec<ClaimRecord>, ServiceError> {
        let inner = self.lock();
        inner.check_available()?;
        Ok(inner.records.clone())
    }

    async fn create(&self, record: ClaimRecord) -> Result<ClaimRecord, ServiceError> {
        let mut inner = self.lock();
        inner.check_available()?;

        if inner.unique_slots && inner.slot_taken(&record) {
            debug!(
                "Refusing claim on taken slot ({}, {})",
                record.grid_row, record.grid_col
            );
            let slot = SlotCoord::new(
                u32::try_from(record.grid_row).unwrap_or_default(),
                i32::try_from(record.grid_col).unwrap_or_default(),
            );
            return Err(ServiceError::Conflict(slot));
        }

        Ok(inner.store(record))
    }

    async fn subscribe_inserts(&self) -> Result<Subscription, ServiceError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut inner = self.lock();
            inner.check_available()?;
            let id = inner.next_subscriber;
            inner.next_subscriber += 1;
            inner.subscribers.insert(id, tx);
            id
        };
        debug!("Opened live feed subscription {}", id);

        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(id, rx, move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
                inner.subscribers.remove(&id);
            }
        }))
    }
}
