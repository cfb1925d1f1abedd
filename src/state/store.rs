//! Store — owns the single current Snapshot.
//!
//! Protocol:
//! - `dispatch(mutator)` runs under the writer lock, so mutators are applied
//!   one at a time in a total order.
//! - The mutator works on a borrowed Snapshot and returns a candidate; the
//!   Store stamps the next Identity on it and swaps it in as one `Arc`.
//! - Readers (`get_state`) only clone the published `Arc`; they never wait for
//!   a mutator to finish and never see a half-built candidate.
//! - A failing mutator drops its candidate: the current Snapshot and its
//!   Identity stay exactly as they were.

use log::debug;
use rand::RngCore;
use std::sync::{Arc, Mutex, RwLock};

use super::mutators;
use super::service::ServiceDescriptor;
use super::snapshot::{Identity, Snapshot};
use crate::error::Result;
use crate::metrics;
use crate::subs::{Callback, Event, Filter, SubRegistry, SubscriptionHandle};

/// Candidate produced by a mutator: next state, router flag and a return value
/// (e.g. the id allocated by a registration).
#[derive(Debug)]
pub struct Mutation<T = ()> {
    pub state: Snapshot,
    pub invalidate_router: bool,
    pub value: T,
}

impl<T> Mutation<T> {
    pub fn new(state: Snapshot, invalidate_router: bool, value: T) -> Self {
        Self {
            state,
            invalidate_router,
            value,
        }
    }
}

impl Mutation<()> {
    pub fn unit(state: Snapshot, invalidate_router: bool) -> Self {
        Self::new(state, invalidate_router, ())
    }
}

/// Result of a successful dispatch: the installed Snapshot plus the signal.
#[derive(Debug, Clone)]
pub struct Dispatched<T = ()> {
    pub snapshot: Arc<Snapshot>,
    pub invalidate_router: bool,
    pub value: T,
}

/// Random per-store epoch: identities never collide across store instances.
fn generate_epoch() -> u64 {
    let mut buf = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    u64::from_le_bytes(buf)
}

pub struct Store {
    writer: Mutex<()>,
    current: RwLock<Arc<Snapshot>>,
    subs: Arc<SubRegistry>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Empty store.
    pub fn new() -> Self {
        Self::from_snapshot(Snapshot::empty(generate_epoch()))
    }

    /// Store seeded with services; the seed is the genesis Snapshot (seq 0).
    pub fn with_services<I>(descriptors: I) -> Result<Self>
    where
        I: IntoIterator<Item = ServiceDescriptor>,
    {
        let mut snap = Snapshot::empty(generate_epoch());
        for desc in descriptors {
            snap = mutators::register_service(desc)(&snap)?.state;
        }
        Ok(Self::from_snapshot(snap))
    }

    fn from_snapshot(snap: Snapshot) -> Self {
        Self {
            writer: Mutex::new(()),
            current: RwLock::new(Arc::new(snap)),
            subs: SubRegistry::new(),
        }
    }

    /// Last published Snapshot. Repeated calls between dispatches return the same `Arc`.
    pub fn get_state(&self) -> Arc<Snapshot> {
        // Published snapshots are immutable, a poisoned lock still guards a valid value.
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn identity(&self) -> Identity {
        self.get_state().identity()
    }

    /// Apply `mutator` to the current Snapshot and install its result.
    pub fn dispatch<T, F>(&self, mutator: F) -> Result<Dispatched<T>>
    where
        F: FnOnce(&Snapshot) -> Result<Mutation<T>>,
    {
        let _writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let prev = self.get_state();

        let Mutation {
            mut state,
            invalidate_router,
            value,
        } = match mutator(&prev) {
            Ok(m) => m,
            Err(e) => {
                metrics::record_dispatch(false, false);
                debug!("dispatch: rejected at {}: {}", prev.identity(), e);
                return Err(e);
            }
        };

        state.set_identity(prev.identity().successor());
        let snapshot = Arc::new(state);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = snapshot.clone();

        metrics::record_dispatch(true, invalidate_router);
        debug!(
            "dispatch: {} -> {} (invalidate_router={})",
            prev.identity(),
            snapshot.identity(),
            invalidate_router
        );

        // Still under the writer lock: events go out in dispatch order.
        self.subs.publish(&Event {
            identity: snapshot.identity(),
            invalidate_router,
        });

        Ok(Dispatched {
            snapshot,
            invalidate_router,
            value,
        })
    }

    pub fn subscribe(&self, filter: Filter, cb: Callback) -> SubscriptionHandle {
        self.subs.subscribe(filter, cb)
    }

    pub fn subscriptions(&self) -> &Arc<SubRegistry> {
        &self.subs
    }
}
