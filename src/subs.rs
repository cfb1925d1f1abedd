//! In-process subscriptions to store commits (router invalidation signal).
//!
//! Scope:
//! - The Store publishes one Event per successful dispatch, after the new
//!   Snapshot is installed and before the writer lock is released, so
//!   subscribers see events in dispatch order.
//! - Filter::Invalidations only receives events with the router flag raised.
//! - Drop of SubscriptionHandle unsubscribes.
//!
//! Notes:
//! - Callbacks are executed synchronously in the dispatching thread.
//!   Keep them fast; they must not dispatch into the same Store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::state::Identity;

/// One committed dispatch:
/// - identity: tag of the Snapshot just installed
/// - invalidate_router: the mutator asked the routing layer to rebuild
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    pub identity: Identity,
    pub invalidate_router: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    All,
    Invalidations,
}

impl Filter {
    fn accepts(self, ev: &Event) -> bool {
        match self {
            Filter::All => true,
            Filter::Invalidations => ev.invalidate_router,
        }
    }
}

pub type Callback = Arc<dyn Fn(&Event) + Send + Sync + 'static>;

#[derive(Default)]
struct SubInner {
    next_id: u64,
    subs: HashMap<u64, (Filter, Callback)>, // id -> (filter, cb)
}

#[derive(Default)]
pub struct SubRegistry {
    inner: Mutex<SubInner>,
}

impl SubRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, SubInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a handle; dropping it unsubscribes.
    pub fn subscribe(self: &Arc<Self>, filter: Filter, cb: Callback) -> SubscriptionHandle {
        let mut g = self.lock();
        let id = g.next_id;
        g.next_id = g.next_id.wrapping_add(1);
        g.subs.insert(id, (filter, cb));
        drop(g);
        SubscriptionHandle {
            id,
            reg: Arc::downgrade(self),
        }
    }

    pub fn publish(&self, ev: &Event) {
        let callbacks: Vec<Callback> = {
            let g = self.lock();
            g.subs
                .values()
                .filter(|(filter, _)| filter.accepts(ev))
                .map(|(_, cb)| cb.clone())
                .collect()
        };
        // Execute outside the registry lock
        for cb in callbacks {
            cb(ev);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().subs.remove(&id);
    }
}

/// RAII handle: unsubscribes on drop.
pub struct SubscriptionHandle {
    id: u64,
    reg: Weak<SubRegistry>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(reg) = self.reg.upgrade() {
            reg.unsubscribe(self.id);
        }
    }
}

pub fn callback<F>(f: F) -> Callback
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    Arc::new(f)
}
