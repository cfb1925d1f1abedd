//! Routing collaborator: request-dispatch table derived from `services_sel()`.
//!
//! The table is rebuilt only when a dispatch raised the router-invalidation
//! flag (RouteCache subscribes to those events and marks itself stale). A
//! table carries the Identity of the Snapshot it was built from.

use log::debug;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::metrics;
use crate::state::selectors::services_sel;
use crate::state::{Identity, ServiceId, Snapshot, Store};
use crate::subs::{callback, Filter, SubscriptionHandle};

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Default { status: u16, body: Value },
    Override { status: u16, body: Value },
    /// Never answer.
    Hang,
}

#[derive(Debug, Clone)]
pub struct Route {
    pub service: ServiceId,
    pub host: String,
    pub path: String,
    pub reply: Reply,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    identity: Identity,
    routes: Vec<Route>,
}

/// "/a/b/?q=1" -> "/a/b"; "" -> "/".
fn normalize_path(raw: &str) -> &str {
    let path = raw.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// "api.local:1337" -> "api.local"; "[::1]:1337" -> "[::1]" (url keeps v6 brackets).
fn host_without_port(h: &str) -> &str {
    if h.starts_with('[') {
        return match h.find(']') {
            Some(end) => &h[..=end],
            None => h,
        };
    }
    h.rsplit_once(':').map_or(h, |(name, _)| name)
}

impl RouteTable {
    pub fn build(snap: &Snapshot) -> Self {
        let routes = services_sel(snap)
            .into_iter()
            .map(|s| {
                let reply = match &s.r#override {
                    Some(o) if o.hang => Reply::Hang,
                    Some(o) => Reply::Override {
                        status: o.status,
                        body: o.response.clone(),
                    },
                    None => Reply::Default {
                        status: s.default_response.status,
                        body: s.default_response.body.clone(),
                    },
                };
                Route {
                    service: s.id,
                    host: s.url.host().to_string(),
                    path: normalize_path(s.url.path()).to_string(),
                    reply,
                }
            })
            .collect();
        Self {
            identity: snap.identity(),
            routes,
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First registered service whose url path matches.
    pub fn resolve(&self, request_path: &str) -> Option<&Route> {
        let path = normalize_path(request_path);
        self.routes.iter().find(|r| r.path == path)
    }

    /// Like `resolve`, but a route on the same host wins over other hosts.
    pub fn resolve_for_host(&self, host: Option<&str>, request_path: &str) -> Option<&Route> {
        let path = normalize_path(request_path);
        let host = host.map(host_without_port);
        host.and_then(|h| {
            self.routes
                .iter()
                .find(|r| r.path == path && r.host.eq_ignore_ascii_case(h))
        })
        .or_else(|| self.resolve(path))
    }
}

/// Route table kept in sync with a Store through the invalidation signal.
pub struct RouteCache {
    store: Arc<Store>,
    table: RwLock<Arc<RouteTable>>,
    stale: Arc<AtomicBool>,
    _sub: SubscriptionHandle,
}

impl RouteCache {
    pub fn new(store: Arc<Store>) -> Self {
        let stale = Arc::new(AtomicBool::new(false));
        let flag = stale.clone();
        let sub = store.subscribe(
            Filter::Invalidations,
            callback(move |_ev| flag.store(true, Ordering::Release)),
        );
        let table = RouteTable::build(&store.get_state());
        metrics::record_route_table_rebuild();
        Self {
            store,
            table: RwLock::new(Arc::new(table)),
            stale,
            _sub: sub,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Current table, rebuilt first if an invalidation arrived since the last build.
    pub fn table(&self) -> Arc<RouteTable> {
        if self.is_stale() {
            let mut g = self.table.write().unwrap_or_else(|e| e.into_inner());
            if self.stale.swap(false, Ordering::AcqRel) {
                *g = Arc::new(RouteTable::build(&self.store.get_state()));
                metrics::record_route_table_rebuild();
                debug!("router: rebuilt table at {}", g.identity());
            }
            return g.clone();
        }
        self.table.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
