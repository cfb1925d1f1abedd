//! Lightweight global metrics for veggie.
//!
//! Потокобезопасные атомарные счётчики:
//! - Store (dispatch / failures / router invalidations)
//! - Route table rebuilds
//! - Profile codec (saves / loads / io errors)

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Store -----
static DISPATCH_TOTAL: AtomicU64 = AtomicU64::new(0);
static DISPATCH_FAILED: AtomicU64 = AtomicU64::new(0);
static ROUTER_INVALIDATIONS: AtomicU64 = AtomicU64::new(0);

// ----- Router -----
static ROUTE_TABLE_REBUILDS: AtomicU64 = AtomicU64::new(0);

// ----- Profile codec -----
static PROFILE_SAVES: AtomicU64 = AtomicU64::new(0);
static PROFILE_LOADS: AtomicU64 = AtomicU64::new(0);
static PROFILE_IO_ERRORS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub dispatch_total: u64,
    pub dispatch_failed: u64,
    pub router_invalidations: u64,

    pub route_table_rebuilds: u64,

    pub profile_saves: u64,
    pub profile_loads: u64,
    pub profile_io_errors: u64,
}

impl MetricsSnapshot {
    pub fn dispatch_failure_ratio(&self) -> f64 {
        if self.dispatch_total == 0 {
            0.0
        } else {
            self.dispatch_failed as f64 / self.dispatch_total as f64
        }
    }

    /// Prometheus text exposition.
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();
        let ver = env!("CARGO_PKG_VERSION");
        out.push_str("# HELP veggie_build_info Build info.\n");
        out.push_str("# TYPE veggie_build_info gauge\n");
        out.push_str(&format!("veggie_build_info{{version=\"{}\"}} 1\n", ver));

        let counters: [(&str, &str, u64); 7] = [
            ("veggie_dispatch_total", "Dispatch calls (successful and failed).", self.dispatch_total),
            ("veggie_dispatch_failed", "Dispatch calls rejected by their mutator.", self.dispatch_failed),
            ("veggie_router_invalidations", "Dispatches that raised the router flag.", self.router_invalidations),
            ("veggie_route_table_rebuilds", "Route table rebuilds.", self.route_table_rebuilds),
            ("veggie_profile_saves", "Profiles written to disk.", self.profile_saves),
            ("veggie_profile_loads", "Profiles read from disk.", self.profile_loads),
            ("veggie_profile_io_errors", "Profile save/load failures.", self.profile_io_errors),
        ];
        for (name, help, v) in counters {
            out.push_str(&format!("# HELP {} {}\n", name, help));
            out.push_str(&format!("# TYPE {} counter\n", name));
            out.push_str(&format!("{} {}\n", name, v));
        }
        out
    }
}

// ----- Recorders (Store) -----
pub fn record_dispatch(ok: bool, invalidate_router: bool) {
    DISPATCH_TOTAL.fetch_add(1, Ordering::Relaxed);
    if !ok {
        DISPATCH_FAILED.fetch_add(1, Ordering::Relaxed);
    } else if invalidate_router {
        ROUTER_INVALIDATIONS.fetch_add(1, Ordering::Relaxed);
    }
}

// ----- Recorders (Router) -----
pub fn record_route_table_rebuild() {
    ROUTE_TABLE_REBUILDS.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Profile codec) -----
pub fn record_profile_save() {
    PROFILE_SAVES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_profile_load() {
    PROFILE_LOADS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_profile_io_error() {
    PROFILE_IO_ERRORS.fetch_add(1, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        dispatch_total: DISPATCH_TOTAL.load(Ordering::Relaxed),
        dispatch_failed: DISPATCH_FAILED.load(Ordering::Relaxed),
        router_invalidations: ROUTER_INVALIDATIONS.load(Ordering::Relaxed),

        route_table_rebuilds: ROUTE_TABLE_REBUILDS.load(Ordering::Relaxed),

        profile_saves: PROFILE_SAVES.load(Ordering::Relaxed),
        profile_loads: PROFILE_LOADS.load(Ordering::Relaxed),
        profile_io_errors: PROFILE_IO_ERRORS.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    DISPATCH_TOTAL.store(0, Ordering::Relaxed);
    DISPATCH_FAILED.store(0, Ordering::Relaxed);
    ROUTER_INVALIDATIONS.store(0, Ordering::Relaxed);

    ROUTE_TABLE_REBUILDS.store(0, Ordering::Relaxed);

    PROFILE_SAVES.store(0, Ordering::Relaxed);
    PROFILE_LOADS.store(0, Ordering::Relaxed);
    PROFILE_IO_ERRORS.store(0, Ordering::Relaxed);
}
