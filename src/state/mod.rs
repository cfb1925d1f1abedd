//! state — data model, Store and its mutation protocol, selectors.
//!
//! - service.rs   — Service, ServiceUrl, Override / OverridePatch, descriptors
//! - profile.rs   — Profile, ProfileData ({url -> Override})
//! - snapshot.rs  — Snapshot aggregate + Identity version tag
//! - store.rs     — Store: dispatch / get_state, Mutation, Dispatched
//! - mutators.rs  — named transforms dispatched through the Store
//! - selectors.rs — pure read views

pub mod mutators;
pub mod profile;
pub mod selectors;
pub mod service;
pub mod snapshot;
pub mod store;

pub use profile::{Profile, ProfileData, ProfileId};
pub use service::{
    DefaultResponse, Override, OverridePatch, Service, ServiceDescriptor, ServiceId, ServiceUrl,
};
pub use snapshot::{Identity, Profiles, Services, Snapshot};
pub use store::{Dispatched, Mutation, Store};
