//! Snapshot — one immutable, internally consistent state of the whole store.
//!
//! Layout:
//! - services: byId + ordered ids (registration order)
//! - profiles: byId + ordered ids + current selection
//! - identity: version tag, replaced by the Store on every successful dispatch
//!
//! Entries are held behind `Arc`, so cloning a Snapshot to build a candidate
//! only copies the indexes; untouched services/profiles are shared with the
//! previous version. Mutation helpers are `pub(crate)`: only mutators reach them.

use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::profile::{Profile, ProfileId};
use super::service::{Service, ServiceId};
use crate::error::{Result, StoreError};

/// Opaque version tag: `epoch` is random per Store, `seq` grows by one per dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    pub epoch: u64,
    pub seq: u64,
}

impl Identity {
    pub(crate) fn genesis(epoch: u64) -> Self {
        Self { epoch, seq: 0 }
    }

    pub(crate) fn successor(self) -> Self {
        Self {
            epoch: self.epoch,
            seq: self.seq + 1,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}-{:x}", self.epoch, self.seq)
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Services {
    by_id: HashMap<ServiceId, Arc<Service>>,
    ids: Vec<ServiceId>,
    next_id: u64,
}

impl Services {
    pub fn get(&self, id: ServiceId) -> Option<&Service> {
        self.by_id.get(&id).map(|s| s.as_ref())
    }

    pub fn contains(&self, id: ServiceId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Services in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Service> {
        self.ids.iter().filter_map(move |id| self.get(*id))
    }

    pub fn ids(&self) -> &[ServiceId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub(crate) fn alloc_id(&mut self) -> ServiceId {
        self.next_id += 1;
        ServiceId(self.next_id)
    }

    pub(crate) fn push(&mut self, service: Service) {
        self.ids.push(service.id);
        self.by_id.insert(service.id, Arc::new(service));
    }

    pub(crate) fn replace(&mut self, service: Service) {
        self.by_id.insert(service.id, Arc::new(service));
    }

    pub(crate) fn remove(&mut self, id: ServiceId) -> Option<Arc<Service>> {
        let removed = self.by_id.remove(&id)?;
        self.ids.retain(|x| *x != id);
        Some(removed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Profiles {
    by_id: HashMap<ProfileId, Arc<Profile>>,
    ids: Vec<ProfileId>,
    current: Option<ProfileId>,
    // overrides or services changed since the current profile was applied
    current_dirty: bool,
    next_id: u64,
}

impl Profiles {
    pub fn get(&self, id: ProfileId) -> Option<&Profile> {
        self.by_id.get(&id).map(|p| p.as_ref())
    }

    pub fn contains(&self, id: ProfileId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.ids.iter().filter_map(move |id| self.get(*id))
    }

    pub fn ids(&self) -> &[ProfileId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn current(&self) -> Option<ProfileId> {
        self.current
    }

    pub fn is_current_dirty(&self) -> bool {
        self.current_dirty
    }

    pub(crate) fn alloc_id(&mut self) -> ProfileId {
        self.next_id += 1;
        ProfileId(self.next_id)
    }

    pub(crate) fn push(&mut self, profile: Profile) {
        self.ids.push(profile.id);
        self.by_id.insert(profile.id, Arc::new(profile));
    }

    pub(crate) fn replace(&mut self, profile: Profile) {
        self.by_id.insert(profile.id, Arc::new(profile));
    }

    /// Removing the current profile clears `current` in the same step.
    pub(crate) fn remove(&mut self, id: ProfileId) -> Option<Arc<Profile>> {
        let removed = self.by_id.remove(&id)?;
        self.ids.retain(|x| *x != id);
        if self.current == Some(id) {
            self.current = None;
            self.current_dirty = false;
        }
        Some(removed)
    }

    pub(crate) fn set_current(&mut self, id: Option<ProfileId>) {
        self.current = id;
        self.current_dirty = false;
    }

    pub(crate) fn mark_dirty(&mut self) {
        if self.current.is_some() {
            self.current_dirty = true;
        }
    }

    pub(crate) fn mark_clean(&mut self) {
        self.current_dirty = false;
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    services: Services,
    profiles: Profiles,
    identity: Identity,
}

impl Snapshot {
    pub(crate) fn empty(epoch: u64) -> Self {
        Self {
            services: Services::default(),
            profiles: Profiles::default(),
            identity: Identity::genesis(epoch),
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn profiles(&self) -> &Profiles {
        &self.profiles
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub(crate) fn services_mut(&mut self) -> &mut Services {
        &mut self.services
    }

    pub(crate) fn profiles_mut(&mut self) -> &mut Profiles {
        &mut self.profiles
    }

    pub(crate) fn set_identity(&mut self, identity: Identity) {
        self.identity = identity;
    }

    /// Structural invariants: no orphan index entries, no dangling `current`.
    pub fn check_consistency(&self) -> Result<()> {
        let s = &self.services;
        if s.ids.len() != s.by_id.len() || s.ids.iter().any(|id| !s.by_id.contains_key(id)) {
            return Err(StoreError::validation("services index out of sync"));
        }
        let p = &self.profiles;
        if p.ids.len() != p.by_id.len() || p.ids.iter().any(|id| !p.by_id.contains_key(id)) {
            return Err(StoreError::validation("profiles index out of sync"));
        }
        if let Some(cur) = p.current {
            if !p.by_id.contains_key(&cur) {
                return Err(StoreError::validation(format!(
                    "current profile {cur} does not exist"
                )));
            }
        }
        Ok(())
    }
}
