//! Selectors: pure read views over a Snapshot. No I/O, no mutation.

use serde::Serialize;
use std::borrow::Cow;
use std::path::Path;

use super::profile::{Profile, ProfileData, ProfileId};
use super::service::{url_key, Service, ServiceId};
use super::snapshot::Snapshot;
use crate::config::VeggieConfig;

/// All services in registration order, each with its current override.
pub fn services_sel(snap: &Snapshot) -> Vec<&Service> {
    snap.services().iter().collect()
}

pub fn service_by_id_sel(snap: &Snapshot, id: ServiceId) -> Option<&Service> {
    snap.services().get(id)
}

/// First registered service whose url matches (after normalization).
pub fn service_id_by_url_sel(snap: &Snapshot, url: &str) -> Option<ServiceId> {
    let key = url_key(url).ok()?;
    snap.services()
        .iter()
        .find(|s| s.url.as_str() == key)
        .map(|s| s.id)
}

#[derive(Debug, Serialize)]
pub struct ProfilesView<'a> {
    pub all: Vec<&'a Profile>,
    pub current: Option<ProfileId>,
}

pub fn profiles_sel(snap: &Snapshot) -> ProfilesView<'_> {
    ProfilesView {
        all: snap.profiles().iter().collect(),
        current: snap.profiles().current(),
    }
}

pub fn profile_by_id_sel(snap: &Snapshot, id: ProfileId) -> Option<&Profile> {
    snap.profiles().get(id)
}

pub fn profile_by_name_sel<'a>(snap: &'a Snapshot, name: &str) -> Option<&'a Profile> {
    snap.profiles().iter().find(|p| p.name == name)
}

/// `{url -> override}` for every overridden service. First registered wins
/// when several services share a url.
pub fn capture_overrides(snap: &Snapshot) -> ProfileData {
    let mut data = ProfileData::new();
    for service in snap.services().iter() {
        if let Some(o) = &service.r#override {
            if data.get(service.url.as_str()).is_none() {
                data.insert_normalized(service.url.as_str(), o.clone());
            }
        }
    }
    data
}

/// Override map of `id` (or of the current profile when `id` is None).
///
/// For the current profile whose overrides changed since it was applied the
/// map is computed live; otherwise the cached data is returned. None when the
/// profile does not exist, nothing is current, or the data is not loaded.
pub fn profile_data_sel(snap: &Snapshot, id: Option<ProfileId>) -> Option<Cow<'_, ProfileData>> {
    let pid = id.or_else(|| snap.profiles().current())?;
    let profile = snap.profiles().get(pid)?;
    let is_current = snap.profiles().current() == Some(pid);

    if is_current && (snap.profiles().is_current_dirty() || profile.data.is_none()) {
        return Some(Cow::Owned(capture_overrides(snap)));
    }
    profile.data.as_ref().map(Cow::Borrowed)
}

/// Root directory for profile files; external configuration, not store data.
pub fn profile_dir_sel(cfg: &VeggieConfig) -> &Path {
    cfg.profile_dir()
}
