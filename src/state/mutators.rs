//! Mutator catalog: each function builds a pure `&Snapshot -> Mutation` transform
//! for `Store::dispatch`.
//!
//! | mutator              | router flag            |
//! |----------------------|------------------------|
//! | register_service     | always                 |
//! | set_override         | always                 |
//! | delete_service       | always                 |
//! | capture_profile      | never                  |
//! | update_profile       | never                  |
//! | install_profile      | never                  |
//! | index_profile        | never                  |
//! | set_current_profile  | always                 |
//! | delete_profile       | iff it was current     |
//! | reset_all            | always                 |
//!
//! The flag is decided by which mutator ran, never by diffing snapshots.
//! Every transform clones the previous Snapshot and edits the clone; on error
//! the clone is simply dropped.

use super::profile::{validate_profile_name, Profile, ProfileData, ProfileId};
use super::selectors::{capture_overrides, profile_by_name_sel};
use super::service::{OverridePatch, Service, ServiceDescriptor, ServiceId, ServiceUrl};
use super::snapshot::Snapshot;
use super::store::Mutation;
use crate::error::{Result, StoreError};

fn require_service(snap: &Snapshot, id: ServiceId) -> Result<&Service> {
    snap.services()
        .get(id)
        .ok_or_else(|| StoreError::not_found("service", id))
}

fn require_profile(snap: &Snapshot, id: ProfileId) -> Result<&Profile> {
    snap.profiles()
        .get(id)
        .ok_or_else(|| StoreError::not_found("profile", id))
}

/// Append a service with a fresh id. An override in the descriptor is merged
/// over the defaults, otherwise the service starts pass-through.
pub fn register_service(
    desc: ServiceDescriptor,
) -> impl FnOnce(&Snapshot) -> Result<Mutation<ServiceId>> {
    move |prev| {
        let url = ServiceUrl::parse(&desc.url)?;
        let initial = desc.r#override.map(OverridePatch::into_override);

        // the current profile's cached map stops matching if it names this url
        let listed_in_current = prev
            .profiles()
            .current()
            .and_then(|pid| prev.profiles().get(pid))
            .and_then(|p| p.data.as_ref())
            .is_some_and(|d| d.get(url.as_str()).is_some());

        let mut next = prev.clone();
        let id = next.services_mut().alloc_id();
        if initial.is_some() || listed_in_current {
            next.profiles_mut().mark_dirty();
        }
        next.services_mut().push(Service {
            id,
            url,
            default_response: desc.default_response,
            r#override: initial,
        });
        Ok(Mutation::new(next, true, id))
    }
}

/// `None` clears the override; `Some(patch)` is merged over the defaults.
pub fn set_override(
    id: ServiceId,
    patch: Option<OverridePatch>,
) -> impl FnOnce(&Snapshot) -> Result<Mutation> {
    move |prev| {
        let mut service = require_service(prev, id)?.clone();
        service.r#override = patch.map(OverridePatch::into_override);

        let mut next = prev.clone();
        next.services_mut().replace(service);
        next.profiles_mut().mark_dirty();
        Ok(Mutation::unit(next, true))
    }
}

/// Profiles are keyed by url, so nothing else needs to change.
pub fn delete_service(id: ServiceId) -> impl FnOnce(&Snapshot) -> Result<Mutation> {
    move |prev| {
        let had_override = require_service(prev, id)?.is_overridden();

        let mut next = prev.clone();
        next.services_mut().remove(id);
        if had_override {
            next.profiles_mut().mark_dirty();
        }
        Ok(Mutation::unit(next, true))
    }
}

/// New profile holding `{url -> override}` for every overridden service.
/// Names are unique: capturing under an existing name is rejected.
pub fn capture_profile(name: String) -> impl FnOnce(&Snapshot) -> Result<Mutation<ProfileId>> {
    move |prev| {
        let name = validate_profile_name(&name)?;
        if profile_by_name_sel(prev, name).is_some() {
            return Err(StoreError::validation(format!(
                "profile '{name}' already exists"
            )));
        }

        let data = capture_overrides(prev);
        let mut next = prev.clone();
        let id = next.profiles_mut().alloc_id();
        next.profiles_mut().push(Profile {
            id,
            name: name.to_string(),
            data: Some(data),
        });
        Ok(Mutation::new(next, false, id))
    }
}

/// Replace a profile's data with the current overrides.
pub fn update_profile(id: ProfileId) -> impl FnOnce(&Snapshot) -> Result<Mutation> {
    move |prev| {
        let mut profile = require_profile(prev, id)?.clone();
        profile.data = Some(capture_overrides(prev));

        let mut next = prev.clone();
        next.profiles_mut().replace(profile);
        if prev.profiles().current() == Some(id) {
            next.profiles_mut().mark_clean();
        }
        Ok(Mutation::unit(next, false))
    }
}

/// Attach data read from disk to the profile named `name`, creating it if needed.
/// Services are not touched: loading is not activating.
pub fn install_profile(
    name: String,
    data: ProfileData,
) -> impl FnOnce(&Snapshot) -> Result<Mutation<ProfileId>> {
    move |prev| {
        let name = validate_profile_name(&name)?;
        let mut next = prev.clone();

        let id = match profile_by_name_sel(prev, name) {
            Some(existing) => {
                let id = existing.id;
                let mut profile = existing.clone();
                profile.data = Some(data);
                next.profiles_mut().replace(profile);
                if prev.profiles().current() == Some(id) {
                    // cached data no longer describes what is applied
                    next.profiles_mut().mark_dirty();
                }
                id
            }
            None => {
                let id = next.profiles_mut().alloc_id();
                next.profiles_mut().push(Profile {
                    id,
                    name: name.to_string(),
                    data: Some(data),
                });
                id
            }
        };
        Ok(Mutation::new(next, false, id))
    }
}

/// Register a profile known only by its file (data `None`). Existing names are kept.
pub fn index_profile(name: String) -> impl FnOnce(&Snapshot) -> Result<Mutation<Option<ProfileId>>> {
    move |prev| {
        let name = validate_profile_name(&name)?;
        let mut next = prev.clone();
        if profile_by_name_sel(prev, name).is_some() {
            return Ok(Mutation::new(next, false, None));
        }
        let id = next.profiles_mut().alloc_id();
        next.profiles_mut().push(Profile {
            id,
            name: name.to_string(),
            data: None,
        });
        Ok(Mutation::new(next, false, Some(id)))
    }
}

/// Apply a profile to every service by url (all services sharing a url get the
/// entry, services without an entry go back to `None`). `None` selects no
/// profile, which leaves every service on its defaults.
pub fn set_current_profile(id: Option<ProfileId>) -> impl FnOnce(&Snapshot) -> Result<Mutation> {
    move |prev| {
        let empty = ProfileData::new();
        let data = match id {
            Some(pid) => {
                let profile = require_profile(prev, pid)?;
                profile.data.as_ref().ok_or_else(|| {
                    StoreError::validation(format!(
                        "profile '{}' is not loaded",
                        profile.name
                    ))
                })?
            }
            None => &empty,
        };

        let mut next = prev.clone();
        for service in prev.services().iter() {
            let wanted = data.get(service.url.as_str()).cloned();
            if service.r#override != wanted {
                let mut updated = service.clone();
                updated.r#override = wanted;
                next.services_mut().replace(updated);
            }
        }
        next.profiles_mut().set_current(id);
        Ok(Mutation::unit(next, true))
    }
}

/// Deleting the current profile clears `current` but keeps the overrides it applied.
pub fn delete_profile(id: ProfileId) -> impl FnOnce(&Snapshot) -> Result<Mutation> {
    move |prev| {
        require_profile(prev, id)?;
        let was_current = prev.profiles().current() == Some(id);

        let mut next = prev.clone();
        next.profiles_mut().remove(id);
        Ok(Mutation::unit(next, was_current))
    }
}

pub fn reset_all() -> impl FnOnce(&Snapshot) -> Result<Mutation> {
    move |prev| {
        let mut next = prev.clone();
        for service in prev.services().iter().filter(|s| s.is_overridden()) {
            let mut updated = service.clone();
            updated.r#override = None;
            next.services_mut().replace(updated);
        }
        next.profiles_mut().set_current(None);
        Ok(Mutation::unit(next, true))
    }
}
