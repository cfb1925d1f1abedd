//! Profiles: named, persistable captures of overrides keyed by url.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::{BTreeMap, Entry};
use std::fmt;
use std::str::FromStr;

use super::service::{url_key, Override};
use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub u64);

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProfileId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(ProfileId)
            .map_err(|_| StoreError::validation(format!("bad profile id '{s}'")))
    }
}

/// `{url -> Override}`; keys are always normalized service url strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProfileData(BTreeMap<String, Override>);

impl ProfileData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw url keys. A key that is not an absolute url is rejected,
    /// as are two keys normalizing to the same url ("http://a" and "http://a/").
    pub fn from_entries<I, K>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Override)>,
        K: AsRef<str>,
    {
        let mut map = BTreeMap::new();
        for (k, o) in entries {
            match map.entry(url_key(k.as_ref())?) {
                Entry::Vacant(slot) => {
                    slot.insert(o);
                }
                Entry::Occupied(slot) => {
                    return Err(StoreError::validation(format!(
                        "'{}' duplicates url {}",
                        k.as_ref(),
                        slot.key()
                    )));
                }
            }
        }
        Ok(ProfileData(map))
    }

    /// Caller guarantees `key` is already normalized (it came from a ServiceUrl).
    pub(crate) fn insert_normalized(&mut self, key: &str, o: Override) {
        self.0.insert(key.to_string(), o);
    }

    pub fn get(&self, url: &str) -> Option<&Override> {
        self.0.get(url)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Override)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_inner(self) -> BTreeMap<String, Override> {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub id: ProfileId,
    /// User-chosen label, also the default file stem.
    pub name: String,
    /// None until captured from state or loaded from disk.
    pub data: Option<ProfileData>,
}

impl Profile {
    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }
}

/// Profile names double as file stems: no separators, no dot-only names.
pub fn validate_profile_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::validation("profile name is empty"));
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(StoreError::validation(format!(
            "profile name '{name}' is not a valid file stem"
        )));
    }
    Ok(name)
}
