//! Admin API: maps `(method, path, body)` onto store operations.
//!
//! Transport-independent (the binary feeds it from tiny_http). Paths are
//! relative to `VeggieConfig::api_prefix`:
//!
//! GET    /ping                     -> pong
//! GET    /metrics                  -> Prometheus text
//! GET    /store                    -> all services
//! POST   /store                    -> register service (ServiceDescriptor)
//! GET    /store/:id                -> one service
//! POST   /store/:id                -> set override ({} clears it)
//! DELETE /store/:id                -> delete service
//! GET    /store/profile            -> {all, current}
//! POST   /store/profile  {name}    -> capture profile
//! PUT    /store/profile  {id}      -> activate profile (id: null selects none)
//! DELETE /store/profile            -> reset everything to defaults
//! POST   /store/profile/load {name}-> load profile file
//! GET    /store/profile/:id        -> profile with its override map
//! POST   /store/profile/:id        -> refresh profile from current overrides
//! DELETE /store/profile/:id        -> delete profile
//! POST   /store/profile/:id/save   -> write profile file
//!
//! Envelope: {"status":"success","message"?,"data"?,"identity"} or
//! {"status":"failed","error"} with the StoreError status code.

use log::{info, warn};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::codec;
use crate::config::VeggieConfig;
use crate::error::{Result, StoreError};
use crate::metrics;
use crate::state::mutators::{
    capture_profile, delete_profile, delete_service, register_service, reset_all,
    set_current_profile, set_override, update_profile,
};
use crate::state::selectors::{
    profile_by_id_sel, profile_data_sel, profiles_sel, service_by_id_sel, services_sel,
};
use crate::state::{Identity, OverridePatch, ProfileId, ServiceDescriptor, ServiceId, Store};

#[derive(Debug, Clone, PartialEq)]
pub enum ApiBody {
    Json(Value),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: u16,
    pub body: ApiBody,
    /// The request dispatched a mutation that raised the router flag.
    pub invalidate_router: bool,
}

impl ApiReply {
    fn success(identity: Identity, message: Option<String>, data: Option<Value>) -> Self {
        let mut obj = Map::new();
        obj.insert("status".into(), json!("success"));
        if let Some(m) = message {
            obj.insert("message".into(), Value::String(m));
        }
        if let Some(d) = data {
            obj.insert("data".into(), d);
        }
        obj.insert("identity".into(), json!(identity.to_string()));
        Self {
            status: 200,
            body: ApiBody::Json(Value::Object(obj)),
            invalidate_router: false,
        }
    }

    fn failed(status: u16, error: String) -> Self {
        Self {
            status,
            body: ApiBody::Json(json!({"status": "failed", "error": error})),
            invalidate_router: false,
        }
    }

    fn invalidating(mut self, flag: bool) -> Self {
        self.invalidate_router = flag;
        self
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ApiBody::Json(v) => Some(v),
            ApiBody::Text(_) => None,
        }
    }
}

fn to_json<T: Serialize>(v: &T) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

fn parse_body(body: &[u8]) -> Result<Value> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(|e| StoreError::validation(format!("bad json body: {e}")))
}

fn body_str<'a>(v: &'a Value, field: &str) -> Result<&'a str> {
    v.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| StoreError::validation(format!("request requires a '{field}'")))
}

/// `{"id": 3}` or `{"id": "3"}`; only an explicit `null` means "no profile".
fn body_profile_id(v: &Value) -> Result<Option<ProfileId>> {
    match v.get("id") {
        None => Err(StoreError::validation("could not find profile with id")),
        Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|x| Some(ProfileId(x)))
            .ok_or_else(|| StoreError::validation(format!("bad profile id {n}"))),
        Some(Value::String(s)) => s.parse().map(Some),
        Some(other) => Err(StoreError::validation(format!("bad profile id {other}"))),
    }
}

/// Handle one request. `None` when `path` lies outside the API prefix.
pub fn handle(
    store: &Store,
    cfg: &VeggieConfig,
    method: &str,
    path: &str,
    body: &[u8],
) -> Option<ApiReply> {
    let path = path.split('?').next().unwrap_or_default();
    let rest = path.strip_prefix(cfg.api_prefix.as_str())?;
    if !(rest.is_empty() || rest.starts_with('/')) {
        return None;
    }
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let method = method.to_ascii_uppercase();

    let reply = match route(store, cfg, &method, &segments, body) {
        Ok(r) => r,
        Err(e) => {
            warn!("api: {} {} failed: {}", method, path, e);
            ApiReply::failed(e.http_status(), e.to_string())
        }
    };
    Some(reply)
}

fn route(
    store: &Store,
    cfg: &VeggieConfig,
    method: &str,
    segments: &[&str],
    body: &[u8],
) -> Result<ApiReply> {
    match (method, segments) {
        ("OPTIONS", _) => Ok(ApiReply::success(store.identity(), None, None)),

        ("GET", ["ping"]) => Ok(ApiReply::success(
            store.identity(),
            Some("pong".into()),
            None,
        )),

        ("GET", ["metrics"]) => Ok(ApiReply {
            status: 200,
            body: ApiBody::Text(metrics::snapshot().to_prometheus()),
            invalidate_router: false,
        }),

        // ----- services -----
        ("GET", ["store"]) => {
            let snap = store.get_state();
            let data = to_json(&services_sel(&snap));
            Ok(ApiReply::success(snap.identity(), None, Some(data)))
        }

        ("POST", ["store"]) => {
            let desc: ServiceDescriptor = serde_json::from_value(parse_body(body)?)
                .map_err(|e| StoreError::validation(format!("bad service descriptor: {e}")))?;
            let url = desc.url.clone();
            let d = store.dispatch(register_service(desc))?;
            let message = format!("creating new service {url}");
            info!("{message}");
            Ok(ApiReply::success(
                d.snapshot.identity(),
                Some(message),
                Some(json!({"id": d.value})),
            )
            .invalidating(d.invalidate_router))
        }

        // ----- profiles (matched before /store/:id) -----
        ("GET", ["store", "profile"]) => {
            let snap = store.get_state();
            let data = to_json(&profiles_sel(&snap));
            Ok(ApiReply::success(snap.identity(), None, Some(data)))
        }

        ("POST", ["store", "profile"]) => {
            let v = parse_body(body)?;
            let name = body_str(&v, "name")?.to_string();
            let d = store.dispatch(capture_profile(name.clone()))?;
            let message = format!("saving {name} profile");
            info!("{message}");
            Ok(ApiReply::success(
                d.snapshot.identity(),
                Some(message),
                Some(json!({"id": d.value})),
            ))
        }

        ("PUT", ["store", "profile"]) => {
            let id = body_profile_id(&parse_body(body)?)?;
            if let Some(pid) = id {
                codec::ensure_loaded(store, cfg, pid)?;
            }
            let d = store.dispatch(set_current_profile(id))?;
            let message = match id.and_then(|pid| profile_by_id_sel(&d.snapshot, pid)) {
                Some(p) => format!("loading {} profile", p.name),
                None => "selecting no profile".to_string(),
            };
            info!("{message}");
            Ok(ApiReply::success(d.snapshot.identity(), Some(message), None)
                .invalidating(d.invalidate_router))
        }

        ("DELETE", ["store", "profile"]) => {
            let d = store.dispatch(reset_all())?;
            let message = "resetting all services to defaults".to_string();
            info!("{message}");
            Ok(ApiReply::success(d.snapshot.identity(), Some(message), None)
                .invalidating(d.invalidate_router))
        }

        ("POST", ["store", "profile", "load"]) => {
            let v = parse_body(body)?;
            let name = body_str(&v, "name")?;
            let d = codec::load_profile(store, cfg, name)?;
            let message = format!("profile {name} loaded from disk");
            info!("{message}");
            Ok(ApiReply::success(
                d.snapshot.identity(),
                Some(message),
                Some(json!({"id": d.value})),
            ))
        }

        ("GET", ["store", "profile", id]) => {
            let pid: ProfileId = id.parse()?;
            let snap = store.get_state();
            let profile = profile_by_id_sel(&snap, pid)
                .ok_or_else(|| StoreError::not_found("profile", pid))?;
            let data = profile_data_sel(&snap, Some(pid));
            let view = json!({
                "id": profile.id,
                "name": profile.name,
                "current": snap.profiles().current() == Some(pid),
                "data": data.as_deref().map(to_json),
            });
            Ok(ApiReply::success(snap.identity(), None, Some(view)))
        }

        ("POST", ["store", "profile", id]) => {
            let pid: ProfileId = id.parse()?;
            let d = store.dispatch(update_profile(pid))?;
            let message = format!("updating profile {pid}");
            info!("{message}");
            Ok(ApiReply::success(d.snapshot.identity(), Some(message), None))
        }

        ("DELETE", ["store", "profile", id]) => {
            let pid: ProfileId = id.parse()?;
            let d = store.dispatch(delete_profile(pid))?;
            let message = if d.invalidate_router {
                format!("deleting current profile {pid}")
            } else {
                format!("deleting profile {pid}")
            };
            info!("{message}");
            Ok(ApiReply::success(d.snapshot.identity(), Some(message), None)
                .invalidating(d.invalidate_router))
        }

        ("POST", ["store", "profile", id, "save"]) => {
            let pid: ProfileId = id.parse()?;
            let path = codec::persist_profile(store, cfg, pid)?;
            let message = format!("saved to {}", path.display());
            Ok(ApiReply::success(
                store.identity(),
                Some(message),
                Some(json!({"path": path.display().to_string()})),
            ))
        }

        // ----- single service -----
        ("GET", ["store", id]) => {
            let sid: ServiceId = id.parse()?;
            let snap = store.get_state();
            let service = service_by_id_sel(&snap, sid)
                .ok_or_else(|| StoreError::not_found("service", sid))?;
            let data = to_json(service);
            Ok(ApiReply::success(snap.identity(), None, Some(data)))
        }

        ("POST", ["store", id]) => {
            let sid: ServiceId = id.parse()?;
            let patch: OverridePatch = serde_json::from_value(parse_body(body)?)
                .map_err(|e| StoreError::validation(format!("bad override: {e}")))?;
            let patch = (!patch.is_empty()).then_some(patch);
            let d = store.dispatch(set_override(sid, patch))?;
            let status = service_by_id_sel(&d.snapshot, sid)
                .and_then(|s| s.r#override.as_ref())
                .map(|o| o.status.to_string())
                .unwrap_or_else(|| "default".into());
            let message = format!("setting override on service {sid} with {status} status");
            info!("{message}");
            Ok(ApiReply::success(d.snapshot.identity(), Some(message), None)
                .invalidating(d.invalidate_router))
        }

        ("DELETE", ["store", id]) => {
            let sid: ServiceId = id.parse()?;
            let d = store.dispatch(delete_service(sid))?;
            let message = format!("deleting service {sid}");
            info!("{message}");
            Ok(ApiReply::success(d.snapshot.identity(), Some(message), None)
                .invalidating(d.invalidate_router))
        }

        _ => Ok(ApiReply::failed(
            501,
            format!("{} /{} not implemented", method, segments.join("/")),
        )),
    }
}
