use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use serde_json::json;

use veggie::codec::{self, ensure_loaded, index_profile_dir, load_profile, persist_profile};
use veggie::mutators::{capture_profile, register_service, set_current_profile, set_override};
use veggie::selectors::{profile_by_name_sel, profile_dir_sel};
use veggie::{OverridePatch, ServiceDescriptor, Store, StoreError, VeggieConfig};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let base = std::env::temp_dir();
    base.join(format!("veggietest-codec-{prefix}-{pid}-{t}-{id}"))
}

fn no_tmp_left(dir: &std::path::Path) -> Result<bool> {
    for entry in fs::read_dir(dir)? {
        if entry?.path().extension().is_some_and(|e| e == "tmp") {
            return Ok(false);
        }
    }
    Ok(true)
}

fn cfg_at(root: &PathBuf) -> VeggieConfig {
    VeggieConfig::default().with_profile_dir(root.join("profiles"))
}

#[test]
fn capture_save_load_roundtrip() -> Result<()> {
    let root = unique_root("roundtrip");
    let cfg = cfg_at(&root);

    let store = Store::new();
    let s1 = store
        .dispatch(register_service(ServiceDescriptor::new("http://url1")))?
        .value;
    store.dispatch(set_override(
        s1,
        Some(OverridePatch::status(418).with_response(json!({"tea": [1, 2]}))),
    ))?;
    let pid = store.dispatch(capture_profile("teapot".into()))?.value;

    let path = persist_profile(&store, &cfg, pid)?;
    assert_eq!(path, profile_dir_sel(&cfg).join("teapot.json"));
    assert!(path.exists());
    // tmp-файлы не остаются
    assert!(no_tmp_left(profile_dir_sel(&cfg))?);

    let original = store
        .get_state()
        .profiles()
        .get(pid)
        .and_then(|p| p.data.clone())
        .expect("captured data");
    let loaded = codec::load("teapot", profile_dir_sel(&cfg))?;
    assert_eq!(loaded, original);

    // формат файла: {url: {status, response, hang}}
    let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path)?)?;
    assert_eq!(
        raw,
        json!({"http://url1/": {"status": 418, "response": {"tea": [1, 2]}, "hang": false}})
    );

    fs::remove_dir_all(&root).ok();
    Ok(())
}

#[test]
fn load_into_fresh_store_and_activate() -> Result<()> {
    let root = unique_root("fresh");
    let cfg = cfg_at(&root);

    {
        let store = Store::new();
        let a = store
            .dispatch(register_service(ServiceDescriptor::new("http://x/api")))?
            .value;
        store.dispatch(set_override(a, Some(OverridePatch::status(503))))?;
        let pid = store.dispatch(capture_profile("outage".into()))?.value;
        persist_profile(&store, &cfg, pid)?;
    }

    let store = Store::new();
    let a = store
        .dispatch(register_service(ServiceDescriptor::new("http://x/api")))?
        .value;
    let d = load_profile(&store, &cfg, "outage.json")?;
    assert!(!d.invalidate_router, "loading is not activating");
    assert!(store.get_state().services().get(a).unwrap().r#override.is_none());

    store.dispatch(set_current_profile(Some(d.value)))?;
    let snap = store.get_state();
    assert_eq!(
        snap.services().get(a).unwrap().r#override.as_ref().map(|o| o.status),
        Some(503)
    );

    fs::remove_dir_all(&root).ok();
    Ok(())
}

#[test]
fn missing_file_is_not_found_and_store_untouched() -> Result<()> {
    let root = unique_root("missing");
    let cfg = cfg_at(&root);
    let store = Store::new();
    let before = store.identity();

    let err = load_profile(&store, &cfg, "nope").unwrap_err();
    assert!(matches!(err, StoreError::NotFound { what: "profile file", .. }));
    assert_eq!(store.identity(), before);
    Ok(())
}

#[test]
fn garbage_file_is_decode_failure() -> Result<()> {
    let root = unique_root("garbage");
    let cfg = cfg_at(&root);
    fs::create_dir_all(cfg.profile_dir())?;
    fs::write(cfg.profile_dir().join("broken.json"), b"{\"http://a\": 12")?;
    fs::write(cfg.profile_dir().join("badkey.json"), b"{\"not a url\": {}}")?;
    fs::write(
        cfg.profile_dir().join("twice.json"),
        br#"{"http://a": {"status": 500}, "http://a/": {"status": 503}}"#,
    )?;

    let store = Store::new();
    let before = store.identity();

    let err = load_profile(&store, &cfg, "broken").unwrap_err();
    assert!(matches!(err, StoreError::Decode { .. }));
    assert!(err.is_profile_unusable());
    let err = load_profile(&store, &cfg, "badkey").unwrap_err();
    assert!(matches!(err, StoreError::Decode { .. }));
    // два ключа на один url: ошибка, а не "последний победил"
    let err = load_profile(&store, &cfg, "twice").unwrap_err();
    assert!(matches!(err, StoreError::Decode { .. }));

    assert_eq!(store.identity(), before, "failed load never touches the store");
    assert!(store.get_state().profiles().is_empty());

    fs::remove_dir_all(&root).ok();
    Ok(())
}

#[test]
fn absolute_name_overrides_directory() -> Result<()> {
    let root = unique_root("abs");
    fs::create_dir_all(&root)?;
    let elsewhere = root.join("elsewhere").join("snap");
    let cfg = cfg_at(&root);

    let data = veggie::ProfileData::from_entries([("http://a", veggie::Override::default())])?;
    let path = codec::save_data(elsewhere.to_str().unwrap(), &data, cfg.profile_dir(), true)?;
    assert_eq!(path, root.join("elsewhere").join("snap.json"));
    assert!(!cfg.profile_dir().join("snap.json").exists());

    let store = Store::new();
    let d = load_profile(&store, &cfg, path.to_str().unwrap())?;
    let snap = store.get_state();
    assert_eq!(snap.profiles().get(d.value).map(|p| p.name.as_str()), Some("snap"));

    fs::remove_dir_all(&root).ok();
    Ok(())
}

#[test]
fn save_without_create_dir_fails_with_io() -> Result<()> {
    let root = unique_root("nodir");
    let cfg = cfg_at(&root).with_create_profile_dir(false);
    let store = Store::new();
    let pid = store.dispatch(capture_profile("p".into()))?.value;

    let err = persist_profile(&store, &cfg, pid).unwrap_err();
    match err {
        StoreError::Io { path, .. } => assert!(path.starts_with(cfg.profile_dir())),
        other => panic!("expected Io, got {other:?}"),
    }
    Ok(())
}

#[test]
fn index_then_lazy_load() -> Result<()> {
    let root = unique_root("index");
    let cfg = cfg_at(&root);
    fs::create_dir_all(cfg.profile_dir())?;
    fs::write(
        cfg.profile_dir().join("slow.json"),
        br#"{"http://a": {"hang": true}}"#,
    )?;
    fs::write(cfg.profile_dir().join("ok.json"), b"{}")?;
    fs::write(cfg.profile_dir().join("notes.txt"), b"ignored")?;

    assert_eq!(codec::list(cfg.profile_dir())?, vec!["ok", "slow"]);

    let store = Store::new();
    let ids = index_profile_dir(&store, &cfg)?;
    assert_eq!(ids.len(), 2);
    let slow = profile_by_name_sel(&store.get_state(), "slow")
        .map(|p| (p.id, p.is_loaded()))
        .expect("indexed");
    assert!(!slow.1);

    ensure_loaded(&store, &cfg, slow.0)?;
    let snap = store.get_state();
    let data = snap.profiles().get(slow.0).and_then(|p| p.data.as_ref()).expect("loaded");
    assert!(data.get("http://a/").map(|o| o.hang).unwrap_or(false));

    // повторный вызов — no-op
    let before = store.identity();
    ensure_loaded(&store, &cfg, slow.0)?;
    assert_eq!(store.identity(), before);

    fs::remove_dir_all(&root).ok();
    Ok(())
}

#[test]
fn listing_missing_dir_is_empty() -> Result<()> {
    let root = unique_root("empty");
    assert!(codec::list(&root)?.is_empty());
    Ok(())
}

#[test]
fn concurrent_saves_of_one_profile() -> Result<()> {
    let root = unique_root("concurrent");
    let cfg = Arc::new(cfg_at(&root));
    let store = Arc::new(Store::new());

    for i in 0..200 {
        let id = store
            .dispatch(register_service(ServiceDescriptor::new(format!("http://svc{i}/x"))))?
            .value;
        store.dispatch(set_override(id, Some(OverridePatch::status(500))))?;
    }
    let pid = store.dispatch(capture_profile("p".into()))?.value;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let cfg = cfg.clone();
        handles.push(thread::spawn(move || -> veggie::Result<()> {
            for _ in 0..50 {
                persist_profile(&store, &cfg, pid)?;
            }
            Ok(())
        }));
    }
    for h in handles {
        // каждый save должен пройти, без ложных Io
        h.join().expect("saver thread")?;
    }

    let loaded = codec::load("p", cfg.profile_dir())?;
    assert_eq!(loaded.len(), 200);
    assert!(no_tmp_left(cfg.profile_dir())?);

    fs::remove_dir_all(&root).ok();
    Ok(())
}
