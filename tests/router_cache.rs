use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use veggie::mutators::{
    capture_profile, delete_service, register_service, set_current_profile, set_override,
};
use veggie::{OverridePatch, Reply, RouteCache, RouteTable, ServiceDescriptor, Store};

fn seeded() -> Result<Arc<Store>> {
    let store = Store::with_services([
        ServiceDescriptor::new("http://api.local/users")
            .with_default_response(200, json!([{"id": 1}])),
        ServiceDescriptor::new("http://api.local/orders/"),
        ServiceDescriptor::new("http://other.local/users")
            .with_default_response(201, json!("other")),
    ])?;
    Ok(Arc::new(store))
}

#[test]
fn table_reflects_defaults_and_overrides() -> Result<()> {
    let store = seeded()?;
    let table = RouteTable::build(&store.get_state());
    assert_eq!(table.len(), 3);
    assert_eq!(table.identity(), store.identity());

    match &table.resolve("/users?page=2").expect("route").reply {
        Reply::Default { status, body } => {
            assert_eq!(*status, 200);
            assert_eq!(body, &json!([{"id": 1}]));
        }
        other => panic!("unexpected {other:?}"),
    }
    // trailing slash в url сервиса не мешает
    assert!(table.resolve("/orders").is_some());
    assert!(table.resolve("/missing").is_none());

    // хост выбирает среди одинаковых путей
    let r = table.resolve_for_host(Some("other.local:1337"), "/users").expect("route");
    assert_eq!(r.host, "other.local");
    let r = table.resolve_for_host(Some("unknown"), "/users").expect("fallback");
    assert_eq!(r.host, "api.local");
    Ok(())
}

#[test]
fn cache_rebuilds_only_after_invalidation() -> Result<()> {
    let store = seeded()?;
    let cache = RouteCache::new(store.clone());
    let t0 = cache.table();
    assert!(!cache.is_stale());

    // capture не трогает маршруты
    store.dispatch(capture_profile("snap".into()))?;
    assert!(!cache.is_stale());
    let t1 = cache.table();
    assert!(Arc::ptr_eq(&t0, &t1));
    assert_ne!(t1.identity(), store.identity());

    let users = store.get_state().services().ids()[0];
    store.dispatch(set_override(
        users,
        Some(OverridePatch::status(500).with_response(json!({"error": "boom"}))),
    ))?;
    assert!(cache.is_stale());
    let t2 = cache.table();
    assert!(!cache.is_stale());
    assert_eq!(t2.identity(), store.identity());
    assert_eq!(
        t2.resolve("/users").map(|r| r.reply.clone()),
        Some(Reply::Override {
            status: 500,
            body: json!({"error": "boom"})
        })
    );

    // без новых событий таблица та же
    assert!(Arc::ptr_eq(&t2, &cache.table()));
    Ok(())
}

#[test]
fn hang_and_delete_are_routed() -> Result<()> {
    let store = seeded()?;
    let cache = RouteCache::new(store.clone());
    let ids = store.get_state().services().ids().to_vec();

    store.dispatch(set_override(ids[1], Some(OverridePatch::hang())))?;
    assert_eq!(
        cache.table().resolve("/orders").map(|r| r.reply.clone()),
        Some(Reply::Hang)
    );

    store.dispatch(delete_service(ids[1]))?;
    assert!(cache.table().resolve("/orders").is_none());
    Ok(())
}

#[test]
fn activating_profile_invalidates_routes() -> Result<()> {
    let store = seeded()?;
    let users = store.get_state().services().ids()[0];
    store.dispatch(set_override(users, Some(OverridePatch::status(418))))?;
    let teapot = store.dispatch(capture_profile("teapot".into()))?.value;
    store.dispatch(set_override(users, None))?;

    let cache = RouteCache::new(store.clone());
    assert!(matches!(
        cache.table().resolve("/users").map(|r| &r.reply),
        Some(Reply::Default { .. })
    ));

    store.dispatch(set_current_profile(Some(teapot)))?;
    assert!(cache.is_stale());
    assert!(matches!(
        cache.table().resolve("/users").map(|r| r.reply.clone()),
        Some(Reply::Override { status: 418, .. })
    ));

    // новый сервис тоже виден после перестройки
    store.dispatch(register_service(ServiceDescriptor::new("http://api.local/new")))?;
    assert!(cache.table().resolve("/new").is_some());
    Ok(())
}

#[test]
fn ipv6_host_header_keeps_the_address() -> Result<()> {
    let store = Arc::new(Store::with_services([
        ServiceDescriptor::new("http://api.local/ping").with_default_response(200, json!("v4")),
        ServiceDescriptor::new("http://[::1]/ping").with_default_response(200, json!("v6")),
    ])?);
    let table = RouteTable::build(&store.get_state());

    let r = table.resolve_for_host(Some("[::1]:1337"), "/ping").expect("route");
    assert_eq!(r.host, "[::1]");
    let r = table.resolve_for_host(Some("[::1]"), "/ping").expect("route");
    assert_eq!(r.host, "[::1]");
    let r = table.resolve_for_host(Some("api.local:80"), "/ping").expect("route");
    assert_eq!(r.host, "api.local");
    Ok(())
}
