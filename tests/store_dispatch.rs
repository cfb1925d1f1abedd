use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::Result;

use veggie::mutators::{
    capture_profile, delete_profile, delete_service, register_service, reset_all,
    set_current_profile, set_override,
};
use veggie::subs::{callback, Event, Filter};
use veggie::{Mutation, OverridePatch, ServiceDescriptor, ServiceId, Store, StoreError};

#[test]
fn identity_changes_on_every_dispatch() -> Result<()> {
    let store = Store::new();
    let mut seen = HashSet::new();
    seen.insert(store.identity());

    let a = store.dispatch(register_service(ServiceDescriptor::new("http://a")))?.value;
    seen.insert(store.identity());
    store.dispatch(set_override(a, Some(OverridePatch::status(500))))?;
    seen.insert(store.identity());
    // capture не трогает роутер, но identity всё равно новая
    store.dispatch(capture_profile("p1".into()))?;
    seen.insert(store.identity());
    store.dispatch(reset_all())?;
    seen.insert(store.identity());

    assert_eq!(seen.len(), 5, "every snapshot must carry a fresh identity");
    Ok(())
}

#[test]
fn get_state_is_stable_between_dispatches() -> Result<()> {
    let store = Store::new();
    store.dispatch(register_service(ServiceDescriptor::new("http://a")))?;
    let s1 = store.get_state();
    let s2 = store.get_state();
    assert!(Arc::ptr_eq(&s1, &s2));

    let d = store.dispatch(reset_all())?;
    let s3 = store.get_state();
    assert!(Arc::ptr_eq(&d.snapshot, &s3));
    assert!(!Arc::ptr_eq(&s1, &s3));
    // старый snapshot остаётся валидным
    assert_eq!(s1.services().len(), 1);
    Ok(())
}

#[test]
fn failed_mutator_rolls_back_completely() -> Result<()> {
    let store = Store::new();
    let a = store.dispatch(register_service(ServiceDescriptor::new("http://a")))?.value;
    let before = store.get_state();

    // Мутатор, который успевает изменить кандидата и затем падает
    let res = store.dispatch(|prev| -> veggie::Result<Mutation> {
        let half = set_override(a, Some(OverridePatch::status(503)))(prev)?;
        assert!(half.state.services().get(a).unwrap().is_overridden());
        Err(StoreError::validation("boom"))
    });
    assert!(matches!(res, Err(StoreError::Validation(_))));

    let after = store.get_state();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(before.identity(), after.identity());
    assert!(after.services().get(a).unwrap().r#override.is_none());
    Ok(())
}

#[test]
fn not_found_and_validation_leave_state_untouched() -> Result<()> {
    let store = Store::new();
    let before = store.identity();

    let err = store
        .dispatch(set_override(ServiceId(42), None))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { what: "service", .. }));
    assert_eq!(err.http_status(), 404);

    let err = store
        .dispatch(register_service(ServiceDescriptor::new("no scheme here")))
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert_eq!(err.http_status(), 400);

    let err = store.dispatch(capture_profile("   ".into())).unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    assert_eq!(store.identity(), before);
    assert!(store.get_state().services().is_empty());
    Ok(())
}

#[test]
fn invalidation_flag_per_mutator() -> Result<()> {
    let store = Store::new();

    let d = store.dispatch(register_service(ServiceDescriptor::new("http://a")))?;
    assert!(d.invalidate_router, "registerService");
    let a = d.value;

    let d = store.dispatch(set_override(a, Some(OverridePatch::status(500))))?;
    assert!(d.invalidate_router, "setOverride");

    let d = store.dispatch(capture_profile("p1".into()))?;
    assert!(!d.invalidate_router, "captureProfile never invalidates");
    let p1 = d.value;

    let d = store.dispatch(capture_profile("p2".into()))?;
    let p2 = d.value;

    let d = store.dispatch(set_current_profile(Some(p1)))?;
    assert!(d.invalidate_router, "setCurrentProfile");

    let d = store.dispatch(delete_profile(p2))?;
    assert!(!d.invalidate_router, "deleting a non-current profile");

    let d = store.dispatch(delete_profile(p1))?;
    assert!(d.invalidate_router, "deleting the current profile");

    let d = store.dispatch(reset_all())?;
    assert!(d.invalidate_router, "resetAll");

    let d = store.dispatch(delete_service(a))?;
    assert!(d.invalidate_router, "deleteService");
    Ok(())
}

#[test]
fn events_arrive_in_dispatch_order() -> Result<()> {
    let store = Store::new();
    let all: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(Vec::new()));
    let inval: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(Vec::new()));

    let all_c = all.clone();
    let _h1 = store.subscribe(
        Filter::All,
        callback(move |ev: &Event| all_c.lock().unwrap().push(*ev)),
    );
    let inval_c = inval.clone();
    let h2 = store.subscribe(
        Filter::Invalidations,
        callback(move |ev: &Event| inval_c.lock().unwrap().push(*ev)),
    );

    store.dispatch(register_service(ServiceDescriptor::new("http://a")))?;
    store.dispatch(capture_profile("p".into()))?;
    store.dispatch(reset_all())?;

    let got = all.lock().unwrap().clone();
    assert_eq!(got.len(), 3);
    assert!(got[0].identity.seq < got[1].identity.seq);
    assert!(got[1].identity.seq < got[2].identity.seq);
    assert_eq!(
        got.iter().map(|e| e.invalidate_router).collect::<Vec<_>>(),
        vec![true, false, true]
    );
    assert_eq!(inval.lock().unwrap().len(), 2);

    // drop отписывает
    drop(h2);
    store.dispatch(reset_all())?;
    assert_eq!(inval.lock().unwrap().len(), 2);
    assert_eq!(all.lock().unwrap().len(), 4);
    assert_eq!(store.subscriptions().len(), 1);
    Ok(())
}

#[test]
fn concurrent_writers_and_readers_see_consistent_snapshots() -> Result<()> {
    let store = Arc::new(Store::new());
    let ids: Vec<ServiceId> = (0..4)
        .map(|i| {
            store
                .dispatch(register_service(ServiceDescriptor::new(format!("http://svc{i}"))))
                .map(|d| d.value)
        })
        .collect::<veggie::Result<_>>()?;
    let start_seq = store.identity().seq;

    let done = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();
    for _ in 0..3 {
        let store = store.clone();
        let done = done.clone();
        readers.push(thread::spawn(move || {
            let mut last = 0u64;
            while !done.load(Ordering::Acquire) {
                let snap = store.get_state();
                snap.check_consistency().expect("consistent snapshot");
                // монотонная видимость для одного читателя
                assert!(snap.identity().seq >= last);
                last = snap.identity().seq;
                // reset_all и set_override всегда ставят все или ничего
                assert_eq!(snap.services().len(), 4);
            }
        }));
    }

    let mut writers = Vec::new();
    for w in 0..4 {
        let store = store.clone();
        let ids = ids.clone();
        writers.push(thread::spawn(move || {
            for i in 0..50u16 {
                let id = ids[(w + i as usize) % ids.len()];
                store
                    .dispatch(set_override(id, Some(OverridePatch::status(500 + i))))
                    .expect("set_override");
                if i % 10 == 0 {
                    store.dispatch(reset_all()).expect("reset_all");
                }
            }
        }));
    }
    for h in writers {
        h.join().expect("writer");
    }
    done.store(true, Ordering::Release);
    for h in readers {
        h.join().expect("reader");
    }

    // 4 writers * (50 set_override + 5 reset_all)
    assert_eq!(store.identity().seq, start_seq + 4 * 55);
    Ok(())
}

#[test]
fn seeded_store_starts_at_genesis() -> Result<()> {
    let store = Store::with_services(vec![
        ServiceDescriptor::new("http://a/x"),
        ServiceDescriptor::new("http://b/y").with_override(OverridePatch::status(503)),
    ])?;
    let snap = store.get_state();
    assert_eq!(snap.identity().seq, 0);
    assert_eq!(snap.services().len(), 2);
    let second = snap.services().iter().nth(1).unwrap();
    assert_eq!(second.r#override.as_ref().map(|o| o.status), Some(503));

    assert!(Store::with_services(vec![ServiceDescriptor::new("::bad::")]).is_err());
    Ok(())
}
