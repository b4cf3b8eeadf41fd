use catalog_sync::{CatalogService, ChangeChannel, ChangeEvent, Config, MigrationFlag};
use parking_lot::Mutex;
use shared::models::OverlayCreate;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn on_disk_config(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::in_memory();
    config.db_path = Some(dir.path().join("catalog.redb"));
    config.cache_ttl = Duration::from_secs(3600);
    config
}

fn vase(code: &str) -> OverlayCreate {
    OverlayCreate {
        product_code: code.to_string(),
        title: "Granit Vazo".to_string(),
        category: "Mezar Vazoları".to_string(),
        ..Default::default()
    }
}

#[test]
fn test_storage_change_reaches_other_sessions_only() {
    let tab_a = CatalogService::open(&Config::in_memory()).unwrap();
    let tab_b = tab_a.open_session();

    let seen_a = Arc::new(Mutex::new(Vec::new()));
    let seen_b = Arc::new(Mutex::new(Vec::new()));
    let _sub_a = {
        let seen = seen_a.clone();
        tab_a.subscribe(ChangeChannel::StorageChanged, move |e| seen.lock().push(e.clone()))
    };
    let _sub_b = {
        let seen = seen_b.clone();
        tab_b.subscribe(ChangeChannel::StorageChanged, move |e| seen.lock().push(e.clone()))
    };

    tab_a.create(vase("V-1")).unwrap();
    assert!(seen_a.lock().is_empty());
    assert_eq!(
        *seen_b.lock(),
        vec![ChangeEvent::StorageChanged {
            key: "catalog.overlay".to_string()
        }]
    );
}

#[test]
fn test_other_session_reads_fresh_view_inside_notification() {
    let tab_a = CatalogService::open(&Config::in_memory()).unwrap();
    let tab_b = tab_a.open_session();
    let base = tab_b.all().len();

    let lengths = Arc::new(Mutex::new(Vec::new()));
    let _sub = {
        let lengths = lengths.clone();
        let reader = tab_b.clone();
        tab_b.subscribe_refresh(move |_| lengths.lock().push(reader.all().len()))
    };

    let created = tab_a.create(vase("V-2")).unwrap();
    assert_eq!(*lengths.lock(), vec![base + 1]);

    tab_a.set_active(created.id(), false).unwrap();
    assert_eq!(*lengths.lock(), vec![base + 1, base]);
}

#[test]
fn test_other_session_handler_reads_and_writes_through_writer() {
    let tab_a = CatalogService::open(&Config::in_memory()).unwrap();
    let tab_b = tab_a.open_session();

    let observed = Arc::new(Mutex::new(Vec::new()));
    let wrote_back = Arc::new(AtomicBool::new(false));
    let _sub = {
        let observed = observed.clone();
        let wrote_back = wrote_back.clone();
        let writer = tab_a.clone();
        tab_b.subscribe(ChangeChannel::StorageChanged, move |_| {
            // The writer's own cache is already fresh here
            let codes: Vec<String> = writer
                .overlay_entries()
                .iter()
                .filter(|e| writer.find(e.id()).is_some())
                .map(|e| e.entry.product_code.clone())
                .collect();
            observed.lock().push(codes);

            if !wrote_back.swap(true, Ordering::SeqCst) {
                writer.create(vase("V-REPLY")).unwrap();
            }
        })
    };

    tab_a.all();
    tab_a.create(vase("V-ASK")).unwrap();

    let observed = observed.lock();
    assert_eq!(observed[0], vec!["V-ASK".to_string()]);
    assert_eq!(observed[1], vec!["V-ASK".to_string(), "V-REPLY".to_string()]);
    assert_eq!(tab_a.all().len(), tab_a.builtin().len() + 2);
    assert_eq!(tab_b.all().len(), tab_b.builtin().len() + 2);
}

#[test]
fn test_dropped_session_stops_listening() {
    let tab_a = CatalogService::open(&Config::in_memory()).unwrap();
    {
        let _tab_b = tab_a.open_session();
    }
    // No listener left behind for the dropped session
    tab_a.create(vase("V-3")).unwrap();
    assert_eq!(tab_a.overlay_entries().len(), 1);
}

#[test]
fn test_flags_and_overlay_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = on_disk_config(&dir);
    {
        let svc = CatalogService::open(&config).unwrap();
        let report = svc.run_migrations(true);
        assert!(report.imported > 0);
        assert_eq!(report.seeded, 3);
    }

    let svc = CatalogService::open(&config).unwrap();
    assert!(svc.store().flag(MigrationFlag::StaticCatalogImported));
    assert!(svc.store().flag(MigrationFlag::DemoContentSeeded));
    let before = svc.overlay_entries();
    let report = svc.run_migrations(true);
    assert_eq!(report.imported + report.seeded, 0);
    assert_eq!(svc.overlay_entries(), before);
}

#[test]
fn test_corrupt_store_degrades_to_builtin_view() {
    let svc = CatalogService::open(&Config::in_memory()).unwrap();
    svc.store().put_raw("catalog.overlay", b"[{\"id\":").unwrap();
    assert!(svc.overlay_entries().is_empty());
    assert_eq!(svc.all().len(), svc.builtin().len());
}

#[tokio::test]
async fn test_async_receiver_sees_write() {
    let svc = CatalogService::open(&Config::in_memory()).unwrap();
    let mut rx = svc.bus().receiver();
    let created = svc.create(vase("V-4")).unwrap();
    assert_eq!(rx.recv().await.unwrap(), ChangeEvent::CatalogUpdated);
    assert_eq!(
        rx.recv().await.unwrap(),
        ChangeEvent::ItemChanged { id: created.id() }
    );
}
