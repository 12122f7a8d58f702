use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use xbridge::config::types::HelperRole;
use xbridge::registry::json::JsonRegistry;
use xbridge::registry::{ImageSource, SandboxRecord, SandboxRegistry};
use xbridge::testing::{CountingRegistry, FakeRuntime};
use xbridge::{
    bridge_for, BridgeConfig, BridgeContext, BridgeError, BridgeState, Service, ServiceStatus,
};

const SERVER: &str = "!service-subuser-browser-xpra-server";
const CLIENT: &str = "!service-subuser-browser-xpra-client";

fn config(root: &Path) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.volumes_dir = root.join("volumes");
    config.registry_path = root.join("registry.json");
    config.helper_home = PathBuf::from("/home/user");
    config.readiness_poll_ms = 5;
    config.readiness_timeout_ms = Some(2_000);
    config
}

fn owner_registry() -> CountingRegistry<JsonRegistry> {
    let registry = JsonRegistry::in_memory();
    registry.insert(SandboxRecord::new("browser")).unwrap();
    CountingRegistry::new(registry)
}

#[test]
fn test_browser_full_lifecycle() {
    let root = tempfile::tempdir().unwrap();
    let registry = Arc::new(owner_registry());
    let runtime = Arc::new(FakeRuntime::new());
    let ctx = BridgeContext::new(config(root.path()), registry.clone(), runtime.clone());
    let bridge = bridge_for("browser", &ctx).unwrap();

    bridge.setup().unwrap();
    assert!(bridge.is_setup());
    let server = registry.resolve(SERVER).unwrap();
    let client = registry.resolve(CLIENT).unwrap();
    assert_eq!(server.permissions.system_dirs.len(), 2);
    assert_eq!(client.permissions.system_dirs.len(), 1);
    assert_eq!(
        server.image_source,
        Some(ImageSource::new("default", "subuser-internal-xpra-server"))
    );
    let owner = registry.resolve("browser").unwrap();
    assert!(owner.service_helpers.contains(SERVER));
    assert!(owner.service_helpers.contains(CLIENT));

    let mut status = ServiceStatus::new();
    bridge.start(&mut status).unwrap();
    assert_eq!(status.len(), 2);
    let server_id = status.handle(HelperRole::Server).unwrap().to_string();
    let client_id = status.handle(HelperRole::Client).unwrap().to_string();
    assert!(!server_id.is_empty() && !client_id.is_empty());

    let socket_dir = root.path().join("volumes/xpra/browser/tmp/.X11-unix");
    let mode = std::fs::metadata(&socket_dir).unwrap().permissions().mode();
    assert_eq!(mode & 0o7777, 0o1777);
    assert!(socket_dir.join("X100").exists());

    bridge.stop(&mut status).unwrap();
    assert_eq!(runtime.stops(), vec![client_id, server_id]);
    assert!(status.is_empty());
    assert!(!socket_dir.exists());
    assert!(!root.path().join("volumes/xpra/browser/xpra-home").exists());
    assert_eq!(bridge.state(), BridgeState::Stopped);
}

#[test]
fn test_setup_twice_creates_helpers_once() {
    let root = tempfile::tempdir().unwrap();
    let registry = Arc::new(owner_registry());
    let ctx = BridgeContext::new(config(root.path()), registry.clone(), Arc::new(FakeRuntime::new()));
    let bridge = bridge_for("browser", &ctx).unwrap();

    bridge.setup().unwrap();
    bridge.setup().unwrap();
    assert_eq!(registry.creations(), 2);
    assert_eq!(registry.permission_saves(), 2);
}

#[test]
fn test_setup_completes_partially_created_pair() {
    let root = tempfile::tempdir().unwrap();
    let registry = Arc::new(owner_registry());
    registry
        .inner()
        .create_from_image_source(SERVER, &ImageSource::new("default", "subuser-internal-xpra-server"))
        .unwrap();

    let ctx = BridgeContext::new(config(root.path()), registry.clone(), Arc::new(FakeRuntime::new()));
    let bridge = bridge_for("browser", &ctx).unwrap();
    assert!(!bridge.is_setup());

    bridge.setup().unwrap();
    assert_eq!(registry.creations(), 1);
    assert!(bridge.is_setup());
}

#[test]
fn test_setup_retry_after_failed_verification_grants_mounts() {
    let root = tempfile::tempdir().unwrap();
    let registry = Arc::new(owner_registry().with_failing_verifications(1));
    let runtime = Arc::new(FakeRuntime::new());
    let ctx = BridgeContext::new(config(root.path()), registry.clone(), runtime.clone());
    let bridge = bridge_for("browser", &ctx).unwrap();

    assert!(matches!(bridge.setup(), Err(BridgeError::Verification(_))));
    assert!(registry.contains(SERVER) && registry.contains(CLIENT));
    assert!(!bridge.is_setup());

    bridge.setup().unwrap();
    assert_eq!(registry.creations(), 2);
    assert_eq!(registry.resolve(SERVER).unwrap().permissions.system_dirs.len(), 2);
    assert_eq!(registry.resolve(CLIENT).unwrap().permissions.system_dirs.len(), 1);

    let mut status = ServiceStatus::new();
    bridge.start(&mut status).unwrap();
    assert_eq!(status.len(), 2);
    assert_eq!(runtime.launches().len(), 2);
}

#[test]
fn test_inspection_failure_never_launches_client() {
    let root = tempfile::tempdir().unwrap();
    let runtime = Arc::new(FakeRuntime::new().with_failing_inspect());
    let ctx = BridgeContext::new(config(root.path()), Arc::new(owner_registry()), runtime.clone());
    let bridge = bridge_for("browser", &ctx).unwrap();
    bridge.setup().unwrap();

    let mut status = ServiceStatus::new();
    let result = bridge.start(&mut status);
    assert!(matches!(result, Err(BridgeError::ServerInspection { .. })));

    let launches = runtime.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].sandbox, SERVER);
    assert_eq!(status.handle(HelperRole::Server), Some(launches[0].id.as_str()));
    assert!(status.handle(HelperRole::Client).is_none());

    bridge.stop(&mut status).unwrap();
    assert_eq!(runtime.stops(), vec![launches[0].id.clone()]);
}

#[test]
fn test_stop_without_handles_still_cleans_up() {
    let root = tempfile::tempdir().unwrap();
    let runtime = Arc::new(FakeRuntime::new());
    let ctx = BridgeContext::new(config(root.path()), Arc::new(owner_registry()), runtime.clone());
    let bridge = bridge_for("browser", &ctx).unwrap();
    bridge.setup().unwrap();

    let home = root.path().join("volumes/xpra/browser/xpra-home");
    std::fs::create_dir_all(&home).unwrap();
    bridge.stop(&mut ServiceStatus::new()).unwrap();

    assert!(runtime.stops().is_empty());
    assert!(!home.exists());
}

#[test]
fn test_failed_stops_are_tolerated() {
    let root = tempfile::tempdir().unwrap();
    let runtime = Arc::new(FakeRuntime::new().with_failing_stop());
    let ctx = BridgeContext::new(config(root.path()), Arc::new(owner_registry()), runtime.clone());
    let bridge = bridge_for("browser", &ctx).unwrap();
    bridge.setup().unwrap();

    let mut status = ServiceStatus::new();
    bridge.start(&mut status).unwrap();
    bridge.stop(&mut status).unwrap();

    assert_eq!(runtime.stops().len(), 2);
    assert!(status.is_empty());
}

#[test]
fn test_setup_persists_across_registry_reopen() {
    let root = tempfile::tempdir().unwrap();
    let config = config(root.path());
    {
        let registry = JsonRegistry::open(&config.registry_path).unwrap();
        registry.insert(SandboxRecord::new("browser")).unwrap();
        let ctx = BridgeContext::new(config.clone(), Arc::new(registry), Arc::new(FakeRuntime::new()));
        bridge_for("browser", &ctx).unwrap().setup().unwrap();
    }

    let reopened = Arc::new(JsonRegistry::open(&config.registry_path).unwrap());
    let ctx = BridgeContext::new(config, reopened.clone(), Arc::new(FakeRuntime::new()));
    let bridge = bridge_for("browser", &ctx).unwrap();

    assert!(bridge.is_setup());
    assert_eq!(bridge.state(), BridgeState::Configured);
    assert!(!reopened.resolve(SERVER).unwrap().permissions.system_dirs.is_empty());
    reopened.verify_all().unwrap();
}

#[test]
fn test_status_record_round_trips_through_disk() {
    let root = tempfile::tempdir().unwrap();
    let ctx = BridgeContext::new(config(root.path()), Arc::new(owner_registry()), Arc::new(FakeRuntime::new()));
    let bridge = bridge_for("browser", &ctx).unwrap();
    bridge.setup().unwrap();

    let path = root.path().join("status.json");
    let mut status = ServiceStatus::new();
    bridge.start(&mut status).unwrap();
    status.save(&path).unwrap();

    let mut loaded = ServiceStatus::load(&path).unwrap();
    assert_eq!(loaded, status);
    bridge.stop(&mut loaded).unwrap();
    ServiceStatus::discard(&path);
    assert!(ServiceStatus::load(&path).unwrap().is_empty());
}
