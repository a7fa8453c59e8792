use ms::digging::{BreakHandler, DigKind, DiggingHost};
use ms::resourcepack::{PackDelivery, PackInfo, PackStatus};
use ms::util::{BlockPos, PlayerId};
use ms::{AppContext, LoadStatus, ServerConfig};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
struct RecordingDelivery {
    sent: Mutex<Vec<(PlayerId, Vec<PackInfo>)>>,
}

impl PackDelivery for RecordingDelivery {
    fn send_packs(&self, player: PlayerId, packs: &[PackInfo]) {
        self.sent.lock().push((player, packs.to_vec()));
    }
}

fn write_packs(dir: &Path) -> std::path::PathBuf {
    let artifact = dir.join("local.zip");
    std::fs::write(&artifact, b"abc").unwrap();

    let url = format!("file://{}", artifact.display());
    let config = format!(
        r#"
[resource-packs.local]
enabled = true
auto-update = true
name = "Local"
file-name = "local.zip"

[resource-packs.local.data]
url = "{url}"
required = true

[resource-packs.vanilla]
enabled = false
name = "Vanilla"

[resource-packs.broken]
enabled = true
name = "Broken"
file-name = "broken.zip"
"#
    );

    let path = dir.join("resource-packs.toml");
    std::fs::write(&path, config).unwrap();
    path
}

fn context(dir: &Path, delivery: Arc<RecordingDelivery>) -> AppContext {
    let mut config = ServerConfig::default();
    config.resource_packs.config_path = write_packs(dir);

    AppContext::new(config, delivery).unwrap()
}

#[tokio::test]
async fn test_load_and_apply_packs() {
    let dir = tempfile::tempdir().unwrap();
    let delivery = Arc::new(RecordingDelivery::default());
    let context = context(dir.path(), delivery.clone());
    assert_eq!(context.load_status(), LoadStatus::NotLoaded);

    let summary = context.load_resource_packs().await.unwrap();
    assert_eq!(summary.loaded, vec!["local".to_string(), "vanilla".to_string()]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "broken");
    assert!(summary.failed[0].1.is_fatal());
    assert_eq!(context.load_status(), LoadStatus::Loaded { loaded: 2, failed: 1 });

    // The failed pack is still registered, disabled
    assert!(context.resource_pack("broken").unwrap().is_disabled());
    let local = context.resource_pack("local").unwrap();
    assert_eq!(local.data().hash(), Some("a9993e364706816aba3e25717850c26c9cd0d89d"));
    assert_eq!(context.enabled_packs(), vec![local.clone()]);

    let player = PlayerId::new(Uuid::new_v4());
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let done = {
        let statuses = Arc::clone(&statuses);
        context.apply_packs(player, move |pack, status| {
            statuses.lock().push((pack.name().to_owned(), status));
        })
    };
    let done = tokio::spawn(done);

    assert_eq!(delivery.sent.lock().len(), 1);
    assert!(context.applier().is_applying(player));

    let id = local.data().unique_id();
    assert!(!context.applier().complete_by_id(player, id, PackStatus::Accepted));
    assert!(context.applier().complete_by_id(player, id, PackStatus::SuccessfullyLoaded));

    assert!(done.await.unwrap().is_empty());
    assert_eq!(
        *statuses.lock(),
        vec![("Local".to_string(), PackStatus::SuccessfullyLoaded)]
    );
}

#[tokio::test]
async fn test_missing_pack_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::default();
    config.resource_packs.config_path = dir.path().join("missing.toml");

    let context = AppContext::new(config, Arc::new(RecordingDelivery::default())).unwrap();
    assert!(context.load_resource_packs().await.is_err());
    assert!(matches!(context.load_status(), LoadStatus::Failed(_)));
}

#[tokio::test]
async fn test_player_quit_forgets_pending() {
    let dir = tempfile::tempdir().unwrap();
    let context = context(dir.path(), Arc::new(RecordingDelivery::default()));
    context.load_resource_packs().await.unwrap();

    let player = PlayerId::new(Uuid::new_v4());
    let local = context.resource_pack("local").unwrap();
    let handle = context.applier().apply(player, &local).unwrap();

    context.on_player_quit(player);
    assert!(!context.applier().is_applying(player));
    assert!(handle.wait().await.is_err());
}

#[derive(Default)]
struct World {
    targets: Mutex<Option<BlockPos>>,
    destroyed: Mutex<Vec<BlockPos>>,
    stages: Mutex<Vec<i32>>,
}

impl DiggingHost for World {
    fn target_block(&self, _player: PlayerId) -> Option<BlockPos> {
        *self.targets.lock()
    }

    fn broadcast_stage(&self, _block: BlockPos, stage: i32) {
        self.stages.lock().push(stage);
    }

    fn play_hit_sound(&self, _block: BlockPos) {}

    fn destroy_block(&self, block: BlockPos, _player: PlayerId) {
        self.destroyed.lock().push(block);
    }
}

#[tokio::test(start_paused = true)]
async fn test_digging_runs_on_scheduler() {
    let dir = tempfile::tempdir().unwrap();
    let context = context(dir.path(), Arc::new(RecordingDelivery::default()));

    let world = Arc::new(World::default());
    let block = BlockPos::new(Uuid::new_v4(), 10, 64, -3);
    *world.targets.lock() = Some(block);

    let player = PlayerId::new(Uuid::new_v4());
    let handler = BreakHandler::new(Arc::clone(context.digging()), Arc::clone(&world), player, block);
    handler.start(DigKind::Breakable { dig_speed: 0.25 }, context.scheduler().as_ref());
    assert!(context.digging().contains_player(player));

    // Five ticks break the block at 0.25 progress per tick
    tokio::time::sleep(Duration::from_millis(50 * 5 + 10)).await;

    assert_eq!(*world.destroyed.lock(), vec![block]);
    assert!(!context.digging().contains_block(&block));
    assert_eq!(world.stages.lock().last(), Some(&-1));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(context.scheduler().active_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let context = context(dir.path(), Arc::new(RecordingDelivery::default()));

    let world = Arc::new(World::default());
    let block = BlockPos::new(Uuid::new_v4(), 0, 70, 0);
    *world.targets.lock() = Some(block);

    let player = PlayerId::new(Uuid::new_v4());
    let handler = BreakHandler::new(Arc::clone(context.digging()), Arc::clone(&world), player, block);
    handler.start(DigKind::Breakable { dig_speed: 0.01 }, context.scheduler().as_ref());

    tokio::time::sleep(Duration::from_millis(120)).await;
    context.shutdown();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(context.digging().is_empty());
    assert_eq!(context.scheduler().active_timers(), 0);
    assert!(world.destroyed.lock().is_empty());
}
