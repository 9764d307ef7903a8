//! Frame similarity gate integration tests

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use avatar_gateway::gate::{
    self, FrameSample, FrameSource, GateWatcher, ReferenceImage, SnapshotFileSource,
    StaticFrameSource,
};
use avatar_gateway::{Error, Result};
use image::{Rgba, RgbaImage};
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

const RED: Rgba<u8> = Rgba([200, 30, 30, 255]);
const BLUE: Rgba<u8> = Rgba([20, 40, 210, 255]);
const GREEN: Rgba<u8> = Rgba([20, 200, 40, 255]);

fn solid(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_pixel(width, height, color)
}

fn save(dir: &Path, name: &str, image: &RgbaImage) -> PathBuf {
    let path = dir.join(name);
    image.save(&path).unwrap();
    path
}

fn reference(name: &str, image: RgbaImage) -> ReferenceImage {
    ReferenceImage {
        path: PathBuf::from(name),
        image,
    }
}

#[test]
fn test_references_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let red = save(dir.path(), "red.png", &solid(40, 30, RED));
    let blue = save(dir.path(), "blue.png", &solid(40, 30, BLUE));

    let loaded = assert_ok!(gate::load_references(&[red, blue]));
    assert_eq!(loaded.len(), 2);

    let frame = solid(40, 30, BLUE);
    assert!(gate::evaluate(&frame, loaded.iter().map(|r| &r.image)));
    assert!(!gate::evaluate(&solid(40, 30, GREEN), loaded.iter().map(|r| &r.image)));
}

#[test]
fn test_unreadable_references_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let red = save(dir.path(), "red.png", &solid(16, 16, RED));
    let missing = dir.path().join("nobody.png");

    let loaded = assert_ok!(gate::load_references(&[missing.clone(), red]));
    assert_eq!(loaded.len(), 1);

    assert_err!(gate::load_references(&[missing]));
}

#[test]
fn test_decision_reports_scores_up_to_match() {
    let references = [solid(32, 32, RED), solid(32, 32, BLUE), solid(32, 32, GREEN)];

    let decision = gate::decide(&solid(32, 32, BLUE), references.iter());
    assert_eq!(decision.matched, Some(1));
    assert!(decision.is_match());
    assert_eq!(decision.scores.len(), 2);
    assert!(decision.scores[0] <= gate::MATCH_THRESHOLD);
    assert!(decision.scores[1] > gate::MATCH_THRESHOLD);
}

#[test]
fn test_reference_is_resized_to_frame() {
    let references = [solid(320, 240, BLUE)];

    let decision = gate::decide(&solid(64, 48, BLUE), references.iter());
    assert_eq!(decision.matched, Some(0));
}

#[tokio::test]
async fn test_watcher_opens_on_matching_frame() {
    let source = StaticFrameSource::new(solid(24, 24, BLUE));
    let watcher = GateWatcher::new(
        source,
        vec![reference("red", solid(24, 24, RED)), reference("blue", solid(24, 24, BLUE))],
    );

    let opened = tokio::time::timeout(Duration::from_secs(5), watcher.run(CancellationToken::new()))
        .await
        .unwrap()
        .expect("gate should open");
    assert_eq!(opened.reference, 1);
    assert!(opened.score > gate::MATCH_THRESHOLD);
}

#[tokio::test]
async fn test_poll_once_without_match() {
    let mut watcher = GateWatcher::new(
        StaticFrameSource::new(solid(24, 24, GREEN)),
        vec![reference("red", solid(24, 24, RED))],
    );

    assert!(watcher.poll_once().await.is_none());
    assert!(watcher.poll_once().await.is_none());
}

/// Records release, fails a set number of captures before yielding frames
struct ScriptedSource {
    frame: RgbaImage,
    failures_left: usize,
    released: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn capture(&mut self) -> Result<FrameSample> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(Error::Camera("device busy".to_string()));
        }
        Ok(FrameSample::now(self.frame.clone()))
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[tokio::test]
async fn test_cancel_releases_source() {
    let released = Arc::new(AtomicBool::new(false));
    let source = ScriptedSource {
        frame: solid(24, 24, GREEN),
        failures_left: 0,
        released: Arc::clone(&released),
    };
    let watcher = GateWatcher::new(source, vec![reference("red", solid(24, 24, RED))]);

    let cancel = CancellationToken::new();
    let task = tokio::spawn(watcher.run(cancel.clone()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let opened = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(opened.is_none());
    assert!(released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_watcher_recovers_from_capture_failures() {
    let released = Arc::new(AtomicBool::new(false));
    let source = ScriptedSource {
        frame: solid(24, 24, RED),
        failures_left: 2,
        released: Arc::clone(&released),
    };
    let watcher = GateWatcher::new(source, vec![reference("red", solid(24, 24, RED))]);

    let opened = tokio::time::timeout(Duration::from_secs(10), watcher.run(CancellationToken::new()))
        .await
        .unwrap()
        .expect("gate should open after the camera recovers");
    assert_eq!(opened.reference, 0);
    assert!(released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_spawned_watcher_delivers_match() {
    let watcher = GateWatcher::new(
        StaticFrameSource::new(solid(24, 24, RED)),
        vec![reference("red", solid(24, 24, RED))],
    );

    let opened = tokio::time::timeout(
        Duration::from_secs(5),
        watcher.spawn(CancellationToken::new()),
    )
    .await
    .unwrap();
    assert_eq!(assert_ok!(opened).reference, 0);
}

#[tokio::test]
async fn test_spawned_watcher_cancelled_without_match() {
    let watcher = GateWatcher::new(
        StaticFrameSource::new(solid(24, 24, GREEN)),
        vec![reference("red", solid(24, 24, RED))],
    );

    let cancel = CancellationToken::new();
    let rx = watcher.spawn(cancel.clone());
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), rx).await.unwrap();
    assert_err!(result);
}

#[tokio::test]
async fn test_snapshot_file_drives_gate() {
    let dir = tempfile::tempdir().unwrap();
    let reference_path = save(dir.path(), "me.png", &solid(48, 36, BLUE));
    let frame_path = save(dir.path(), "latest.png", &solid(48, 36, BLUE));

    let references = assert_ok!(gate::load_references(&[reference_path]));
    let source = assert_ok!(SnapshotFileSource::acquire(&frame_path));
    assert_eq!(source.path(), frame_path.as_path());

    let opened = tokio::time::timeout(
        Duration::from_secs(5),
        GateWatcher::new(source, references).run(CancellationToken::new()),
    )
    .await
    .unwrap();
    assert_eq!(opened.map(|o| o.reference), Some(0));
}

#[test]
fn test_missing_snapshot_is_camera_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = SnapshotFileSource::acquire(dir.path().join("latest.jpeg"));
    assert!(matches!(result, Err(Error::Camera(_))));
}
