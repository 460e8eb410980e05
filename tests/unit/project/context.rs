use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::{
    assets::asset::{AssetStatus, StreamInfo, VideoStreamInfo},
    foundation::core::ClockTime,
};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Counting {
    calls: AtomicUsize,
}

impl MediaInfoProvider for Counting {
    fn discover(&self, uri: &str) -> EditResult<StreamInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if uri.contains("missing") {
            return Err(EditError::resolution(format!("could not open media '{uri}'")));
        }
        Ok(StreamInfo {
            duration: ClockTime::from_secs(3),
            video: Some(VideoStreamInfo {
                width: 320,
                height: 240,
                fps_num: 25,
                fps_den: 1,
            }),
            audio: None,
        })
    }
}

fn context() -> (Context, Arc<Counting>) {
    let media = Arc::new(Counting::default());
    let config = ContextConfig {
        worker_threads: Some(2),
        ..ContextConfig::default()
    };
    (Context::with_config(media.clone(), config).unwrap(), media)
}

#[test]
fn repeated_requests_share_one_resolution() {
    let (ctx, media) = context();
    let a = ctx.request_asset("file:///a.webm", AssetKind::UriClip).unwrap();
    let b = ctx.request_asset("file:///a.webm", AssetKind::UriClip).unwrap();
    assert!(a.same_instance(&b));
    assert_eq!(ctx.in_flight(), 1);

    assert!(ctx.run_until(|| a.status() == AssetStatus::Loaded, WAIT));
    assert_eq!(ctx.in_flight(), 0);
    assert_eq!(media.calls.load(Ordering::SeqCst), 1);

    let again = ctx.request_asset("file:///a.webm", AssetKind::UriClip).unwrap();
    assert!(again.same_instance(&a));
    assert_eq!(ctx.in_flight(), 0);
}

#[test]
fn asset_events_report_retry_then_failure() {
    let (ctx, media) = context();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    ctx.subscribe_assets(move |e| sink.borrow_mut().push(e.status));

    let asset = ctx
        .request_asset("file:///missing.webm", AssetKind::UriClip)
        .unwrap();
    assert!(ctx.run_until(|| asset.status() == AssetStatus::Error, WAIT));
    assert_eq!(
        *seen.borrow(),
        vec![AssetStatus::Started, AssetStatus::Started, AssetStatus::Error]
    );
    assert_eq!(media.calls.load(Ordering::SeqCst), 2);

    ctx.request_asset("file:///missing.webm", AssetKind::UriClip)
        .unwrap();
    assert_eq!(ctx.in_flight(), 0);
    assert_eq!(seen.borrow().len(), 3);
}

#[test]
fn projects_are_cached_by_location() {
    let (ctx, _) = context();
    let a = ctx.project("/tmp/cut.json");
    let b = ctx.project("/tmp/cut.json");
    assert!(a.same_instance(&b));

    let dir = std::env::temp_dir().join(format!("cutlist-context-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::create_dir_all(dir.join("sub")).unwrap();
    std::fs::write(dir.join("cut.json"), b"{}").unwrap();
    let plain = ctx.project(dir.join("cut.json"));
    let dotted = ctx.project(dir.join(".").join("cut.json"));
    assert!(plain.same_instance(&dotted));
    let unsaved = ctx.project(dir.join("new.json"));
    assert!(unsaved.same_instance(&ctx.project(dir.join("sub").join("..").join("new.json"))));
    let _ = std::fs::remove_dir_all(&dir);

    let first = ctx.new_project();
    let second = ctx.new_project();
    assert_eq!(first.id(), "project-0");
    assert_eq!(second.id(), "project-1");
}

#[test]
fn projects_cannot_be_requested_as_assets() {
    let (ctx, _) = context();
    assert!(matches!(
        ctx.request_asset("cut.json", AssetKind::Project),
        Err(EditError::Resolution(_))
    ));
    assert!(ctx.asset("cut.json", AssetKind::Project).is_none());
}

#[test]
fn run_until_gives_up_after_the_timeout() {
    let (ctx, _) = context();
    assert!(!ctx.run_until(|| false, Duration::from_millis(20)));
    assert!(!ctx.iterate(Duration::from_millis(1)));
}

#[test]
fn unheld_assets_can_be_purged() {
    let (ctx, _) = context();
    let asset = ctx.request_asset("agingtv", AssetKind::Effect).unwrap();
    assert!(ctx.run_until(|| asset.status() == AssetStatus::Loaded, WAIT));
    assert_eq!(ctx.cached_assets(), 1);
    assert_eq!(ctx.purge_unheld(), 1);
    assert!(ctx.asset("agingtv", AssetKind::Effect).is_none());
}
