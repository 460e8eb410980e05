use std::{cell::Cell, sync::Arc, time::Duration};

use super::*;
use crate::assets::media::StaticMediaInfo;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Recorder {
    events: RefCell<Vec<ProjectEvent>>,
    replacement: RefCell<Option<String>>,
    asked: Cell<usize>,
}

impl Recorder {
    fn count(&self, pred: impl Fn(&ProjectEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| pred(e)).count()
    }
}

impl ProjectObserver for Recorder {
    fn on_event(&self, _project: &Project, event: &ProjectEvent) {
        self.events.borrow_mut().push(event.clone());
    }

    fn missing_reference(
        &self,
        _project: &Project,
        _error: &EditError,
        _asset: &Asset,
    ) -> Option<String> {
        self.asked.set(self.asked.get() + 1);
        self.replacement.borrow().clone()
    }
}

fn context() -> Context {
    Context::new(Arc::new(StaticMediaInfo::new())).unwrap()
}

fn observed(ctx: &Context) -> (Project, Rc<Recorder>) {
    let project = ctx.new_project();
    let recorder = Rc::new(Recorder::default());
    project.add_observer(recorder.clone());
    (project, recorder)
}

#[test]
fn new_project_loads_once_with_audio_and_video_tracks() {
    let ctx = context();
    let (project, rec) = observed(&ctx);
    let timeline = project.extract().unwrap();
    assert_eq!(project.state(), ProjectState::Loading);
    assert!(ctx.run_until(|| project.state() == ProjectState::Loaded, WAIT));
    assert!(timeline.is_complete());
    assert_eq!(timeline.tracks().len(), 2);

    assert!(project.extract().unwrap().same_instance(&timeline));
    ctx.iterate(Duration::from_millis(10));
    assert_eq!(rec.count(|e| matches!(e, ProjectEvent::Loaded(_))), 1);
}

#[test]
fn membership_notifies_once_per_change() {
    let ctx = context();
    let (project, rec) = observed(&ctx);
    assert!(project.create_asset("smpte", AssetKind::TestClip).unwrap());
    assert!(ctx.run_until(|| !project.list_assets(None).is_empty(), WAIT));
    let asset = project.get_asset("smpte", AssetKind::TestClip).unwrap();
    assert_eq!(ctx.asset_holders(&asset), 1);

    assert!(!project.create_asset("smpte", AssetKind::TestClip).unwrap());
    assert!(matches!(
        project.add_asset(&asset),
        Err(EditError::Duplicate(_))
    ));
    project.remove_asset(&asset).unwrap();
    assert!(matches!(
        project.remove_asset(&asset),
        Err(EditError::Consistency(_))
    ));
    assert!(project.list_assets(None).is_empty());
    assert!(ctx.asset("smpte", AssetKind::TestClip).is_none());

    assert_eq!(rec.count(|e| matches!(e, ProjectEvent::AssetAdded(_))), 1);
    assert_eq!(rec.count(|e| matches!(e, ProjectEvent::AssetRemoved(_))), 1);
}

#[test]
fn unknown_effect_is_reported_and_not_retried() {
    let ctx = context();
    let (project, rec) = observed(&ctx);
    assert!(
        project
            .create_asset("nowaythiselementexists", AssetKind::Effect)
            .unwrap()
    );
    assert!(ctx.run_until(|| !rec.events.borrow().is_empty(), WAIT));

    let events = rec.events.borrow().clone();
    assert_eq!(events.len(), 1);
    let ProjectEvent::ErrorLoadingAsset { error, id, kind } = &events[0] else {
        panic!("unexpected {:?}", events[0]);
    };
    assert!(matches!(**error, EditError::Resolution(_)));
    assert_eq!(id, "nowaythiselementexists");
    assert_eq!(*kind, AssetKind::Effect);

    assert!(
        !project
            .create_asset("nowaythiselementexists", AssetKind::Effect)
            .unwrap()
    );
    assert_eq!(ctx.in_flight(), 0);
    assert!(project.list_assets(None).is_empty());
}

#[test]
fn missing_reference_is_asked_once_and_replacement_loads() {
    let media = StaticMediaInfo::new().with(
        "file:///moved/a.ogv",
        crate::assets::asset::StreamInfo {
            duration: crate::foundation::core::ClockTime::from_secs(4),
            video: None,
            audio: None,
        },
    );
    let ctx = Context::new(Arc::new(media)).unwrap();
    let (project, rec) = observed(&ctx);
    *rec.replacement.borrow_mut() = Some("file:///moved/a.ogv".to_string());

    project
        .create_asset("file:///gone/a.ogv", AssetKind::UriClip)
        .unwrap();
    assert_eq!(project.loading_assets().len(), 1);
    assert!(ctx.run_until(|| !project.list_assets(None).is_empty(), WAIT));

    assert_eq!(rec.asked.get(), 1);
    let asset = &project.list_assets(None)[0];
    assert_eq!(asset.id(), "file:///gone/a.ogv");
    assert_eq!(asset.target_id(), "file:///moved/a.ogv");
    assert_eq!(asset.status(), AssetStatus::Loaded);
    assert!(project.loading_assets().is_empty());
}

#[test]
fn repeated_replacement_ends_the_round_trips() {
    let ctx = context();
    let (project, rec) = observed(&ctx);
    *rec.replacement.borrow_mut() = Some("file:///also/gone.ogv".to_string());

    project
        .create_asset("file:///gone.ogv", AssetKind::UriClip)
        .unwrap();
    assert!(ctx.run_until(
        || rec.count(|e| matches!(e, ProjectEvent::ErrorLoadingAsset { .. })) == 1,
        WAIT
    ));
    assert_eq!(rec.asked.get(), 2);
    let asset = ctx.asset("file:///gone.ogv", AssetKind::UriClip).unwrap();
    assert_eq!(asset.status(), AssetStatus::Error);
}

#[test]
fn encoding_profiles_are_unique_by_name() {
    let ctx = context();
    let project = ctx.new_project();
    let mut profile = EncodingProfile::container("web", "video/webm");
    profile
        .add_profile(EncodingProfile::video("video/x-vp8"))
        .unwrap();
    project.add_encoding_profile(profile.clone()).unwrap();
    assert!(matches!(
        project.add_encoding_profile(profile),
        Err(EditError::Duplicate(_))
    ));
    assert_eq!(project.encoding_profiles().len(), 1);

    project
        .set_proxy_profile(Some(EncodingProfile::default_proxy()))
        .unwrap();
    assert!(project.proxy_profile().is_some());
}

#[test]
fn proxy_control_needs_a_running_batch() {
    let ctx = context();
    let project = ctx.new_project();
    assert!(matches!(
        project.pause_proxy_creation(),
        Err(EditError::Consistency(_))
    ));
    assert!(matches!(
        project.start_proxy_creation(&[], CancellationToken::new()),
        Err(EditError::Resolution(_))
    ));
}
