use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    rc::{Rc, Weak},
    time::Instant,
};

use crate::{
    assets::{
        asset::{Asset, AssetKey, AssetKind, AssetStatus},
        proxy::{CancellationToken, ProxyBatch, ProxyItem, spawn_batch},
    },
    encoding::profile::EncodingProfile,
    foundation::{
        error::{EditError, EditResult},
        meta::{MetaContainer, MetaValue},
    },
    project::{
        context::{Context, ContextInner},
        events::{ProjectEvent, ProjectObserver},
    },
    serialize::{
        document::{AssetDoc, ClipDoc, ProjectDoc, TimelineDoc, restore_clip_state},
        formatter::{formatter_for, load_document, save_document},
    },
    timeline::{
        element::{LayerId, TrackId},
        timeline::Timeline,
    },
};

/// Loading state of a [`Project`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectState {
    /// Not extracted yet.
    New,
    /// Waiting for assets (see [`Project::loading_assets`]).
    Loading,
    /// Every mandatory asset resolved; `Loaded` was emitted.
    Loaded,
    /// The document or a mandatory asset could not be loaded.
    Error,
}

/// Saved clips waiting for their asset.
#[derive(Debug)]
struct Restore {
    doc: TimelineDoc,
    tracks: Vec<TrackId>,
    layers: BTreeMap<u32, LayerId>,
    pending: Vec<(AssetKey, u32, ClipDoc)>,
    /// Source key → proxy id recorded at save time.
    proxies: HashMap<AssetKey, String>,
}

#[derive(Debug)]
struct ProxyRun {
    batch: ProxyBatch,
    created: usize,
    failed: usize,
    deadline: Option<Instant>,
}

#[derive(Debug)]
struct ProjectData {
    state: ProjectState,
    timeline: Option<Timeline>,
    members: Vec<Asset>,
    loading: Vec<AssetKey>,
    metadata: MetaContainer,
    encoding_profiles: Vec<EncodingProfile>,
    proxy_profile: Option<EncodingProfile>,
    restore: Option<Restore>,
    proxy: Option<ProxyRun>,
}

struct ProjectInner {
    id: String,
    location: Option<PathBuf>,
    ctx: Weak<ContextInner>,
    data: RefCell<ProjectData>,
    observers: RefCell<Vec<Rc<dyn ProjectObserver>>>,
}

/// Shared handle to a project: asset membership, profiles, metadata and the
/// timeline it extracts to.
///
/// Obtained from [`Context::new_project`] or [`Context::project`].
#[derive(Clone)]
pub struct Project {
    inner: Rc<ProjectInner>,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("id", &self.inner.id)
            .field("state", &self.inner.data.borrow().state)
            .finish_non_exhaustive()
    }
}

impl Project {
    pub(crate) fn new(id: String, location: Option<PathBuf>, ctx: Weak<ContextInner>) -> Self {
        Self {
            inner: Rc::new(ProjectInner {
                id,
                location,
                ctx,
                data: RefCell::new(ProjectData {
                    state: ProjectState::New,
                    timeline: None,
                    members: Vec::new(),
                    loading: Vec::new(),
                    metadata: MetaContainer::new(),
                    encoding_profiles: Vec::new(),
                    proxy_profile: None,
                    restore: None,
                    proxy: None,
                }),
                observers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Location, or a generated `project-N`.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn location(&self) -> Option<&Path> {
        self.inner.location.as_deref()
    }

    pub fn state(&self) -> ProjectState {
        self.inner.data.borrow().state
    }

    pub fn same_instance(&self, other: &Project) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn add_observer(&self, observer: Rc<dyn ProjectObserver>) {
        self.inner.observers.borrow_mut().push(observer);
    }

    fn context(&self) -> EditResult<Context> {
        Context::from_weak(&self.inner.ctx)
    }

    fn emit(&self, event: ProjectEvent) {
        let observers = self.inner.observers.borrow().clone();
        for observer in observers {
            observer.on_event(self, &event);
        }
    }

    // ---- extraction / loading ----

    /// The project's timeline, created on the first call.
    ///
    /// Without a location this is an empty audio + video timeline. With one,
    /// the saved document is parsed, its layout rebuilt and its assets
    /// requested; the timeline stays incomplete until `Loaded` fires. A
    /// document that cannot be read moves the project to
    /// [`ProjectState::Error`] and still returns the (incomplete) timeline.
    pub fn extract(&self) -> EditResult<Timeline> {
        if let Some(timeline) = self.inner.data.borrow().timeline.clone() {
            return Ok(timeline);
        }
        let ctx = self.context()?;
        let Some(location) = self.inner.location.clone() else {
            let timeline = Timeline::new_audio_video();
            self.begin_loading(&timeline);
            ctx.post_check_loaded(self.id());
            return Ok(timeline);
        };

        let timeline = Timeline::new();
        timeline.set_complete(false);
        self.begin_loading(&timeline);
        if let Err(err) = self.load_from(&ctx, &location, &timeline) {
            tracing::warn!(project = self.id(), error = %err, "project failed to load");
            self.fail_loading(Rc::new(err), &self.inner.id, AssetKind::Project);
            return Ok(timeline);
        }
        ctx.post_check_loaded(self.id());
        Ok(timeline)
    }

    fn begin_loading(&self, timeline: &Timeline) {
        let mut data = self.inner.data.borrow_mut();
        data.timeline = Some(timeline.clone());
        data.state = ProjectState::Loading;
    }

    #[tracing::instrument(
        level = "debug",
        skip(self, ctx, timeline),
        fields(project = %self.inner.id)
    )]
    fn load_from(&self, ctx: &Context, location: &Path, timeline: &Timeline) -> EditResult<()> {
        let doc = load_document(location)?;
        let (tracks, layers) = doc.timeline.apply_skeleton(timeline)?;

        let mut keys: Vec<AssetKey> = Vec::new();
        let mut push_key = |key: AssetKey| {
            if !keys.contains(&key) {
                keys.push(key);
            }
        };
        let mut proxies = HashMap::new();
        for asset in &doc.assets {
            let key = AssetKey::new(asset.id.as_str(), asset.kind);
            if let Some(proxy) = &asset.proxy {
                proxies.insert(key.clone(), proxy.clone());
            }
            push_key(key);
        }
        let mut pending = Vec::new();
        for layer in &doc.timeline.layers {
            for clip in &layer.clips {
                let key = AssetKey::new(clip.asset.as_str(), clip.kind);
                push_key(key.clone());
                pending.push((key, layer.priority, clip.clone()));
            }
        }
        tracing::debug!(assets = keys.len(), clips = pending.len(), "document parsed");

        {
            let mut data = self.inner.data.borrow_mut();
            data.metadata = doc.metadata;
            data.encoding_profiles = doc.encoding_profiles;
            data.proxy_profile = doc.proxy_profile;
            data.restore = Some(Restore {
                doc: doc.timeline,
                tracks,
                layers,
                pending,
                proxies,
            });
        }

        for key in keys {
            self.track_asset(ctx, key)?;
        }
        Ok(())
    }

    /// Request `key` and route its outcome to this project.
    fn track_asset(&self, ctx: &Context, key: AssetKey) -> EditResult<()> {
        let asset = ctx.request_asset(&key.id, key.kind)?;
        match asset.status() {
            AssetStatus::Loaded => self.asset_loaded(&asset),
            AssetStatus::Error => {
                let message = asset.error_message().unwrap_or_default();
                self.asset_failed(&asset, Rc::new(EditError::resolution(message)));
            }
            AssetStatus::Init | AssetStatus::Started => {
                ctx.wait_for(&key, self.id());
                let mut data = self.inner.data.borrow_mut();
                if !data.loading.contains(&key) {
                    data.loading.push(key);
                }
            }
        }
        Ok(())
    }

    /// Assets this project is still waiting for.
    pub fn loading_assets(&self) -> Vec<Asset> {
        let Ok(ctx) = self.context() else {
            return Vec::new();
        };
        let keys = self.inner.data.borrow().loading.clone();
        keys.iter()
            .filter_map(|k| ctx.asset(&k.id, k.kind))
            .collect()
    }

    pub(crate) fn missing_reference(&self, error: &EditError, asset: &Asset) -> Option<String> {
        let observers = self.inner.observers.borrow().clone();
        observers
            .iter()
            .find_map(|o| o.missing_reference(self, error, asset))
    }

    pub(crate) fn asset_loaded(&self, asset: &Asset) {
        let ready = {
            let mut data = self.inner.data.borrow_mut();
            data.loading.retain(|k| k != asset.key());
            match data.restore.as_mut() {
                Some(restore) => {
                    if let Some(proxy) = restore.proxies.remove(asset.key()) {
                        asset.set_proxy_target(Some(proxy));
                    }
                    let (ready, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut restore.pending)
                        .into_iter()
                        .partition(|(key, _, _)| key == asset.key());
                    restore.pending = rest;
                    ready
                }
                None => Vec::new(),
            }
        };
        if !self.is_member(asset.key()) {
            self.add_member(asset);
        }
        for (_, layer, clip) in ready {
            if let Err(err) = self.restore_clip(asset, layer, &clip) {
                tracing::warn!(clip = clip.id, error = %err, "clip not restored");
                self.fail_loading(Rc::new(err), asset.id(), asset.kind());
            }
        }
    }

    fn restore_clip(&self, asset: &Asset, layer: u32, clip: &ClipDoc) -> EditResult<()> {
        let data = self.inner.data.borrow();
        let (Some(timeline), Some(restore)) = (data.timeline.as_ref(), data.restore.as_ref())
        else {
            return Ok(());
        };
        let layer = *restore
            .layers
            .get(&layer)
            .ok_or_else(|| EditError::consistency(format!("no layer at priority {layer}")))?;
        let id = timeline.add_clip(layer, clip.builder(asset)?)?;
        restore_clip_state(
            timeline,
            id,
            clip,
            &restore.doc.elements_of(clip.id),
            &restore.tracks,
        )
    }

    pub(crate) fn asset_failed(&self, asset: &Asset, error: Rc<EditError>) {
        {
            let mut data = self.inner.data.borrow_mut();
            data.loading.retain(|k| k != asset.key());
            if let Some(restore) = data.restore.as_mut() {
                restore.pending.retain(|(key, _, _)| key != asset.key());
            }
        }
        self.fail_loading(error, asset.id(), asset.kind());
    }

    /// A failure while loading is final for the project; afterwards it is only
    /// reported.
    fn fail_loading(&self, error: Rc<EditError>, id: &str, kind: AssetKind) {
        {
            let mut data = self.inner.data.borrow_mut();
            if data.state == ProjectState::Loading {
                data.state = ProjectState::Error;
            }
        }
        self.emit(ProjectEvent::ErrorLoadingAsset {
            error,
            id: id.to_string(),
            kind,
        });
    }

    /// Fire `Loaded` once nothing is pending.
    pub(crate) fn check_loaded(&self) {
        let timeline = {
            let mut data = self.inner.data.borrow_mut();
            if data.state != ProjectState::Loading || !data.loading.is_empty() {
                return;
            }
            data.state = ProjectState::Loaded;
            data.restore = None;
            data.timeline.clone()
        };
        let Some(timeline) = timeline else {
            return;
        };
        timeline.set_complete(true);
        tracing::debug!(project = self.id(), clips = timeline.clips().len(), "project loaded");
        self.emit(ProjectEvent::Loaded(timeline));
    }

    // ---- membership ----

    /// Add the asset `(id, kind)` to the project, resolving it first if needed.
    ///
    /// Returns `false` when it already belongs to the project, is already
    /// being added, or is known to fail; `AssetAdded` (or `ErrorLoadingAsset`)
    /// follows once resolution settles.
    pub fn create_asset(&self, id: &str, kind: AssetKind) -> EditResult<bool> {
        let key = AssetKey::new(id, kind);
        if self.is_member(&key) || self.inner.data.borrow().loading.contains(&key) {
            return Ok(false);
        }
        let ctx = self.context()?;
        if ctx
            .asset(id, kind)
            .is_some_and(|a| a.status() == AssetStatus::Error)
        {
            return Ok(false);
        }
        self.track_asset(&ctx, key)?;
        Ok(true)
    }

    /// Add an already obtained asset. Fails with [`EditError::Duplicate`] when
    /// it is a member already.
    pub fn add_asset(&self, asset: &Asset) -> EditResult<()> {
        if self.is_member(asset.key()) {
            return Err(EditError::duplicate(format!(
                "'{}' ({}) is already in {}",
                asset.id(),
                asset.kind(),
                self.id()
            )));
        }
        self.add_member(asset);
        Ok(())
    }

    /// Remove a member; the cache drops the asset once no project holds it.
    pub fn remove_asset(&self, asset: &Asset) -> EditResult<()> {
        let removed = {
            let mut data = self.inner.data.borrow_mut();
            let pos = data
                .members
                .iter()
                .position(|a| a.key() == asset.key())
                .ok_or_else(|| {
                    EditError::consistency(format!(
                        "'{}' ({}) is not in {}",
                        asset.id(),
                        asset.kind(),
                        self.inner.id
                    ))
                })?;
            data.members.remove(pos)
        };
        if let Ok(ctx) = self.context() {
            ctx.release_asset(removed.key());
        }
        self.emit(ProjectEvent::AssetRemoved(removed));
        Ok(())
    }

    fn add_member(&self, asset: &Asset) {
        self.inner.data.borrow_mut().members.push(asset.clone());
        if let Ok(ctx) = self.context() {
            ctx.retain_asset(asset.key());
        }
        self.emit(ProjectEvent::AssetAdded(asset.clone()));
    }

    fn is_member(&self, key: &AssetKey) -> bool {
        self.inner
            .data
            .borrow()
            .members
            .iter()
            .any(|a| a.key() == key)
    }

    /// Members in insertion order, optionally restricted to one kind.
    pub fn list_assets(&self, kind: Option<AssetKind>) -> Vec<Asset> {
        self.inner
            .data
            .borrow()
            .members
            .iter()
            .filter(|a| kind.is_none_or(|k| a.kind() == k))
            .cloned()
            .collect()
    }

    pub fn get_asset(&self, id: &str, kind: AssetKind) -> Option<Asset> {
        let key = AssetKey::new(id, kind);
        self.inner
            .data
            .borrow()
            .members
            .iter()
            .find(|a| *a.key() == key)
            .cloned()
    }

    // ---- metadata and profiles ----

    pub fn metadata(&self) -> MetaContainer {
        self.inner.data.borrow().metadata.clone()
    }

    pub fn set_meta(&self, key: &str, value: impl Into<MetaValue>) -> EditResult<()> {
        self.inner.data.borrow_mut().metadata.set(key, value)
    }

    /// Append an encoding profile; a profile with the same name is a duplicate.
    pub fn add_encoding_profile(&self, profile: EncodingProfile) -> EditResult<()> {
        profile.validate()?;
        let mut data = self.inner.data.borrow_mut();
        if data.encoding_profiles.iter().any(|p| p.name == profile.name) {
            return Err(EditError::duplicate(format!(
                "encoding profile '{}' already exists",
                profile.name
            )));
        }
        data.encoding_profiles.push(profile);
        Ok(())
    }

    pub fn encoding_profiles(&self) -> Vec<EncodingProfile> {
        self.inner.data.borrow().encoding_profiles.clone()
    }

    pub fn set_proxy_profile(&self, profile: Option<EncodingProfile>) -> EditResult<()> {
        if let Some(p) = &profile {
            p.validate()?;
        }
        self.inner.data.borrow_mut().proxy_profile = profile;
        Ok(())
    }

    pub fn proxy_profile(&self) -> Option<EncodingProfile> {
        self.inner.data.borrow().proxy_profile.clone()
    }

    // ---- saving ----

    /// Write `timeline` with the project's metadata, profiles and membership.
    ///
    /// `format` defaults to `json`. An existing file is only replaced with
    /// `overwrite`.
    #[tracing::instrument(
        level = "debug",
        skip(self, timeline),
        fields(project = %self.inner.id, path = %location.display())
    )]
    pub fn save(
        &self,
        timeline: &Timeline,
        location: &Path,
        format: Option<&str>,
        overwrite: bool,
    ) -> EditResult<()> {
        let formatter = formatter_for(format.unwrap_or("json"))?;
        let doc = self.to_document(timeline);
        save_document(&doc, location, formatter.as_ref(), overwrite)
    }

    /// Document form of this project and `timeline`.
    pub fn to_document(&self, timeline: &Timeline) -> ProjectDoc {
        let data = self.inner.data.borrow();
        let mut doc = ProjectDoc::new(TimelineDoc::from_timeline(timeline));
        doc.metadata = data.metadata.clone();
        doc.encoding_profiles = data.encoding_profiles.clone();
        doc.proxy_profile = data.proxy_profile.clone();
        doc.assets = data
            .members
            .iter()
            .map(|a| AssetDoc {
                id: a.target_id(),
                kind: a.kind(),
                proxy: a.proxy_target(),
            })
            .collect();
        doc
    }

    // ---- proxies ----

    /// Transcode proxies for `assets` with the proxy profile (or the default
    /// one) on a background thread.
    ///
    /// Sources must be loaded media. `token` may be cancelled directly or
    /// through [`Project::cancel_proxy_creation`].
    pub fn start_proxy_creation(
        &self,
        assets: &[Asset],
        token: CancellationToken,
    ) -> EditResult<()> {
        let ctx = self.context()?;
        if self.inner.data.borrow().proxy.is_some() {
            return Err(EditError::consistency(format!(
                "{} is already creating proxies",
                self.id()
            )));
        }
        let transcoder = ctx
            .transcoder()
            .ok_or_else(|| EditError::resolution("no proxy transcoder is configured"))?;
        let items = assets
            .iter()
            .map(|a| {
                if a.kind() != AssetKind::UriClip || a.status() != AssetStatus::Loaded {
                    return Err(EditError::validation(format!(
                        "'{}' is not loaded media",
                        a.id()
                    )));
                }
                Ok(ProxyItem {
                    key: a.key().clone(),
                    source_uri: a.target_id(),
                })
            })
            .collect::<EditResult<Vec<_>>>()?;
        let profile = self
            .proxy_profile()
            .unwrap_or_else(EncodingProfile::default_proxy);

        let id = ctx.next_batch_id(self.id());
        let batch = match spawn_batch(
            id,
            items,
            profile,
            transcoder,
            token,
            ctx.config().proxy_poll,
            ctx.sender(),
        ) {
            Ok(batch) => batch,
            Err(err) => {
                ctx.forget_batch(id);
                return Err(err);
            }
        };
        tracing::debug!(project = self.id(), batch = id, "proxy batch started");
        self.inner.data.borrow_mut().proxy = Some(ProxyRun {
            batch,
            created: 0,
            failed: 0,
            deadline: None,
        });
        self.emit(ProjectEvent::ProxyCreationStarted);
        Ok(())
    }

    pub fn pause_proxy_creation(&self) -> EditResult<()> {
        self.set_proxy_paused(true)
    }

    pub fn resume_proxy_creation(&self) -> EditResult<()> {
        self.set_proxy_paused(false)
    }

    fn set_proxy_paused(&self, paused: bool) -> EditResult<()> {
        let changed = {
            let data = self.inner.data.borrow();
            let run = data
                .proxy
                .as_ref()
                .ok_or_else(|| EditError::consistency("no proxy creation is running"))?;
            if run.batch.token.is_cancelled() {
                return Err(EditError::cancelled("proxy creation cancelled"));
            }
            run.batch.set_paused(paused)
        };
        if changed {
            self.emit(if paused {
                ProjectEvent::ProxyCreationPaused
            } else {
                ProjectEvent::ProxyCreationResumed
            });
        }
        Ok(())
    }

    /// Cancel the running batch. Queued sources are dropped; the current one
    /// gets the configured grace period to stop.
    pub fn cancel_proxy_creation(&self) -> EditResult<()> {
        let grace = self.context()?.config().proxy_grace;
        let mut data = self.inner.data.borrow_mut();
        let run = data
            .proxy
            .as_mut()
            .ok_or_else(|| EditError::consistency("no proxy creation is running"))?;
        run.batch.token.cancel();
        run.batch.set_paused(false);
        run.deadline.get_or_insert_with(|| Instant::now() + grace);
        Ok(())
    }

    /// Whether a proxy batch is running.
    pub fn is_creating_proxies(&self) -> bool {
        self.inner.data.borrow().proxy.is_some()
    }

    pub(crate) fn proxy_deadline(&self) -> Option<Instant> {
        let (deadline, cancelled) = {
            let data = self.inner.data.borrow();
            let run = data.proxy.as_ref()?;
            (run.deadline, run.batch.token.is_cancelled())
        };
        if deadline.is_some() || !cancelled {
            return deadline;
        }
        // A token cancelled by its owner starts the grace period too.
        let grace = self.context().ok()?.config().proxy_grace;
        let mut data = self.inner.data.borrow_mut();
        let run = data.proxy.as_mut()?;
        Some(*run.deadline.get_or_insert_with(|| Instant::now() + grace))
    }

    fn active_batch(&self, batch: u64) -> bool {
        self.inner
            .data
            .borrow()
            .proxy
            .as_ref()
            .is_some_and(|run| run.batch.id == batch)
    }

    pub(crate) fn proxy_item_done(
        &self,
        batch: u64,
        key: &AssetKey,
        source: Option<Asset>,
        result: EditResult<String>,
    ) {
        if !self.active_batch(batch) {
            tracing::debug!(batch, "late proxy result ignored");
            return;
        }
        if result.is_ok() && self.proxy_cancelled() {
            tracing::debug!(batch, id = %key.id, "proxy finished after cancellation, dropped");
            return;
        }
        let Some(source) = source else {
            tracing::warn!(batch, id = %key.id, "proxy source left the cache");
            self.bump_proxy_counts(0, 1);
            return;
        };
        let outcome = result.and_then(|uri| {
            let ctx = self.context()?;
            let proxy = ctx.adopt_proxy(&uri, &source)?;
            Ok(proxy)
        });
        match outcome {
            Ok(proxy) => {
                source.set_proxy_target(Some(proxy.id().to_string()));
                if !self.is_member(proxy.key()) {
                    self.add_member(&proxy);
                }
                self.bump_proxy_counts(1, 0);
            }
            Err(err) => {
                tracing::warn!(batch, id = source.id(), error = %err, "proxy failed");
                self.bump_proxy_counts(0, 1);
                self.emit(ProjectEvent::ProxyFailed {
                    asset: source,
                    error: Rc::new(err),
                });
            }
        }
    }

    fn proxy_cancelled(&self) -> bool {
        self.inner
            .data
            .borrow()
            .proxy
            .as_ref()
            .is_some_and(|run| run.batch.token.is_cancelled())
    }

    fn bump_proxy_counts(&self, created: usize, failed: usize) {
        if let Some(run) = self.inner.data.borrow_mut().proxy.as_mut() {
            run.created += created;
            run.failed += failed;
        }
    }

    pub(crate) fn proxy_batch_finished(&self, batch: u64, cancelled: bool) {
        if self.active_batch(batch) {
            self.finish_proxy_batch(cancelled);
        }
    }

    /// Emit the terminal event of the running batch and forget it.
    pub(crate) fn finish_proxy_batch(&self, cancelled: bool) {
        let Some(run) = self.inner.data.borrow_mut().proxy.take() else {
            return;
        };
        if let Ok(ctx) = self.context() {
            ctx.forget_batch(run.batch.id);
        }
        let cancelled = cancelled || run.batch.token.is_cancelled();
        tracing::debug!(
            batch = run.batch.id,
            created = run.created,
            failed = run.failed,
            cancelled,
            "proxy batch done"
        );
        self.emit(ProjectEvent::ProxiesCreated {
            created: run.created,
            failed: run.failed,
            cancelled,
        });
    }
}

#[cfg(test)]
#[path = "../../tests/unit/project/project.rs"]
mod tests;
