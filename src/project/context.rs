use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    path::{Path, PathBuf},
    rc::{Rc, Weak},
    sync::{
        Arc,
        mpsc::{Receiver, RecvTimeoutError, Sender, channel},
    },
    time::{Duration, Instant},
};

use crate::{
    assets::{
        asset::{Asset, AssetInfo, AssetKey, AssetKind},
        cache::AssetCache,
        loader::{Loader, LoaderMsg, ResolveJob},
        media::MediaInfoProvider,
        proxy::{ProxyMsg, ProxyTranscoder},
    },
    foundation::error::{EditError, EditResult},
    project::{events::AssetEvent, project::Project},
};

/// Threading and timing knobs of a [`Context`].
#[derive(Clone, Debug)]
pub struct ContextConfig {
    /// Loader pool size; `None` lets rayon decide.
    pub worker_threads: Option<usize>,
    /// How long a cancelled proxy batch may keep running before the control
    /// thread finishes it.
    pub proxy_grace: Duration,
    /// Sleep between checks of a paused proxy batch.
    pub proxy_poll: Duration,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            proxy_grace: Duration::from_millis(500),
            proxy_poll: Duration::from_millis(10),
        }
    }
}

/// Everything worker threads report back, plus self-posted wakeups.
#[derive(Debug)]
pub(crate) enum Message {
    Loader(LoaderMsg),
    Proxy(ProxyMsg),
    /// Re-evaluate whether a loading project is done.
    CheckLoaded(String),
}

impl From<LoaderMsg> for Message {
    fn from(msg: LoaderMsg) -> Self {
        Self::Loader(msg)
    }
}

impl From<ProxyMsg> for Message {
    fn from(msg: ProxyMsg) -> Self {
        Self::Proxy(msg)
    }
}

type AssetListener = Rc<dyn Fn(&AssetEvent)>;

pub(crate) struct ContextInner {
    config: ContextConfig,
    cache: RefCell<AssetCache>,
    projects: RefCell<HashMap<String, Project>>,
    next_project: Cell<u64>,
    next_batch: Cell<u64>,
    /// Proxy batch id → owning project id.
    batches: RefCell<HashMap<u64, String>>,
    loader: Loader,
    tx: Sender<Message>,
    rx: Receiver<Message>,
    in_flight: Cell<usize>,
    listeners: RefCell<Vec<AssetListener>>,
    transcoder: RefCell<Option<Arc<dyn ProxyTranscoder>>>,
}

/// Control-thread driver: owns the asset cache, the loader pool and every
/// project opened through it.
///
/// Nothing happens in the background until the owner pumps messages with
/// [`Context::iterate`] or [`Context::run_until`]; status changes, project
/// events and observer callbacks all run inside those calls.
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.inner.config)
            .field("cached", &self.inner.cache.borrow().len())
            .field("in_flight", &self.inner.in_flight.get())
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(media: Arc<dyn MediaInfoProvider>) -> EditResult<Self> {
        Self::with_config(media, ContextConfig::default())
    }

    pub fn with_config(
        media: Arc<dyn MediaInfoProvider>,
        config: ContextConfig,
    ) -> EditResult<Self> {
        let loader = Loader::new(config.worker_threads, media)?;
        let (tx, rx) = channel();
        Ok(Self {
            inner: Rc::new(ContextInner {
                config,
                cache: RefCell::new(AssetCache::new()),
                projects: RefCell::new(HashMap::new()),
                next_project: Cell::new(0),
                next_batch: Cell::new(0),
                batches: RefCell::new(HashMap::new()),
                loader,
                tx,
                rx,
                in_flight: Cell::new(0),
                listeners: RefCell::new(Vec::new()),
                transcoder: RefCell::new(None),
            }),
        })
    }

    pub(crate) fn from_weak(weak: &Weak<ContextInner>) -> EditResult<Self> {
        weak.upgrade()
            .map(|inner| Self { inner })
            .ok_or_else(|| EditError::consistency("the owning context was dropped"))
    }

    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    /// Install the transcoder used by proxy batches.
    pub fn set_transcoder(&self, transcoder: Arc<dyn ProxyTranscoder>) {
        *self.inner.transcoder.borrow_mut() = Some(transcoder);
    }

    pub(crate) fn transcoder(&self) -> Option<Arc<dyn ProxyTranscoder>> {
        self.inner.transcoder.borrow().clone()
    }

    /// Register a callback for asset status changes.
    pub fn subscribe_assets(&self, listener: impl Fn(&AssetEvent) + 'static) {
        self.inner.listeners.borrow_mut().push(Rc::new(listener));
    }

    // ---- assets ----

    /// Cached asset for `(id, kind)`, starting its resolution on a miss.
    ///
    /// Never blocks: the returned asset may still be `Started`. Repeated
    /// requests share one instance and one resolution; a failed key stays
    /// failed.
    pub fn request_asset(&self, id: &str, kind: AssetKind) -> EditResult<Asset> {
        if kind == AssetKind::Project {
            return Err(EditError::resolution(format!(
                "project '{id}' must be opened with Context::project"
            )));
        }
        let key = AssetKey::new(id, kind);
        let (asset, created) = self.inner.cache.borrow_mut().get_or_insert(key.clone());
        if created {
            let generation = asset.begin_resolution(id)?;
            self.dispatch(key, id.to_string(), generation);
            self.notify(&asset);
        }
        Ok(asset)
    }

    /// Cache lookup without side effects.
    pub fn asset(&self, id: &str, kind: AssetKind) -> Option<Asset> {
        self.inner.cache.borrow().get(&AssetKey::new(id, kind))
    }

    /// Number of project memberships holding `asset`.
    pub fn asset_holders(&self, asset: &Asset) -> usize {
        self.inner.cache.borrow().holders(asset.key())
    }

    /// Number of cached assets.
    pub fn cached_assets(&self) -> usize {
        self.inner.cache.borrow().len()
    }

    /// Evict every settled asset no project holds.
    pub fn purge_unheld(&self) -> usize {
        self.inner.cache.borrow_mut().purge_unheld()
    }

    /// Resolutions dispatched and not yet applied.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.get()
    }

    pub(crate) fn retain_asset(&self, key: &AssetKey) {
        self.inner.cache.borrow_mut().retain(key);
    }

    pub(crate) fn release_asset(&self, key: &AssetKey) {
        self.inner.cache.borrow_mut().release(key);
    }

    pub(crate) fn wait_for(&self, key: &AssetKey, project_id: &str) {
        self.inner.cache.borrow_mut().add_waiter(key, project_id);
    }

    /// Register a finished proxy transcode as a loaded asset.
    pub(crate) fn adopt_proxy(&self, uri: &str, source: &Asset) -> EditResult<Asset> {
        let info = source
            .info()
            .ok_or_else(|| EditError::consistency(format!("'{}' is not loaded", source.id())))?;
        let key = AssetKey::new(uri, AssetKind::UriClip);
        let (proxy, created) = self.inner.cache.borrow_mut().get_or_insert(key);
        if created {
            proxy.begin_resolution(uri)?;
            self.notify(&proxy);
            proxy.finish_loaded(info);
            self.notify(&proxy);
        }
        Ok(proxy)
    }

    fn dispatch(&self, key: AssetKey, target_id: String, generation: u64) {
        tracing::debug!(id = %key.id, kind = %key.kind, target = %target_id, "dispatching");
        self.inner.in_flight.set(self.inner.in_flight.get() + 1);
        let job = ResolveJob {
            key,
            target_id,
            generation,
        };
        self.inner.loader.dispatch(job, self.inner.tx.clone());
    }

    fn notify(&self, asset: &Asset) {
        let event = AssetEvent {
            id: asset.id().to_string(),
            kind: asset.kind(),
            status: asset.status(),
        };
        let listeners = self.inner.listeners.borrow().clone();
        for listener in listeners {
            listener(&event);
        }
    }

    // ---- projects ----

    /// Fresh project without a location, identified as `project-N`.
    pub fn new_project(&self) -> Project {
        let n = self.inner.next_project.get();
        self.inner.next_project.set(n + 1);
        let project = Project::new(format!("project-{n}"), None, Rc::downgrade(&self.inner));
        self.inner
            .projects
            .borrow_mut()
            .insert(project.id().to_string(), project.clone());
        project
    }

    /// Project stored at `location`; the same location yields the same instance.
    pub fn project(&self, location: impl AsRef<Path>) -> Project {
        let location = canonical_location(location.as_ref());
        let location = location.as_path();
        let id = location.display().to_string();
        if let Some(project) = self.inner.projects.borrow().get(&id) {
            return project.clone();
        }
        let project = Project::new(
            id.clone(),
            Some(location.to_path_buf()),
            Rc::downgrade(&self.inner),
        );
        self.inner.projects.borrow_mut().insert(id, project.clone());
        project
    }

    fn project_by_id(&self, id: &str) -> Option<Project> {
        self.inner.projects.borrow().get(id).cloned()
    }

    pub(crate) fn post_check_loaded(&self, project_id: &str) {
        // The receiver lives in `self`, so the send cannot fail.
        let _ = self
            .inner
            .tx
            .send(Message::CheckLoaded(project_id.to_string()));
    }

    pub(crate) fn next_batch_id(&self, project_id: &str) -> u64 {
        let id = self.inner.next_batch.get() + 1;
        self.inner.next_batch.set(id);
        self.inner
            .batches
            .borrow_mut()
            .insert(id, project_id.to_string());
        id
    }

    pub(crate) fn forget_batch(&self, batch: u64) {
        self.inner.batches.borrow_mut().remove(&batch);
    }

    pub(crate) fn sender(&self) -> Sender<Message> {
        self.inner.tx.clone()
    }

    // ---- message pump ----

    /// Apply at most one pending message, waiting up to `timeout` for it.
    ///
    /// Overdue proxy cancellations are finalized either way. Returns whether a
    /// message was applied.
    pub fn iterate(&self, timeout: Duration) -> bool {
        let wait = self
            .next_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()).min(timeout))
            .unwrap_or(timeout);
        let handled = match self.inner.rx.recv_timeout(wait) {
            Ok(msg) => {
                self.handle(msg);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            // `self` holds a sender; unreachable in practice.
            Err(RecvTimeoutError::Disconnected) => false,
        };
        self.expire_proxy_batches();
        handled
    }

    /// Pump messages until `done` holds or `timeout` elapses. Returns `done()`.
    pub fn run_until(&self, mut done: impl FnMut() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !done() {
            let now = Instant::now();
            if now >= deadline {
                return done();
            }
            self.iterate(deadline - now);
        }
        true
    }

    fn next_deadline(&self) -> Option<Instant> {
        let projects: Vec<Project> = self.inner.projects.borrow().values().cloned().collect();
        projects.iter().filter_map(Project::proxy_deadline).min()
    }

    fn expire_proxy_batches(&self) {
        let now = Instant::now();
        let projects: Vec<Project> = self.inner.projects.borrow().values().cloned().collect();
        for project in projects {
            if project.proxy_deadline().is_some_and(|d| d <= now) {
                project.finish_proxy_batch(true);
            }
        }
    }

    fn handle(&self, msg: Message) {
        match msg {
            Message::Loader(LoaderMsg::Retrying {
                key,
                generation,
                error,
            }) => {
                let Some(asset) = self.inner.cache.borrow().get(&key) else {
                    return;
                };
                if asset.generation() == generation {
                    tracing::debug!(id = %key.id, %error, "resolution retry");
                    self.notify(&asset);
                }
            }
            Message::Loader(LoaderMsg::Resolved {
                key,
                target_id,
                generation,
                attempts,
                outcome,
            }) => {
                self.inner
                    .in_flight
                    .set(self.inner.in_flight.get().saturating_sub(1));
                let asset = self.inner.cache.borrow().get(&key);
                let Some(asset) = asset.filter(|a| a.generation() == generation) else {
                    tracing::debug!(id = %key.id, "dropping stale resolution");
                    return;
                };
                tracing::debug!(
                    id = %key.id,
                    target = %target_id,
                    attempts,
                    ok = outcome.is_ok(),
                    "resolved"
                );
                match outcome {
                    Ok(info) => self.on_loaded(&asset, info),
                    Err(err) => self.on_failed(&asset, err),
                }
            }
            Message::Proxy(ProxyMsg::ItemDone { batch, key, result }) => {
                if let Some(project) = self.batch_owner(batch) {
                    let source = self.inner.cache.borrow().get(&key);
                    project.proxy_item_done(batch, &key, source, result);
                }
            }
            Message::Proxy(ProxyMsg::Finished { batch, cancelled }) => {
                if let Some(project) = self.batch_owner(batch) {
                    project.proxy_batch_finished(batch, cancelled);
                }
            }
            Message::CheckLoaded(id) => {
                if let Some(project) = self.project_by_id(&id) {
                    project.check_loaded();
                }
            }
        }
    }

    fn batch_owner(&self, batch: u64) -> Option<Project> {
        let id = self.inner.batches.borrow().get(&batch).cloned()?;
        self.project_by_id(&id)
    }

    fn on_loaded(&self, asset: &Asset, info: AssetInfo) {
        asset.finish_loaded(info);
        self.notify(asset);
        let waiters = self.inner.cache.borrow_mut().take_waiters(asset.key());
        for id in waiters {
            if let Some(project) = self.project_by_id(&id) {
                project.asset_loaded(asset);
                project.check_loaded();
            }
        }
    }

    fn on_failed(&self, asset: &Asset, err: EditError) {
        asset.finish_error(err.to_string());
        let waiters = self.inner.cache.borrow().waiters(asset.key());
        for id in &waiters {
            let Some(project) = self.project_by_id(id) else {
                continue;
            };
            let Some(replacement) = project.missing_reference(&err, asset) else {
                continue;
            };
            if asset.was_tried(&replacement) {
                tracing::warn!(id = asset.id(), %replacement, "replacement was already tried");
                continue;
            }
            match asset.begin_resolution(&replacement) {
                Ok(generation) => {
                    tracing::debug!(id = asset.id(), %replacement, "retrying with replacement");
                    self.notify(asset);
                    self.dispatch(asset.key().clone(), replacement, generation);
                    return;
                }
                Err(e) => tracing::warn!(id = asset.id(), error = %e, "cannot restart resolution"),
            }
        }

        tracing::warn!(id = asset.id(), kind = %asset.kind(), error = %err, "asset failed");
        self.notify(asset);
        let waiters = self.inner.cache.borrow_mut().take_waiters(asset.key());
        let err = Rc::new(err);
        for id in waiters {
            if let Some(project) = self.project_by_id(&id) {
                project.asset_failed(asset, Rc::clone(&err));
            }
        }
    }
}

/// `path` with links and `.`/`..` resolved. A file that does not exist yet
/// resolves through its parent directory.
fn canonical_location(path: &Path) -> PathBuf {
    if let Ok(found) = std::fs::canonicalize(path) {
        return found;
    }
    let Some(name) = path.file_name() else {
        return path.to_path_buf();
    };
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::canonicalize(parent)
        .map(|dir| dir.join(name))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
#[path = "../../tests/unit/project/context.rs"]
mod tests;
