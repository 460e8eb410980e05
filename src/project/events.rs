use std::rc::Rc;

use crate::{
    assets::asset::{Asset, AssetKind, AssetStatus},
    foundation::error::EditError,
    project::project::Project,
    timeline::timeline::Timeline,
};

/// Notification delivered to [`ProjectObserver`]s, in emission order.
#[derive(Clone, Debug)]
pub enum ProjectEvent {
    /// An asset joined the project.
    AssetAdded(Asset),
    /// An asset left the project.
    AssetRemoved(Asset),
    /// An asset (or the project document itself) could not be loaded.
    ErrorLoadingAsset {
        /// Cause.
        error: Rc<EditError>,
        /// Id that failed.
        id: String,
        /// Kind that failed.
        kind: AssetKind,
    },
    /// Every mandatory asset is resolved and the timeline is complete. Fired once.
    Loaded(Timeline),
    /// A proxy batch started.
    ProxyCreationStarted,
    /// The running proxy batch was paused.
    ProxyCreationPaused,
    /// The paused proxy batch was resumed.
    ProxyCreationResumed,
    /// One source of the batch failed; the batch goes on.
    ProxyFailed {
        /// Source asset.
        asset: Asset,
        /// Cause.
        error: Rc<EditError>,
    },
    /// Terminal event of a proxy batch, completed or cancelled.
    ProxiesCreated {
        /// Proxies that became loaded.
        created: usize,
        /// Sources that failed.
        failed: usize,
        /// Whether the batch was cancelled.
        cancelled: bool,
    },
}

/// Embedder hooks of a [`Project`].
///
/// Called synchronously on the control thread.
pub trait ProjectObserver {
    /// Any [`ProjectEvent`].
    fn on_event(&self, _project: &Project, _event: &ProjectEvent) {}

    /// A requested asset failed to resolve. Returning an id retries with it;
    /// `None` makes the failure final.
    fn missing_reference(
        &self,
        _project: &Project,
        _error: &EditError,
        _asset: &Asset,
    ) -> Option<String> {
        None
    }
}

/// Status change of a cached asset, delivered to [`crate::Context`] subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetEvent {
    /// Asset id.
    pub id: String,
    /// Asset kind.
    pub kind: AssetKind,
    /// New status.
    pub status: AssetStatus,
}
