use std::sync::{Arc, mpsc::Sender};

use crate::{
    assets::asset::{AssetInfo, AssetKey},
    assets::media::MediaInfoProvider,
    assets::registry,
    foundation::error::{EditError, EditResult},
};

/// Attempts made per dispatched resolution: the first try plus one immediate retry.
pub const MAX_ATTEMPTS: u32 = 2;

/// One resolution request handed to a worker.
#[derive(Clone, Debug)]
pub(crate) struct ResolveJob {
    pub key: AssetKey,
    pub target_id: String,
    pub generation: u64,
}

/// Worker → control thread reports.
#[derive(Debug)]
pub(crate) enum LoaderMsg {
    /// First attempt failed, a retry is starting.
    Retrying {
        key: AssetKey,
        generation: u64,
        error: String,
    },
    /// Terminal outcome of a job.
    Resolved {
        key: AssetKey,
        target_id: String,
        generation: u64,
        attempts: u32,
        outcome: EditResult<AssetInfo>,
    },
}

/// Background resolution on a dedicated rayon pool.
pub(crate) struct Loader {
    pool: rayon::ThreadPool,
    media: Arc<dyn MediaInfoProvider>,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("threads", &self.pool.current_num_threads())
            .finish_non_exhaustive()
    }
}

impl Loader {
    pub(crate) fn new(
        threads: Option<usize>,
        media: Arc<dyn MediaInfoProvider>,
    ) -> EditResult<Self> {
        Ok(Self {
            pool: build_thread_pool(threads)?,
            media,
        })
    }

    /// Queue `job`; the outcome arrives on `tx`. Never blocks the caller.
    pub(crate) fn dispatch<M>(&self, job: ResolveJob, tx: Sender<M>)
    where
        M: From<LoaderMsg> + Send + 'static,
    {
        let media = Arc::clone(&self.media);
        self.pool.spawn(move || run_job(job, media.as_ref(), &tx));
    }
}

#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(id = %job.key.id, kind = %job.key.kind, target = %job.target_id)
)]
fn run_job<M: From<LoaderMsg>>(job: ResolveJob, media: &dyn MediaInfoProvider, tx: &Sender<M>) {
    let mut attempts = 1;
    let mut outcome = registry::resolve(job.key.kind, &job.target_id, media);
    while let Err(err) = &outcome
        && attempts < MAX_ATTEMPTS
    {
        tracing::debug!(error = %err, attempts, "resolution failed, retrying");
        let msg = LoaderMsg::Retrying {
            key: job.key.clone(),
            generation: job.generation,
            error: err.to_string(),
        };
        if tx.send(msg.into()).is_err() {
            return;
        }
        attempts += 1;
        outcome = registry::resolve(job.key.kind, &job.target_id, media);
    }

    // The receiver is gone when the context was dropped; nothing left to report to.
    let _ = tx.send(
        LoaderMsg::Resolved {
            key: job.key,
            target_id: job.target_id,
            generation: job.generation,
            attempts,
            outcome,
        }
        .into(),
    );
}

fn build_thread_pool(threads: Option<usize>) -> EditResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(EditError::validation(
            "loader 'worker_threads' must be >= 1 when set",
        ));
    }
    let mut builder =
        rayon::ThreadPoolBuilder::new().thread_name(|i| format!("cutlist-loader-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| EditError::Other(anyhow::anyhow!("failed to build loader thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/loader.rs"]
mod tests;
