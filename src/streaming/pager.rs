//! Asynchronous database pager with priority-ordered concurrent loading
//!
//! Traversals hand `LoadRequest`s to the pager through `LoadRequestHandler`.
//! A worker task keeps them in a priority queue and runs up to
//! `max_concurrent` loads on the blocking pool. Finished loads come back as
//! `LoadResult` messages and are only attached to the scene inside
//! `update`, which the application calls once per frame between traversals.

use std::collections::HashSet;
use std::ops::AddAssign;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::core::types::Result;
use crate::core::{Error, FrameStamp};
use crate::scene::{NodeId, NodeRef};
use crate::streaming::config::PagerConfig;
use crate::streaming::expiry::ExpiryRegistry;
use crate::streaming::priority::{LoadQueue, LoadRequest, LoadRequestHandler};
use crate::streaming::source::NodeSource;

/// Outcome of one load
#[derive(Debug)]
pub enum LoadResult {
    /// Node built, waiting to be attached
    Loaded { request: LoadRequest, node: NodeRef },
    /// Source failed to produce the node
    Failed { request: LoadRequest, error: String },
    /// Target was dropped before the load started
    Abandoned(LoadRequest),
}

impl LoadResult {
    pub fn request(&self) -> &LoadRequest {
        match self {
            LoadResult::Loaded { request, .. } => request,
            LoadResult::Failed { request, .. } => request,
            LoadResult::Abandoned(request) => request,
        }
    }
}

/// What one `update` did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagerStats {
    pub attached: usize,
    /// Completions dropped because they were cancelled, their target is gone,
    /// or the slot no longer awaits them
    pub discarded: usize,
    pub failed: usize,
    pub evicted: usize,
}

impl AddAssign for PagerStats {
    fn add_assign(&mut self, other: Self) {
        self.attached += other.attached;
        self.discarded += other.discarded;
        self.failed += other.failed;
        self.evicted += other.evicted;
    }
}

/// Loads paged LOD children in the background and expires stale ones
pub struct DatabasePager {
    /// Channel for sending load requests to the worker task
    request_tx: mpsc::UnboundedSender<LoadRequest>,
    /// Channel for receiving load results
    result_rx: mpsc::UnboundedReceiver<LoadResult>,
    /// Keys of requests sent but not yet processed by `update`
    pending: Mutex<HashSet<(NodeId, usize)>>,
    expiry: ExpiryRegistry,
    config: PagerConfig,
    /// Dedicated runtime, `None` when running on the caller's runtime
    runtime: Option<Runtime>,
}

impl DatabasePager {
    /// Create a pager with its own multi-thread runtime
    pub fn new(source: Arc<dyn NodeSource>, config: PagerConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Builder::new_multi_thread()
            .thread_name("paged-lod-pager")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self::start(&handle, source, config, Some(runtime)))
    }

    /// Create a pager on the tokio runtime the caller is running in
    pub fn new_with_current_runtime(source: Arc<dyn NodeSource>, config: PagerConfig) -> Result<Self> {
        config.validate()?;
        let handle = Handle::try_current()
            .map_err(|e| Error::Config(format!("no current tokio runtime: {e}")))?;
        Ok(Self::start(&handle, source, config, None))
    }

    fn start(
        handle: &Handle,
        source: Arc<dyn NodeSource>,
        config: PagerConfig,
        runtime: Option<Runtime>,
    ) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel::<LoadRequest>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<LoadResult>();

        handle.spawn(Self::worker_loop(
            source,
            config.max_concurrent.max(1),
            request_rx,
            result_tx,
        ));

        log::debug!(
            "Pager started (max_concurrent: {}, expiry_delay: {:.1}s)",
            config.max_concurrent,
            config.expiry_delay
        );

        Self {
            request_tx,
            result_rx,
            pending: Mutex::new(HashSet::new()),
            expiry: ExpiryRegistry::new(config.max_evictions_per_sweep),
            config,
            runtime,
        }
    }

    /// Worker loop that processes load requests with concurrency control
    async fn worker_loop(
        source: Arc<dyn NodeSource>,
        max_concurrent: usize,
        mut request_rx: mpsc::UnboundedReceiver<LoadRequest>,
        result_tx: mpsc::UnboundedSender<LoadResult>,
    ) {
        let mut active = JoinSet::new();
        let mut queue = LoadQueue::new();
        let mut closed = false;

        loop {
            // Start new tasks if we have capacity, highest priority first
            while active.len() < max_concurrent {
                let Some(request) = queue.pop() else {
                    break;
                };
                let source = Arc::clone(&source);
                active.spawn(async move {
                    let fallback = request.clone();
                    tokio::task::spawn_blocking(move || Self::load_task(source.as_ref(), request))
                        .await
                        .unwrap_or_else(|e| LoadResult::Failed {
                            request: fallback,
                            error: format!("load task panicked: {e}"),
                        })
                });
            }

            if closed && active.is_empty() {
                break;
            }

            tokio::select! {
                request = request_rx.recv(), if !closed => match request {
                    Some(request) => queue.push(request),
                    None => {
                        // Pager dropped; finish what is running, skip the rest
                        closed = true;
                        queue.clear();
                    }
                },

                Some(joined) = active.join_next(), if !active.is_empty() => match joined {
                    Ok(result) => {
                        if result_tx.send(result).is_err() {
                            log::debug!("Pager gone, dropping load result");
                        }
                    }
                    Err(e) => log::error!("Pager load task failed: {}", e),
                },
            }
        }

        log::debug!("Pager worker stopped");
    }

    /// Task that loads a single node
    fn load_task(source: &dyn NodeSource, request: LoadRequest) -> LoadResult {
        if request.target.strong_count() == 0 {
            return LoadResult::Abandoned(request);
        }
        match source.load(&request.source_id) {
            Ok(node) => LoadResult::Loaded { request, node },
            Err(e) => LoadResult::Failed {
                request,
                error: e.to_string(),
            },
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashSet<(NodeId, usize)>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a load request
    ///
    /// Returns `false` if the same target and slot is already pending, `true` if the request was queued.
    pub fn try_request(&self, request: LoadRequest) -> bool {
        let key = request.key();
        if !self.pending().insert(key) {
            return false;
        }

        if self.request_tx.send(request).is_err() {
            log::warn!("Pager worker stopped, dropping request for {} slot {}", key.0, key.1);
            self.pending().remove(&key);
            return false;
        }
        true
    }

    /// Frame boundary: attach finished loads, then expire stale children
    pub fn update(&mut self, frame: &FrameStamp) -> PagerStats {
        let mut stats = PagerStats::default();

        while let Ok(result) = self.result_rx.try_recv() {
            let (target, slot) = result.request().key();
            if !self.pending().remove(&(target, slot)) {
                log::debug!(
                    "Discarding cancelled load '{}' for {} slot {}",
                    result.request().source_id,
                    target,
                    slot
                );
                stats.discarded += 1;
                continue;
            }

            match result {
                LoadResult::Loaded { request, node } => {
                    match self.attach(&request, node, frame.reference_time) {
                        Ok(()) => {
                            log::trace!("Attached '{}' to {} slot {}", request.source_id, target, slot);
                            stats.attached += 1;
                        }
                        Err(e) => {
                            log::debug!("Discarding load '{}': {}", request.source_id, e);
                            stats.discarded += 1;
                        }
                    }
                }
                LoadResult::Failed { request, error } => {
                    log::warn!("Failed to load '{}': {}", request.source_id, error);
                    stats.failed += 1;
                }
                LoadResult::Abandoned(request) => {
                    log::debug!("Discarding load '{}': target {} dropped", request.source_id, target);
                    stats.discarded += 1;
                }
            }
        }

        let expiry_time = frame.reference_time - self.config.expiry_delay;
        stats.evicted = self.expiry.sweep(expiry_time).len();
        stats
    }

    fn attach(&mut self, request: &LoadRequest, node: NodeRef, attached_at: f64) -> Result<()> {
        let target = request
            .target
            .upgrade()
            .ok_or(Error::NotFound(request.target_id))?;
        let loaded = Arc::clone(&node);
        target.with_paged_lod(|lod| lod.attach(request.slot, &request.source_id, node, attached_at))??;
        self.expiry.register(&target)?;
        self.register_paged_lods(&loaded);
        Ok(())
    }

    /// Watch every paged LOD under `root` for expiry.
    ///
    /// Loaded subtrees are registered automatically. Call this for scenes built
    /// up front so their eagerly attached paged children can expire too.
    pub fn register_paged_lods(&mut self, root: &NodeRef) -> usize {
        let added = self.expiry.register_subtree(root);
        if added > 0 {
            log::trace!("Tracking {} more paged LODs under {}", added, root.id());
        }
        added
    }

    /// Get the number of pending load requests
    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Check if a load for `target`'s `slot` is currently pending
    pub fn is_pending(&self, target: NodeId, slot: usize) -> bool {
        self.pending().contains(&(target, slot))
    }

    /// Cancel a pending load request (best effort)
    ///
    /// A load already running still completes; its result is discarded by `update`.
    pub fn cancel(&self, target: NodeId, slot: usize) -> bool {
        self.pending().remove(&(target, slot))
    }

    /// Number of paged LODs watched for expiry
    pub fn tracked_lods(&self) -> usize {
        self.expiry.len()
    }

    pub fn config(&self) -> &PagerConfig {
        &self.config
    }
}

impl LoadRequestHandler for DatabasePager {
    fn request_load(&self, request: LoadRequest) {
        self.try_request(request);
    }
}

impl Drop for DatabasePager {
    fn drop(&mut self) {
        // Dropping request_tx ends the worker loop; don't block on running loads
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
