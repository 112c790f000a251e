//! One execution context shared by every preview, created on first acquire and torn down
//! when the last lease is released.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::assets::decode::ImageSource;
use crate::encode::OutputFormat;
use crate::foundation::core::ImageId;
use crate::foundation::error::{StoryError, StoryResult, lock_poisoned};
use crate::params::CompositingParameters;
use crate::scheduler::handles::{DisplayHandle, HandleRegistry};
use crate::scheduler::preview::{PreviewEvent, PreviewInstance};
use crate::scheduler::tiers::{QualityTier, default_tiers, validate_tiers};
use crate::scheduler::timer::{TimerId, TimerQueue, TimerTask};
use crate::worker::cache::ContextStats;
use crate::worker::context::{ContextOptions, ExecutionContext};
use crate::worker::protocol::{
    ClearCacheRequest, ProcessRequest, RequestId, WorkerRequest, WorkerResponse,
};

/// Scheduler configuration.
#[derive(Clone, Debug)]
pub struct SchedulerOptions {
    /// Progressive tiers, lowest resolution first.
    pub tiers: Vec<QualityTier>,
    /// Encoding of preview results.
    pub preview_format: OutputFormat,
    /// How the shared execution context is built.
    pub context: ContextOptions,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            preview_format: OutputFormat::Png,
            context: ContextOptions::default(),
        }
    }
}

/// One render job as the scheduler sees it.
#[derive(Clone, Debug)]
pub(crate) struct RenderJob {
    /// Cache key of the image.
    pub image_id: Option<ImageId>,
    /// Image data; dropped from the request if this id was already shipped.
    pub source: Option<ImageSource>,
    /// Parameters including the tier cap.
    pub params: CompositingParameters,
}

pub(crate) type Resolve = Box<dyn FnOnce(DisplayHandle) + Send + 'static>;
pub(crate) type Reject = Box<dyn FnOnce(StoryError) + Send + 'static>;

/// Continuation pair of one outstanding request.
pub(crate) struct PendingRequest {
    resolve: Resolve,
    reject: Reject,
}

struct ContextLink {
    context: ExecutionContext,
    timers: TimerQueue,
    dispatcher: Option<JoinHandle<()>>,
}

impl ContextLink {
    fn shutdown(mut self) {
        self.timers.shutdown();
        if let Err(e) = self.context.terminate() {
            tracing::warn!(error = %e, "execution context did not stop cleanly");
        }
        if let Some(join) = self.dispatcher.take()
            && join.thread().id() != std::thread::current().id()
            && join.join().is_err()
        {
            tracing::warn!("response dispatcher panicked");
        }
    }
}

#[derive(Default)]
struct SharedState {
    link: Option<ContextLink>,
    leases: usize,
    pending: HashMap<RequestId, PendingRequest>,
    sent_image_ids: HashSet<ImageId>,
    source_carriers: HashMap<RequestId, ImageId>,
    unavailable: Option<String>,
    spawn_count: u64,
}

pub(crate) struct SchedulerInner {
    opts: SchedulerOptions,
    state: Mutex<SharedState>,
    registry: HandleRegistry,
    next_request: AtomicU64,
}

/// Entry point of the progressive preview pipeline. Cheap to clone.
#[derive(Clone)]
pub struct PreviewScheduler {
    inner: Arc<SchedulerInner>,
}

impl std::fmt::Debug for PreviewScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewScheduler")
            .field("tiers", &self.inner.opts.tiers)
            .finish_non_exhaustive()
    }
}

/// Keeps the shared execution context alive. The last lease to drop tears it down.
pub struct ContextLease {
    inner: Arc<SchedulerInner>,
}

impl std::fmt::Debug for ContextLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContextLease")
    }
}

impl Drop for ContextLease {
    fn drop(&mut self) {
        self.inner.release();
    }
}

impl PreviewScheduler {
    /// Scheduler with validated options. No thread is started until the first acquire.
    pub fn new(opts: SchedulerOptions) -> StoryResult<Self> {
        validate_tiers(&opts.tiers)?;
        Ok(Self {
            inner: Arc::new(SchedulerInner {
                opts,
                state: Mutex::new(SharedState::default()),
                registry: HandleRegistry::new(),
                next_request: AtomicU64::new(1),
            }),
        })
    }

    /// Tiers every preview walks through.
    pub fn tiers(&self) -> &[QualityTier] {
        &self.inner.opts.tiers
    }

    /// Registry holding every display handle this scheduler issued.
    pub fn registry(&self) -> &HandleRegistry {
        &self.inner.registry
    }

    /// Take a lease on the shared context, starting it if needed.
    pub fn acquire(&self) -> StoryResult<ContextLease> {
        let mut state = self.inner.lock()?;
        if let Some(reason) = &state.unavailable {
            return Err(StoryError::context_unavailable(reason.clone()));
        }
        if state.link.is_none() {
            match self.inner.start_link() {
                Ok(link) => {
                    state.link = Some(link);
                    state.spawn_count += 1;
                }
                Err(e) => {
                    if let StoryError::ContextUnavailable(reason) = &e {
                        tracing::warn!(%reason, "off-thread compositing unavailable");
                        state.unavailable = Some(reason.clone());
                    }
                    return Err(e);
                }
            }
        }
        state.leases += 1;
        Ok(ContextLease {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Open a preview surface. Its events arrive on the returned receiver.
    ///
    /// If off-thread compositing is unavailable the instance is inert and a single
    /// [`PreviewEvent::Unsupported`] is sent.
    pub fn open_preview(&self) -> (PreviewInstance, Receiver<PreviewEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let instance = PreviewInstance::open(self.clone(), tx);
        (instance, rx)
    }

    /// Whether the shared context is running.
    pub fn is_active(&self) -> bool {
        self.inner.lock().map(|s| s.link.is_some()).unwrap_or(false)
    }

    /// Number of times the shared context was started.
    pub fn spawn_count(&self) -> u64 {
        self.inner.lock().map(|s| s.spawn_count).unwrap_or(0)
    }

    /// Outstanding continuations.
    pub fn pending_len(&self) -> usize {
        self.inner.lock().map(|s| s.pending.len()).unwrap_or(0)
    }

    /// Counters of the running context, if any.
    pub fn context_stats(&self) -> Option<Arc<ContextStats>> {
        let state = self.inner.lock().ok()?;
        state.link.as_ref().map(|l| l.context.stats())
    }

    /// Forget that `image_id` was shipped and evict it from the context's cache.
    ///
    /// Best effort: failures are logged.
    pub fn clear_image_cache(&self, image_id: &ImageId) {
        let Ok(mut state) = self.inner.lock() else {
            tracing::warn!(%image_id, "clear-cache skipped: scheduler lock poisoned");
            return;
        };
        state.sent_image_ids.remove(image_id);
        let Some(link) = &state.link else {
            return;
        };
        let req = WorkerRequest::ClearCache(ClearCacheRequest {
            image_id: image_id.clone(),
        });
        if let Err(e) = link.context.post(req) {
            tracing::warn!(%image_id, error = %e, "clear-cache failed");
        }
    }

    /// Post a render. The continuation runs on the dispatcher thread; it is dropped unrun if
    /// the request is cancelled or the context is torn down first.
    pub(crate) fn submit(
        &self,
        job: RenderJob,
        resolve: Resolve,
        reject: Reject,
    ) -> StoryResult<RequestId> {
        let mut state = self.inner.lock()?;
        let id = RequestId(self.inner.next_request.fetch_add(1, Ordering::Relaxed));

        let Some(link) = state.link.as_ref() else {
            return Err(StoryError::context_unavailable("no active context lease"));
        };

        let mut source = job.source;
        let mut carries = None;
        if let Some(image_id) = &job.image_id {
            if state.sent_image_ids.contains(image_id) {
                source = None;
            } else if source.is_some() {
                carries = Some(image_id.clone());
            }
        }

        link.context.post(WorkerRequest::Process(ProcessRequest {
            id,
            image_id: job.image_id,
            source,
            params: job.params,
            format: self.inner.opts.preview_format,
        }))?;
        if let Some(image_id) = carries {
            state.sent_image_ids.insert(image_id.clone());
            state.source_carriers.insert(id, image_id);
        }
        state.pending.insert(id, PendingRequest { resolve, reject });
        Ok(id)
    }

    /// Drop continuations so late responses are ignored.
    pub(crate) fn cancel(&self, ids: &[RequestId]) {
        let dropped: Vec<PendingRequest> = match self.inner.lock() {
            Ok(mut state) => ids.iter().filter_map(|id| state.pending.remove(id)).collect(),
            Err(_) => Vec::new(),
        };
        if !dropped.is_empty() {
            tracing::debug!(count = dropped.len(), "cancelled pending requests");
        }
    }

    pub(crate) fn schedule(&self, delay: Duration, task: TimerTask) -> StoryResult<TimerId> {
        let state = self.inner.lock()?;
        let link = state
            .link
            .as_ref()
            .ok_or_else(|| StoryError::context_unavailable("no active context lease"))?;
        link.timers.schedule(delay, task)
    }

    pub(crate) fn cancel_timer(&self, id: TimerId) {
        if let Ok(state) = self.inner.lock()
            && let Some(link) = &state.link
        {
            link.timers.cancel(id);
        }
    }
}

impl SchedulerInner {
    fn lock(&self) -> StoryResult<MutexGuard<'_, SharedState>> {
        self.state.lock().map_err(|_| lock_poisoned("scheduler"))
    }

    fn start_link(self: &Arc<Self>) -> StoryResult<ContextLink> {
        let (context, responses) = ExecutionContext::spawn(self.opts.context.clone())?;
        let timers = TimerQueue::spawn(&format!("{}-timers", self.opts.context.thread_name))?;
        let weak = Arc::downgrade(self);
        let dispatcher = std::thread::Builder::new()
            .name(format!("{}-dispatch", self.opts.context.thread_name))
            .spawn(move || dispatch(weak, responses))
            .map_err(|e| {
                StoryError::context_unavailable(format!("failed to spawn dispatcher thread: {e}"))
            })?;
        Ok(ContextLink {
            context,
            timers,
            dispatcher: Some(dispatcher),
        })
    }

    fn release(&self) {
        let torn_down = {
            let Ok(mut state) = self.lock() else {
                tracing::warn!("context lease released with poisoned scheduler lock");
                return;
            };
            state.leases = state.leases.saturating_sub(1);
            if state.leases > 0 {
                return;
            }
            state.sent_image_ids.clear();
            state.source_carriers.clear();
            let pending: Vec<PendingRequest> = state.pending.drain().map(|(_, p)| p).collect();
            (state.link.take(), pending)
        };
        let (link, pending) = torn_down;
        drop(pending);
        if let Some(link) = link {
            tracing::info!("last preview released; tearing down execution context");
            link.shutdown();
        }
    }
}

fn dispatch(inner: Weak<SchedulerInner>, responses: Receiver<WorkerResponse>) {
    for response in responses.iter() {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let id = response.id();
        let pending = match inner.lock() {
            Ok(mut state) => {
                let carried = state.source_carriers.remove(&id);
                if let (Some(image_id), WorkerResponse::Failed(_)) = (carried, &response) {
                    state.sent_image_ids.remove(&image_id);
                }
                state.pending.remove(&id)
            }
            Err(_) => None,
        };
        let Some(pending) = pending else {
            tracing::debug!(request = id.0, "dropping response for cancelled request");
            continue;
        };
        match response {
            WorkerResponse::Processed(r) => {
                let handle = inner.registry.create(r.image);
                (pending.resolve)(handle);
            }
            WorkerResponse::Failed(e) => (pending.reject)(e.to_error()),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scheduler/shared.rs"]
mod tests;
