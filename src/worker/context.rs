use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::assets::decode::{DecodeOptions, ImageSource, SourceImage, decode_source};
use crate::assets::originals::OriginalsStore;
use crate::encode::EncodedImage;
use crate::foundation::core::ImageId;
use crate::foundation::error::{StoryError, StoryResult};
use crate::render::compositor::composite;
use crate::worker::cache::{ContextStats, DecodeCache};
use crate::worker::protocol::{
    ClearCacheRequest, ProcessError, ProcessRequest, ProcessResponse, WorkerRequest,
    WorkerResponse,
};

/// How to build an [`ExecutionContext`].
#[derive(Clone)]
pub struct ContextOptions {
    /// Name of the worker thread.
    pub thread_name: String,
    /// Decode-time options for sources.
    pub decode: DecodeOptions,
    /// Store consulted on a cache miss when a request has no image data.
    pub originals: Option<Arc<dyn OriginalsStore>>,
    /// When false, spawning fails with [`StoryError::ContextUnavailable`].
    pub offthread_enabled: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            thread_name: "storyframe-worker".to_string(),
            decode: DecodeOptions::default(),
            originals: None,
            offthread_enabled: true,
        }
    }
}

impl std::fmt::Debug for ContextOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextOptions")
            .field("thread_name", &self.thread_name)
            .field("decode", &self.decode)
            .field("originals", &self.originals.is_some())
            .field("offthread_enabled", &self.offthread_enabled)
            .finish()
    }
}

/// Handle to the worker thread that hosts the compositor and the decode cache.
///
/// Messages are processed strictly one at a time in arrival order. Dropping the handle (or
/// calling [`ExecutionContext::terminate`]) skips anything still queued, releases every cached
/// bitmap and joins the thread.
pub struct ExecutionContext {
    tx: Option<Sender<WorkerRequest>>,
    join: Option<JoinHandle<()>>,
    terminated: Arc<AtomicBool>,
    stats: Arc<ContextStats>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("running", &self.tx.is_some())
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    /// Start the worker thread. Responses arrive on the returned receiver.
    pub fn spawn(opts: ContextOptions) -> StoryResult<(Self, Receiver<WorkerResponse>)> {
        if !opts.offthread_enabled {
            return Err(StoryError::context_unavailable(
                "off-thread execution is disabled",
            ));
        }

        let (req_tx, req_rx) = crossbeam_channel::unbounded::<WorkerRequest>();
        let (resp_tx, resp_rx) = crossbeam_channel::unbounded::<WorkerResponse>();
        let terminated = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(ContextStats::default());

        let worker = Worker {
            cache: DecodeCache::new(Arc::clone(&stats)),
            decode: opts.decode,
            originals: opts.originals,
            stats: Arc::clone(&stats),
        };
        let flag = Arc::clone(&terminated);
        let join = std::thread::Builder::new()
            .name(opts.thread_name.clone())
            .spawn(move || worker.run(req_rx, resp_tx, flag))
            .map_err(|e| {
                StoryError::context_unavailable(format!("failed to spawn worker thread: {e}"))
            })?;

        tracing::info!(thread = %opts.thread_name, "execution context started");
        Ok((
            Self {
                tx: Some(req_tx),
                join: Some(join),
                terminated,
                stats,
            },
            resp_rx,
        ))
    }

    /// Queue a message. Never blocks.
    pub fn post(&self, request: WorkerRequest) -> StoryResult<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| StoryError::context_unavailable("execution context terminated"))?;
        tx.send(request).map_err(|_| {
            StoryError::context_unavailable("execution context is not accepting messages")
        })
    }

    /// Decode and cache counters.
    pub fn stats(&self) -> Arc<ContextStats> {
        Arc::clone(&self.stats)
    }

    /// Stop the worker and wait for it to release its cache.
    pub fn terminate(mut self) -> StoryResult<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> StoryResult<()> {
        self.terminated.store(true, Ordering::Release);
        self.tx.take();
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        if join.thread().id() == std::thread::current().id() {
            return Ok(());
        }
        join.join()
            .map_err(|_| StoryError::unknown("worker thread panicked"))?;
        tracing::info!("execution context terminated");
        Ok(())
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "execution context shutdown failed");
        }
    }
}

struct Worker {
    cache: DecodeCache,
    decode: DecodeOptions,
    originals: Option<Arc<dyn OriginalsStore>>,
    stats: Arc<ContextStats>,
}

impl Worker {
    fn run(
        mut self,
        rx: Receiver<WorkerRequest>,
        tx: Sender<WorkerResponse>,
        terminated: Arc<AtomicBool>,
    ) {
        for msg in rx.iter() {
            if terminated.load(Ordering::Acquire) {
                break;
            }
            match msg {
                WorkerRequest::Process(req) => {
                    let response = self.answer(req);
                    if tx.send(response).is_err() {
                        break;
                    }
                }
                WorkerRequest::ClearCache(req) => self.clear_cache(req),
            }
        }
        self.cache.clear();
    }

    fn answer(&mut self, req: ProcessRequest) -> WorkerResponse {
        let id = req.id;
        let outcome = catch_unwind(AssertUnwindSafe(|| self.process(req)))
            .unwrap_or_else(|panic| Err(StoryError::unknown(panic_message(panic.as_ref()))));
        self.stats.record_outcome(outcome.is_ok());
        match outcome {
            Ok(image) => WorkerResponse::Processed(ProcessResponse { id, image }),
            Err(err) => {
                tracing::warn!(request = id.0, error = %err, "process request failed");
                WorkerResponse::Failed(ProcessError::from_error(id, &err))
            }
        }
    }

    fn process(&mut self, req: ProcessRequest) -> StoryResult<EncodedImage> {
        let (image, cached) = self.resolve(&req)?;
        let result = composite(&image, &req.params, req.format);
        if !cached {
            self.cache.release(image);
        }
        result
    }

    /// Cached bitmap for the request's id, or a fresh decode. The flag says whether the
    /// bitmap now lives in the cache.
    fn resolve(&mut self, req: &ProcessRequest) -> StoryResult<(SourceImage, bool)> {
        let Some(image_id) = &req.image_id else {
            let source = req.source.as_ref().ok_or_else(|| {
                StoryError::missing_data("request carries neither an image id nor image data")
            })?;
            let image = decode_source(source, &self.decode)?;
            self.stats.record_decode();
            return Ok((image, false));
        };

        if let Some(image) = self.cache.get(image_id) {
            return Ok((image, true));
        }

        let source = match &req.source {
            Some(source) => source.clone(),
            None => self
                .lookup_original(image_id)?
                .ok_or_else(|| {
                    StoryError::missing_data(format!("no image data for '{image_id}'"))
                })?,
        };
        let image = decode_source(&source, &self.decode)?;
        self.stats.record_decode();
        self.cache.insert(image_id.clone(), image.clone());
        Ok((image, true))
    }

    fn lookup_original(&self, image_id: &ImageId) -> StoryResult<Option<ImageSource>> {
        match &self.originals {
            Some(store) => store.load(image_id),
            None => Ok(None),
        }
    }

    fn clear_cache(&mut self, req: ClearCacheRequest) {
        if !self.cache.evict(&req.image_id) {
            tracing::debug!(image_id = %req.image_id, "clear-cache for uncached image ignored");
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("render panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("render panicked: {s}")
    } else {
        "render panicked".to_string()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/worker/context.rs"]
mod tests;
