use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crossbeam_channel::Sender;

use crate::assets::decode::ImageSource;
use crate::foundation::core::ImageId;
use crate::foundation::error::{StoryError, StoryResult};
use crate::params::CompositingParameters;
use crate::scheduler::handles::{DisplayHandle, HandleRegistry};
use crate::scheduler::quality::{PreviewPhase, QualityGate, Verdict};
use crate::scheduler::shared::{ContextLease, PreviewScheduler, RenderJob};
use crate::scheduler::timer::TimerId;
use crate::worker::protocol::RequestId;

/// What a preview reports to its owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PreviewEvent {
    /// A better result is ready. The previously displayed handle, if any, is revoked.
    Displayed {
        /// Generation the result belongs to.
        generation: u64,
        /// Tier index of the result.
        tier: usize,
        /// Handle to display.
        handle: DisplayHandle,
    },
    /// Every tier of a generation failed and nothing is displayed.
    Failed {
        /// Generation that failed.
        generation: u64,
        /// User-facing message.
        message: String,
    },
    /// A tier failed while an earlier result stays on display.
    TierFailed {
        /// Generation the tier belongs to.
        generation: u64,
        /// Tier index that failed.
        tier: usize,
        /// Cause.
        error: String,
    },
    /// Off-thread compositing is not available; the preview will never render.
    Unsupported {
        /// Why the context could not be started.
        reason: String,
    },
}

struct InstanceState {
    gate: QualityGate,
    active: Option<DisplayHandle>,
    timers: Vec<TimerId>,
    requests: Vec<RequestId>,
    closed: bool,
}

type SharedInstance = Arc<Mutex<InstanceState>>;

fn lock(state: &Mutex<InstanceState>) -> MutexGuard<'_, InstanceState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One interactive preview surface.
///
/// Each [`PreviewInstance::update`] starts a new generation: outstanding timers and requests of
/// the previous one are cancelled and every tier is requested again, the first one right away
/// and the rest after their delays. Results only ever improve within a generation.
pub struct PreviewInstance {
    scheduler: PreviewScheduler,
    state: SharedInstance,
    events: Sender<PreviewEvent>,
    lease: Option<ContextLease>,
}

impl std::fmt::Debug for PreviewInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewInstance")
            .field("generation", &self.generation())
            .field("phase", &self.phase())
            .field("supported", &self.lease.is_some())
            .finish()
    }
}

/// Everything a tier needs to fire, shared by the immediate path and the timer path.
#[derive(Clone)]
struct TierRequest {
    scheduler: PreviewScheduler,
    state: Weak<Mutex<InstanceState>>,
    events: Sender<PreviewEvent>,
    generation: u64,
    tier: usize,
    job: RenderJob,
}

impl PreviewInstance {
    pub(crate) fn open(scheduler: PreviewScheduler, events: Sender<PreviewEvent>) -> Self {
        let lease = match scheduler.acquire() {
            Ok(lease) => Some(lease),
            Err(e) => {
                let _ = events.send(PreviewEvent::Unsupported {
                    reason: e.to_string(),
                });
                None
            }
        };
        let tier_count = scheduler.tiers().len();
        Self {
            scheduler,
            state: Arc::new(Mutex::new(InstanceState {
                gate: QualityGate::new(tier_count),
                active: None,
                timers: Vec::new(),
                requests: Vec::new(),
                closed: false,
            })),
            events,
            lease,
        }
    }

    /// Whether this preview has a running context behind it.
    pub fn is_supported(&self) -> bool {
        self.lease.is_some()
    }

    /// Current generation; 0 before the first update.
    pub fn generation(&self) -> u64 {
        lock(&self.state).gate.generation()
    }

    /// Current quality phase.
    pub fn phase(&self) -> PreviewPhase {
        lock(&self.state).gate.phase()
    }

    /// Handle currently on display.
    pub fn active_handle(&self) -> Option<DisplayHandle> {
        lock(&self.state).active.clone()
    }

    /// Re-render for new parameters. Returns the new generation.
    ///
    /// `source` may be omitted once the image was shipped under `image_id`.
    #[tracing::instrument(level = "debug", skip(self, source, params))]
    pub fn update(
        &self,
        image_id: Option<ImageId>,
        source: Option<ImageSource>,
        params: &CompositingParameters,
    ) -> StoryResult<u64> {
        if self.lease.is_none() {
            return Err(StoryError::context_unavailable(
                "off-thread compositing is not available",
            ));
        }
        params.validate()?;

        let (generation, timers, requests) = {
            let mut state = lock(&self.state);
            let timers = std::mem::take(&mut state.timers);
            let requests = std::mem::take(&mut state.requests);
            (state.gate.begin_generation(), timers, requests)
        };
        for id in timers {
            self.scheduler.cancel_timer(id);
        }
        self.scheduler.cancel(&requests);

        for (tier, quality) in self.scheduler.tiers().iter().enumerate() {
            let req = TierRequest {
                scheduler: self.scheduler.clone(),
                state: Arc::downgrade(&self.state),
                events: self.events.clone(),
                generation,
                tier,
                job: RenderJob {
                    image_id: image_id.clone(),
                    source: source.clone(),
                    params: params.with_max_dimension(quality.max_dimension),
                },
            };
            if quality.delay_ms == 0 {
                req.fire();
                continue;
            }
            let id = self
                .scheduler
                .schedule(quality.delay(), Box::new(move || req.fire()))?;
            let mut state = lock(&self.state);
            if state.gate.generation() == generation {
                state.timers.push(id);
            } else {
                drop(state);
                self.scheduler.cancel_timer(id);
            }
        }
        Ok(generation)
    }
}

impl TierRequest {
    fn fire(self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let mut guard = lock(&state);
        if guard.closed || guard.gate.generation() != self.generation {
            return;
        }
        guard.gate.mark_requested(self.generation, self.tier);

        let resolve = {
            let state = self.state.clone();
            let events = self.events.clone();
            let registry = self.scheduler.registry().clone();
            let (generation, tier) = (self.generation, self.tier);
            Box::new(move |handle: DisplayHandle| {
                accept(&state, &events, &registry, generation, tier, handle);
            })
        };
        let reject = {
            let state = self.state.clone();
            let events = self.events.clone();
            let (generation, tier) = (self.generation, self.tier);
            Box::new(move |err: StoryError| {
                tracing::warn!(generation, tier, error = %err, "preview tier failed");
                if let Some(state) = state.upgrade() {
                    fail(&mut lock(&state), &events, generation, tier, &err);
                }
            })
        };

        match self.scheduler.submit(self.job, resolve, reject) {
            Ok(id) => guard.requests.push(id),
            Err(e) => {
                tracing::warn!(
                    generation = self.generation,
                    tier = self.tier,
                    error = %e,
                    "failed to submit preview tier"
                );
                fail(&mut guard, &self.events, self.generation, self.tier, &e);
            }
        }
    }
}

/// Display `handle` if it beats the current result, otherwise revoke it right away.
///
/// Whichever handle ends up off screen (the replaced one or the rejected one) is revoked.
fn accept(
    state: &Weak<Mutex<InstanceState>>,
    events: &Sender<PreviewEvent>,
    registry: &HandleRegistry,
    generation: u64,
    tier: usize,
    handle: DisplayHandle,
) {
    let replaced = match state.upgrade() {
        Some(state) => {
            let mut guard = lock(&state);
            if guard.closed {
                Some(handle)
            } else {
                match guard.gate.offer(generation, tier) {
                    Verdict::Apply => {
                        let old = guard.active.replace(handle.clone());
                        let _ = events.send(PreviewEvent::Displayed {
                            generation,
                            tier,
                            handle,
                        });
                        old
                    }
                    Verdict::Stale => {
                        tracing::trace!(generation, tier, "discarding stale result");
                        Some(handle)
                    }
                }
            }
        }
        None => Some(handle),
    };
    if let Some(old) = replaced {
        registry.revoke(&old);
    }
}

/// Count a failed tier. Reports `Failed` once every tier failed with nothing displayed, and
/// `TierFailed` when a result is already on display.
fn fail(
    state: &mut InstanceState,
    events: &Sender<PreviewEvent>,
    generation: u64,
    tier: usize,
    err: &StoryError,
) {
    if state.closed {
        return;
    }
    if state.gate.record_failure(generation) {
        let _ = events.send(PreviewEvent::Failed {
            generation,
            message: format!("couldn't render preview: {err}"),
        });
    } else if state.gate.generation() == generation && state.gate.best().is_some() {
        let _ = events.send(PreviewEvent::TierFailed {
            generation,
            tier,
            error: err.to_string(),
        });
    }
}

impl Drop for PreviewInstance {
    fn drop(&mut self) {
        let (timers, requests, active) = {
            let mut state = lock(&self.state);
            state.closed = true;
            (
                std::mem::take(&mut state.timers),
                std::mem::take(&mut state.requests),
                state.active.take(),
            )
        };
        for id in timers {
            self.scheduler.cancel_timer(id);
        }
        self.scheduler.cancel(&requests);
        if let Some(handle) = active {
            self.scheduler.registry().revoke(&handle);
        }
        self.lease.take();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scheduler/preview.rs"]
mod tests;
