/// Quality state of one preview instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewPhase {
    /// Nothing requested yet for the current parameters.
    Idle,
    /// Requests are out; nothing displayed yet. Holds the highest tier requested.
    Awaiting {
        /// Highest requested tier.
        tier: usize,
    },
    /// A result is displayed.
    Displaying {
        /// Tier of the displayed result.
        tier: usize,
    },
}

/// What to do with a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Display it.
    Apply,
    /// Discard it and revoke its handle.
    Stale,
}

/// Generation counter plus monotonic best-tier arbitration.
///
/// A parameter change starts a new generation and resets the best tier to -1. A response is
/// applied only if it belongs to the current generation and its tier is strictly greater than
/// the best tier displayed so far.
#[derive(Clone, Debug)]
pub struct QualityGate {
    generation: u64,
    best: i64,
    phase: PreviewPhase,
    tier_count: usize,
    failures: usize,
    failure_reported: bool,
}

impl QualityGate {
    /// Gate for `tier_count` tiers per generation.
    pub fn new(tier_count: usize) -> Self {
        Self {
            generation: 0,
            best: -1,
            phase: PreviewPhase::Idle,
            tier_count,
            failures: 0,
            failure_reported: false,
        }
    }

    /// Start a new generation; returns its number.
    pub fn begin_generation(&mut self) -> u64 {
        self.generation += 1;
        self.best = -1;
        self.phase = PreviewPhase::Idle;
        self.failures = 0;
        self.failure_reported = false;
        self.generation
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Best displayed tier of the current generation.
    pub fn best(&self) -> Option<usize> {
        usize::try_from(self.best).ok()
    }

    /// Current phase.
    pub fn phase(&self) -> PreviewPhase {
        self.phase
    }

    /// Note that a tier was requested.
    pub fn mark_requested(&mut self, generation: u64, tier: usize) {
        if generation != self.generation {
            return;
        }
        self.phase = match self.phase {
            PreviewPhase::Idle => PreviewPhase::Awaiting { tier },
            PreviewPhase::Awaiting { tier: t } => PreviewPhase::Awaiting { tier: t.max(tier) },
            displaying @ PreviewPhase::Displaying { .. } => displaying,
        };
    }

    /// Decide on a response for `tier` issued under `generation`.
    pub fn offer(&mut self, generation: u64, tier: usize) -> Verdict {
        if generation != self.generation || (tier as i64) <= self.best {
            return Verdict::Stale;
        }
        self.best = tier as i64;
        self.phase = PreviewPhase::Displaying { tier };
        Verdict::Apply
    }

    /// Count a failed tier. Returns true exactly once per generation: when every tier has
    /// failed and nothing was displayed.
    pub fn record_failure(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.failures += 1;
        if self.failures >= self.tier_count && self.best < 0 && !self.failure_reported {
            self.failure_reported = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scheduler/quality.rs"]
mod tests;
