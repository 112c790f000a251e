use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{StoryError, StoryResult};

/// One step of the progressive preview: a resolution cap and when to request it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualityTier {
    /// Cap on the longer image side; `None` is full resolution.
    pub max_dimension: Option<u32>,
    /// Delay after a parameter change before this tier is requested.
    pub delay_ms: u64,
}

impl QualityTier {
    /// Build a tier.
    pub const fn new(max_dimension: Option<u32>, delay_ms: u64) -> Self {
        Self {
            max_dimension,
            delay_ms,
        }
    }

    /// Delay as a [`Duration`].
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// 100 px immediately, 400 px after 150 ms, full resolution after 400 ms.
pub fn default_tiers() -> Vec<QualityTier> {
    vec![
        QualityTier::new(Some(100), 0),
        QualityTier::new(Some(400), 150),
        QualityTier::new(None, 400),
    ]
}

/// Tiers must be non-empty, strictly increase in resolution (full resolution only last) and
/// never decrease in delay.
pub fn validate_tiers(tiers: &[QualityTier]) -> StoryResult<()> {
    if tiers.is_empty() {
        return Err(StoryError::validation("at least one quality tier is required"));
    }
    for (i, pair) in tiers.windows(2).enumerate() {
        let (a, b) = (pair[0], pair[1]);
        let increasing = match (a.max_dimension, b.max_dimension) {
            (Some(x), Some(y)) => x < y,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !increasing {
            return Err(StoryError::validation(format!(
                "quality tier {} must have a larger cap than tier {i}",
                i + 1
            )));
        }
        if b.delay_ms < a.delay_ms {
            return Err(StoryError::validation(format!(
                "quality tier {} must not fire before tier {i}",
                i + 1
            )));
        }
    }
    if tiers.iter().any(|t| t.max_dimension == Some(0)) {
        return Err(StoryError::validation("quality tier cap must be > 0"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/scheduler/tiers.rs"]
mod tests;
