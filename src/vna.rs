//! The VNA vendor driver collaborator (spec §1/§6): out of scope to
//! implement, represented here only as the trait the measurement primitive
//! depends on plus an in-process mock used by tests and by the default
//! binary when no vendor driver is wired in.

use crate::model::{FrequencyRange, RangeQuery, SParam};
use async_trait::async_trait;

/// The vendor's sweep-and-measure primitive. A real implementation wraps
/// whatever SCPI/VISA/proprietary SDK the instrument vendor ships;
/// none of that is this crate's concern.
#[async_trait]
pub trait VnaDriver: Send + Sync {
    /// Perform the sweep described by `rq` and return the resulting
    /// S-parameters. The measurement primitive (C2) assigns the result into
    /// `rq.result`; this trait only computes it.
    async fn measure(&self, rq: &RangeQuery) -> Result<Vec<SParam>, String>;

    /// The instrument's supported sweep range, if known.
    fn reasonable_frequency_range(&self) -> Option<FrequencyRange>;
}

/// Deterministic stand-in VNA for tests: synthesizes `size` points spaced
/// across `rq.frequency`, with S-parameters derived from the point index so
/// assertions can distinguish points without needing real RF math.
pub struct MockVnaDriver {
    range: Option<FrequencyRange>,
    fail_with: Option<String>,
}

impl MockVnaDriver {
    pub fn new() -> Self {
        Self {
            range: Some(FrequencyRange {
                start: 1_000_000,
                end: 6_000_000_000,
            }),
            fail_with: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            range: Some(FrequencyRange {
                start: 1_000_000,
                end: 6_000_000_000,
            }),
            fail_with: Some(message.into()),
        }
    }
}

impl Default for MockVnaDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VnaDriver for MockVnaDriver {
    async fn measure(&self, rq: &RangeQuery) -> Result<Vec<SParam>, String> {
        if let Some(message) = &self.fail_with {
            return Err(message.clone());
        }

        let size = rq.size.max(1) as u64;
        let span = rq.frequency.end.saturating_sub(rq.frequency.start);
        let points = (0..size)
            .map(|i| {
                let freq = if size == 1 {
                    rq.frequency.start
                } else {
                    rq.frequency.start + span * i / (size - 1)
                };
                let magnitude = (i as f64 + 1.0) / size as f64;
                let c = crate::model::Complex::new(magnitude, -magnitude);
                SParam::new(freq, c, c, c, c)
            })
            .collect();
        Ok(points)
    }

    fn reasonable_frequency_range(&self) -> Option<FrequencyRange> {
        self.range
    }
}
