use crate::foundation::error::{EditError, EditResult};

/// Timeline position or length in nanoseconds.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct ClockTime(pub u64);

impl ClockTime {
    /// Zero time.
    pub const ZERO: ClockTime = ClockTime(0);
    /// One second.
    pub const SECOND: ClockTime = ClockTime(1_000_000_000);
    /// One millisecond.
    pub const MSECOND: ClockTime = ClockTime(1_000_000);

    /// Build from whole seconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * Self::SECOND.0)
    }

    /// Build from whole milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms * Self::MSECOND.0)
    }

    /// Raw nanoseconds.
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Saturating addition.
    pub fn saturating_add(self, other: ClockTime) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction.
    pub fn saturating_sub(self, other: ClockTime) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Value in (fractional) seconds.
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / Self::SECOND.0 as f64
    }
}

impl std::fmt::Display for ClockTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total_ms = self.0 / Self::MSECOND.0;
        let (h, rem) = (total_ms / 3_600_000, total_ms % 3_600_000);
        let (m, rem) = (rem / 60_000, rem % 60_000);
        let (s, ms) = (rem / 1000, rem % 1000);
        write!(f, "{h}:{m:02}:{s:02}.{ms:03}")
    }
}

/// Half-open timeline interval `[start, start + duration)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeSpan {
    /// Inclusive start.
    pub start: ClockTime,
    /// Length of the interval.
    pub duration: ClockTime,
}

impl TimeSpan {
    /// Build a span; `start + duration` must not overflow.
    pub fn new(start: ClockTime, duration: ClockTime) -> EditResult<Self> {
        if start.0.checked_add(duration.0).is_none() {
            return Err(EditError::validation("TimeSpan end overflows u64"));
        }
        Ok(Self { start, duration })
    }

    /// Exclusive end.
    pub fn end(self) -> ClockTime {
        self.start.saturating_add(self.duration)
    }

    /// Whether the span has zero length.
    pub fn is_empty(self) -> bool {
        self.duration.0 == 0
    }

    /// Whether `t` lies inside the span.
    pub fn contains(self, t: ClockTime) -> bool {
        self.start <= t && t < self.end()
    }

    /// Whether both spans share at least one instant.
    pub fn overlaps(self, other: TimeSpan) -> bool {
        self.overlap(other).is_some()
    }

    /// Intersection `[max(start), min(end))`, `None` when empty.
    pub fn overlap(self, other: TimeSpan) -> Option<TimeSpan> {
        let start = self.start.max(other.start);
        let end = self.end().min(other.end());
        if end > start {
            Some(TimeSpan {
                start,
                duration: ClockTime(end.0 - start.0),
            })
        } else {
            None
        }
    }
}

/// Priority values per layer.
pub const LAYER_HEIGHT: u32 = 1000;
/// First priority available to clip elements; 0 and 1 belong to track-level mixing.
pub const MIN_ELEMENT_PRIORITY: u32 = 2;
/// Priority values owned by one clip priority inside a layer.
pub const CLIP_STRIDE: u32 = 10;
/// Upper bound (exclusive) of clip priorities inside a layer.
pub const MAX_CLIP_PRIORITY: u32 = LAYER_HEIGHT / CLIP_STRIDE - 1;
/// Maximum number of effects per clip on a single track.
pub const MAX_EFFECTS_PER_CLIP: u32 = CLIP_STRIDE - 2;

/// Base element priority of a clip band.
///
/// Lower values are composited on top; `(layer, clip)` pairs map onto a
/// single global order.
pub fn clip_band_base(layer_priority: u32, clip_priority: u32) -> u32 {
    layer_priority * LAYER_HEIGHT + MIN_ELEMENT_PRIORITY + clip_priority * CLIP_STRIDE
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
