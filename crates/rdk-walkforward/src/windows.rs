//! Window geometry.
//!
//! Ranges are half-open candle index ranges. Within a window the in-sample
//! range ends where the out-of-sample range starts. Across windows the
//! out-of-sample ranges are adjacent and disjoint in both modes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// Fixed-length window sliding forward by the out-of-sample length.
    Rolling,
    /// In-sample always starts at 0 and grows by one out-of-sample length.
    Anchored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRange {
    pub start: usize,
    pub end: usize,
}

impl IndexRange {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &IndexRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub index: usize,
    pub in_sample: IndexRange,
    pub out_of_sample: IndexRange,
}

/// Split `len` candles into `windows` windows. Returns an empty plan when a
/// window would fall below the minimum in-sample or out-of-sample length.
pub fn plan_windows(
    len: usize,
    windows: usize,
    in_sample_fraction: f64,
    mode: WindowMode,
    min_in_sample: usize,
    min_out_of_sample: usize,
) -> Vec<WindowSpec> {
    if windows == 0 || len == 0 || !(in_sample_fraction > 0.0 && in_sample_fraction < 1.0) {
        return Vec::new();
    }
    let n = windows as f64;
    let oos_frac = 1.0 - in_sample_fraction;

    let (is0, oos, step_is_start) = match mode {
        WindowMode::Rolling => {
            let w = (len as f64 / (1.0 + (n - 1.0) * oos_frac)).floor() as usize;
            let oos = (w as f64 * oos_frac).floor() as usize;
            (w.saturating_sub(oos), oos, true)
        }
        WindowMode::Anchored => {
            let oos = (len as f64 / (n + in_sample_fraction / oos_frac)).floor() as usize;
            (len.saturating_sub(windows * oos), oos, false)
        }
    };
    if oos < min_out_of_sample.max(1) || is0 < min_in_sample.max(1) {
        return Vec::new();
    }

    (0..windows)
        .map(|k| {
            let offset = k * oos;
            let (is_start, is_end) = if step_is_start {
                (offset, offset + is0)
            } else {
                (0, is0 + offset)
            };
            WindowSpec {
                index: k,
                in_sample: IndexRange {
                    start: is_start,
                    end: is_end,
                },
                out_of_sample: IndexRange {
                    start: is_end,
                    end: is_end + oos,
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_geometry() {
        // w = 1000 / (1 + 4 × 0.3) = 454, oos = 136, is = 318
        let plan = plan_windows(1_000, 5, 0.7, WindowMode::Rolling, 10, 10);
        assert_eq!(plan.len(), 5);
        assert_eq!(plan[0].in_sample, IndexRange { start: 0, end: 318 });
        assert_eq!(plan[0].out_of_sample, IndexRange { start: 318, end: 454 });
        assert_eq!(plan[1].in_sample.start, 136);
        assert!(plan[4].out_of_sample.end <= 1_000);
        assert!(plan.iter().all(|w| w.in_sample.len() == 318));
    }

    #[test]
    fn anchored_geometry_partitions_tail() {
        let plan = plan_windows(1_000, 5, 0.7, WindowMode::Anchored, 10, 10);
        assert_eq!(plan.len(), 5);
        assert!(plan.iter().all(|w| w.in_sample.start == 0));
        assert_eq!(plan[4].out_of_sample.end, 1_000);
        for pair in plan.windows(2) {
            assert_eq!(pair[0].out_of_sample.end, pair[1].out_of_sample.start);
            assert!(pair[1].in_sample.end > pair[0].in_sample.end);
        }
    }

    #[test]
    fn too_short_series_gives_no_windows() {
        assert!(plan_windows(40, 5, 0.7, WindowMode::Rolling, 50, 20).is_empty());
        assert!(plan_windows(1_000, 0, 0.7, WindowMode::Rolling, 50, 20).is_empty());
        assert!(plan_windows(1_000, 5, 1.0, WindowMode::Rolling, 50, 20).is_empty());
    }
}
