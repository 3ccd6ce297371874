use alloc::collections::BTreeMap;

use crate::px;
use crate::{Direction, ItemBox, Size};

/// A measured item, margins folded into its outer extents.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemMetrics {
    pub width: f64,
    pub height: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    /// Set by an explicit remeasure request; cleared by the next measurement.
    pub dirty: bool,
}

impl ItemMetrics {
    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }
}

/// Per-index measurement cache plus the running size-per-item estimate.
///
/// The estimate is a cumulative average over every index measured at least once. Re-measuring an
/// index replaces its contribution instead of counting it twice.
#[derive(Clone, Debug, Default)]
pub struct MetricsStore {
    entries: BTreeMap<usize, ItemMetrics>,
    measured_count: usize,
    measured_total: f64,
    warned_unmeasured: bool,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a measurement and returns the new extent along `direction`.
    pub fn record(&mut self, index: usize, measured: &ItemBox, direction: Direction) -> f64 {
        let outer = measured.outer();
        let next = direction.main(outer);
        let entry = ItemMetrics {
            width: outer.width,
            height: outer.height,
            margin_top: measured.margin_top,
            margin_right: measured.margin_right,
            margin_bottom: measured.margin_bottom,
            margin_left: measured.margin_left,
            dirty: false,
        };

        match self.entries.insert(index, entry) {
            Some(prev) => {
                self.measured_total += next - direction.main(prev.size());
            }
            None => {
                self.measured_count += 1;
                self.measured_total += next;
            }
        }
        next
    }

    pub fn get(&self, index: usize) -> Option<&ItemMetrics> {
        self.entries.get(&index)
    }

    pub fn size_of(&self, index: usize, direction: Direction) -> Option<f64> {
        self.entries.get(&index).map(|m| direction.main(m.size()))
    }

    pub fn measured_count(&self) -> usize {
        self.measured_count
    }

    /// The running average item extent, rounded to whole pixels.
    pub fn estimate(&self) -> Option<f64> {
        if self.measured_count == 0 {
            return None;
        }
        Some(px::round(self.measured_total / self.measured_count as f64))
    }

    /// Like [`Self::estimate`], but falls back to `default` when nothing has been measured yet.
    ///
    /// The fallback is logged once per store lifetime (or until [`Self::clear`]).
    pub fn estimate_or(&mut self, default: f64) -> f64 {
        match self.estimate() {
            Some(estimate) => estimate,
            None => {
                if !self.warned_unmeasured {
                    self.warned_unmeasured = true;
                    vwarn!(default, "no items measured yet; using default item size");
                }
                default
            }
        }
    }

    /// Marks a measured entry as stale. Returns `false` when the index was never measured.
    pub fn invalidate(&mut self, index: usize) -> bool {
        match self.entries.get_mut(&index) {
            Some(m) => {
                m.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn is_dirty(&self, index: usize) -> bool {
        self.entries.get(&index).is_some_and(|m| m.dirty)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.measured_count = 0;
        self.measured_total = 0.0;
        self.warned_unmeasured = false;
    }
}
