//! Bounded per-pair history for the live monitor.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Entries kept per series unless configured otherwise.
pub const DEFAULT_HISTORY_LEN: usize = 50;

/// Fixed-capacity ring buffer; pushing onto a full buffer evicts the oldest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl<T> HistoryBuffer<T> {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item`, returning the evicted entry if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> HistoryBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// Rolling series kept for one pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairHistory {
    pub deviations_bps: HistoryBuffer<f64>,
    pub observed_forwards: HistoryBuffer<f64>,
    pub pnls: HistoryBuffer<f64>,
}

impl PairHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            deviations_bps: HistoryBuffer::new(capacity),
            observed_forwards: HistoryBuffer::new(capacity),
            pnls: HistoryBuffer::new(capacity),
        }
    }

    pub fn record(&mut self, deviation_bps: f64, observed_forward: f64, pnl: f64) {
        self.deviations_bps.push(deviation_bps);
        self.observed_forwards.push(observed_forward);
        self.pnls.push(pnl);
    }

    /// Cumulative PnL over the buffered entries.
    pub fn equity_curve(&self) -> Vec<f64> {
        self.pnls
            .iter()
            .scan(0.0, |equity, pnl| {
                *equity += pnl;
                Some(*equity)
            })
            .collect()
    }
}
