//! Deduplication of queued hit-collection work.

use std::collections::BTreeMap;

use crate::runner::future::TaskFuture;

/// A half-open range of ranks `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct RankInterval {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl RankInterval {
    pub(crate) fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        RankInterval { start, end }
    }

    pub(crate) fn contains(&self, rank: usize) -> bool {
        rank >= self.start && rank < self.end
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub(crate) fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
}

/// Disjoint rank intervals, each owned by one queued or finished task.
///
/// Every rank belongs to at most one interval, so at most one task ever
/// collects the hits of a given rank.
#[derive(Debug, Default)]
pub(crate) struct IntervalMap {
    intervals: BTreeMap<RankInterval, TaskFuture>,
}

impl IntervalMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The task responsible for `rank`, if one was queued.
    pub(crate) fn covering(&self, rank: usize) -> Option<&TaskFuture> {
        self.preceding(rank)
            .filter(|(interval, _)| interval.contains(rank))
            .map(|(_, future)| future)
    }

    /// The uncovered interval starting at `rank` and extending towards
    /// `desired_end`, stopping at the next queued interval.
    pub(crate) fn gap_from(&self, rank: usize, desired_end: usize) -> RankInterval {
        let start = self
            .preceding(rank)
            .map_or(rank, |(interval, _)| rank.max(interval.end));
        let end = self
            .following(start)
            .map_or(desired_end, |interval| desired_end.min(interval.start));
        RankInterval::new(start, end.max(start))
    }

    /// Every maximal uncovered sub-interval of `[start, end)`.
    pub(crate) fn uncovered(&self, start: usize, end: usize) -> Vec<RankInterval> {
        let mut gaps = Vec::new();
        let mut cursor = self
            .preceding(start)
            .map_or(start, |(interval, _)| start.max(interval.end));

        for interval in self
            .intervals
            .range(RankInterval::new(cursor, cursor)..)
            .map(|(interval, _)| interval)
        {
            if interval.start >= end {
                break;
            }
            if interval.start > cursor {
                gaps.push(RankInterval::new(cursor, interval.start));
            }
            cursor = cursor.max(interval.end);
        }
        if cursor < end {
            gaps.push(RankInterval::new(cursor, end));
        }
        gaps
    }

    pub(crate) fn insert(&mut self, interval: RankInterval, future: TaskFuture) {
        debug_assert!(!interval.is_empty());
        debug_assert!(self.uncovered(interval.start, interval.end) == vec![interval]);
        self.intervals.insert(interval, future);
    }

    /// Settle every registered task as abandoned.
    pub(crate) fn abandon_all(&self) {
        for future in self.intervals.values() {
            future.abandon();
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.intervals.len()
    }

    // Last interval starting at or before `rank`.
    fn preceding(&self, rank: usize) -> Option<(&RankInterval, &TaskFuture)> {
        self.intervals
            .range(..=RankInterval::new(rank, usize::MAX))
            .next_back()
    }

    // First interval starting after `rank`.
    fn following(&self, rank: usize) -> Option<&RankInterval> {
        self.intervals
            .range(RankInterval::new(rank + 1, rank + 1)..)
            .next()
            .map(|(interval, _)| interval)
    }
}
