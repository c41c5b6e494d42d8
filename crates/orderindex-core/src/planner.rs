//! Block-range planning for catch-up passes.
//!
//! Turns "everything after `last_block` up to `current_block`" into a lazy
//! sequence of inclusive [`QueryWindow`]s. Both bounds of a window are
//! inclusive (as in `eth_getLogs`), so consecutive windows advance by
//! `max_window + 1` blocks: `[a, a + max_window]`, `[a + max_window + 1, …]`.
//! The plan is a pure function of its inputs and can be recomputed at any
//! time.

use serde::{Deserialize, Serialize};

use crate::error::IndexerError;

/// An inclusive block range queried in a single log request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryWindow {
    pub from_block: u64,
    pub to_block: u64,
}

impl QueryWindow {
    pub fn new(from_block: u64, to_block: u64) -> Self {
        Self { from_block, to_block }
    }

    /// Number of blocks covered by this window.
    pub fn block_count(&self) -> u64 {
        self.to_block - self.from_block + 1
    }

    /// Returns `true` if `block` lies inside the window.
    pub fn contains(&self, block: u64) -> bool {
        (self.from_block..=self.to_block).contains(&block)
    }
}

impl std::fmt::Display for QueryWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.from_block, self.to_block)
    }
}

/// Plan the windows needed to move from `last_block` to `current_block`.
///
/// `max_window == 0` means unbounded: a single window covers the whole gap.
pub fn plan(last_block: u64, current_block: u64, max_window: u64) -> Result<WindowPlan, IndexerError> {
    if current_block < last_block {
        return Err(IndexerError::InvalidCheckpoint {
            checkpoint: last_block,
            height: current_block,
        });
    }
    Ok(WindowPlan {
        // `None` once exhausted; also covers `last_block == u64::MAX`.
        next: last_block.checked_add(1).filter(|start| *start <= current_block),
        end: current_block,
        max_window,
    })
}

/// Lazy iterator over the windows of one catch-up pass.
#[derive(Debug, Clone)]
pub struct WindowPlan {
    next: Option<u64>,
    end: u64,
    max_window: u64,
}

impl WindowPlan {
    /// Windows still to be yielded.
    pub fn remaining(&self) -> u64 {
        match self.next {
            None => 0,
            Some(_) if self.max_window == 0 => 1,
            Some(start) => {
                let step = self.max_window.saturating_add(1);
                (self.end - start) / step + 1
            }
        }
    }
}

impl Iterator for WindowPlan {
    type Item = QueryWindow;

    fn next(&mut self) -> Option<QueryWindow> {
        let start = self.next?;
        let to = if self.max_window == 0 {
            self.end
        } else {
            start.saturating_add(self.max_window).min(self.end)
        };
        self.next = to.checked_add(1).filter(|n| *n <= self.end);
        Some(QueryWindow::new(start, to))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining()) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows(last: u64, current: u64, max: u64) -> Vec<(u64, u64)> {
        plan(last, current, max)
            .unwrap()
            .map(|w| (w.from_block, w.to_block))
            .collect()
    }

    #[test]
    fn end_to_end_scenario() {
        assert_eq!(
            windows(1000, 1050, 20),
            vec![(1001, 1021), (1022, 1042), (1043, 1050)]
        );
    }

    #[test]
    fn nothing_new() {
        assert!(windows(500, 500, 10).is_empty());
        assert_eq!(plan(500, 500, 10).unwrap().remaining(), 0);
    }

    #[test]
    fn checkpoint_ahead_of_chain() {
        let err = plan(101, 100, 10).unwrap_err();
        assert!(matches!(
            err,
            IndexerError::InvalidCheckpoint { checkpoint: 101, height: 100 }
        ));
    }

    #[test]
    fn unbounded_window() {
        assert_eq!(windows(10, 5000, 0), vec![(11, 5000)]);
    }

    #[test]
    fn single_block_gap() {
        assert_eq!(windows(41, 42, 100), vec![(42, 42)]);
    }

    #[test]
    fn smallest_bounded_window_spans_two_blocks() {
        // max_window = 0 is unbounded, so the smallest bounded window spans 2 blocks.
        assert_eq!(windows(0, 5, 1), vec![(1, 2), (3, 4), (5, 5)]);
    }

    #[test]
    fn windows_are_contiguous_and_cover_range() {
        for &(last, current, max) in &[
            (0u64, 1u64, 1u64),
            (0, 100, 7),
            (17, 1000, 99),
            (1000, 1001, 1000),
            (5, 64, 3),
            (123, 9999, 250),
        ] {
            let ws: Vec<QueryWindow> = plan(last, current, max).unwrap().collect();
            assert_eq!(ws.first().unwrap().from_block, last + 1);
            assert_eq!(ws.last().unwrap().to_block, current);
            for w in &ws {
                assert!(w.from_block <= w.to_block);
                assert!(w.block_count() <= max + 1, "{w} wider than {}", max + 1);
            }
            for pair in ws.windows(2) {
                assert_eq!(pair[1].from_block, pair[0].to_block + 1);
            }
            let covered: u64 = ws.iter().map(QueryWindow::block_count).sum();
            assert_eq!(covered, current - last);
        }
    }

    #[test]
    fn remaining_matches_yielded() {
        let p = plan(1000, 1050, 20).unwrap();
        assert_eq!(p.remaining(), 3);
        assert_eq!(p.count(), 3);
    }

    #[test]
    fn plan_is_restartable() {
        let first: Vec<_> = plan(7, 300, 13).unwrap().collect();
        let again: Vec<_> = plan(7, 300, 13).unwrap().collect();
        assert_eq!(first, again);
    }

    #[test]
    fn no_overflow_near_u64_max() {
        let ws = windows(u64::MAX - 3, u64::MAX, u64::MAX);
        assert_eq!(ws, vec![(u64::MAX - 2, u64::MAX)]);
        assert!(windows(u64::MAX, u64::MAX, 5).is_empty());
    }
}
