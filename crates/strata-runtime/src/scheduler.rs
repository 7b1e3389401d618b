use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use strata_tiles::ChunkKey;

/// Time source for budget checks.
pub trait Clock {
    /// Time since an arbitrary fixed epoch.
    fn now(&self) -> Duration;
}

pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    #[inline]
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Clock advanced by hand; for fixed-step hosts and tests.
#[derive(Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> Duration {
        self.now.get()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameBudget {
    pub max_jobs: usize,
    pub budget_ms: u64,
}

impl Default for FrameBudget {
    fn default() -> Self {
        Self {
            max_jobs: 3,
            budget_ms: 8,
        }
    }
}

impl FrameBudget {
    #[inline]
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub processed: usize,
    /// Jobs still queued when the tick returned.
    pub deferred: usize,
    pub elapsed: Duration,
}

/// FIFO of chunks awaiting work, at most one entry per chunk.
#[derive(Default)]
pub struct FrameScheduler {
    queue: VecDeque<ChunkKey>,
    pending: HashSet<ChunkKey>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `key`; a chunk already queued keeps its place. Returns whether
    /// a new job was added.
    pub fn enqueue(&mut self, key: ChunkKey) -> bool {
        if !self.pending.insert(key) {
            return false;
        }
        self.queue.push_back(key);
        true
    }

    /// Removes any queued job for `key`.
    pub fn cancel(&mut self, key: ChunkKey) -> bool {
        if !self.pending.remove(&key) {
            return false;
        }
        self.queue.retain(|k| *k != key);
        true
    }

    #[inline]
    pub fn contains(&self, key: ChunkKey) -> bool {
        self.pending.contains(&key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.queue.iter().copied()
    }

    /// Runs queued jobs in order until `budget.max_jobs` have run or the
    /// elapsed time reaches the budget. The check happens before each job, so
    /// a slow job finishes and the rest wait for the next tick; nothing is
    /// dropped.
    pub fn tick<F>(&mut self, budget: &FrameBudget, clock: &dyn Clock, mut work: F) -> TickReport
    where
        F: FnMut(ChunkKey),
    {
        let start = clock.now();
        let limit = budget.budget();
        let mut processed = 0usize;
        while processed < budget.max_jobs {
            if clock.now().saturating_sub(start) >= limit {
                break;
            }
            let Some(key) = self.queue.pop_front() else {
                break;
            };
            self.pending.remove(&key);
            work(key);
            processed += 1;
        }
        let elapsed = clock.now().saturating_sub(start);
        if !self.queue.is_empty() {
            log::trace!(
                "scheduler: ran {} job(s) in {:?}, {} deferred",
                processed,
                elapsed,
                self.queue.len()
            );
        }
        TickReport {
            processed,
            deferred: self.queue.len(),
            elapsed,
        }
    }
}
