//! Ordered, bounded handoff between parallel workers and one consumer.
//!
//! Workers finish items in any order but may only [`push`] when their index
//! equals the release cursor, and only while the queue has room. The
//! consumer therefore [`pop`]s items in exactly the input order.
//!
//! ```text
//!  worker 2 ─┐ (waits: not its turn)
//!  worker 0 ─┼─▶ push(0) ─▶ [0][1].. ─▶ pop() ─▶ consumer
//!  worker 1 ─┘ (waits: queue full)
//! ```
//!
//! Blocking is done with `Mutex + Condvar`; nothing polls.
//!
//! [`push`]: OrderedWorkQueue::push
//! [`pop`]: OrderedWorkQueue::pop

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use thiserror::Error;

/// Returned by [`OrderedWorkQueue::push`] after [`OrderedWorkQueue::abort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ordered queue was aborted")]
pub struct QueueAborted;

#[derive(Debug)]
struct State<T> {
    items: VecDeque<(usize, T)>,
    release_cursor: usize,
    drained: usize,
    peak: usize,
    aborted: bool,
}

/// Bounded queue that releases items strictly by increasing index.
#[derive(Debug)]
pub struct OrderedWorkQueue<T> {
    total: usize,
    capacity: usize,
    state: Mutex<State<T>>,
    /// Workers waiting for their turn or for room.
    turn: Condvar,
    /// Consumer waiting for an item.
    ready: Condvar,
}

impl<T> OrderedWorkQueue<T> {
    /// Queue for exactly `total` items, holding at most `capacity` (min 1) at once.
    pub fn new(total: usize, capacity: usize) -> Self {
        Self {
            total,
            capacity: capacity.max(1),
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity.max(1)),
                release_cursor: 0,
                drained: 0,
                peak: 0,
                aborted: false,
            }),
            turn: Condvar::new(),
            ready: Condvar::new(),
        }
    }

    #[inline]
    fn lock_or_recover(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items currently queued.
    pub fn len(&self) -> usize {
        self.lock_or_recover().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest number of items queued at once so far.
    pub fn peak_len(&self) -> usize {
        self.lock_or_recover().peak
    }

    /// Next index allowed to enter the queue.
    pub fn release_cursor(&self) -> usize {
        self.lock_or_recover().release_cursor
    }

    pub fn is_aborted(&self) -> bool {
        self.lock_or_recover().aborted
    }

    /// Enqueue the result for `index`.
    ///
    /// Blocks until every lower index has been pushed and the queue has room.
    /// Each index in `0..total` must be pushed exactly once, otherwise later
    /// indices wait forever (or until [`abort`](Self::abort)).
    pub fn push(&self, index: usize, item: T) -> Result<(), QueueAborted> {
        debug_assert!(index < self.total, "index {} out of range {}", index, self.total);
        let mut st = self.lock_or_recover();
        loop {
            if st.aborted {
                return Err(QueueAborted);
            }
            if st.release_cursor == index && st.items.len() < self.capacity {
                break;
            }
            st = self
                .turn
                .wait(st)
                .unwrap_or_else(|poison| poison.into_inner());
        }
        st.items.push_back((index, item));
        st.release_cursor += 1;
        st.peak = st.peak.max(st.items.len());
        drop(st);
        // The next index may already be waiting.
        self.turn.notify_all();
        self.ready.notify_one();
        Ok(())
    }

    /// Dequeue the next item in index order.
    ///
    /// Blocks while empty. Returns `None` once all `total` items have been
    /// popped, or after [`abort`](Self::abort).
    pub fn pop(&self) -> Option<(usize, T)> {
        let mut st = self.lock_or_recover();
        loop {
            if st.aborted || st.drained >= self.total {
                return None;
            }
            if let Some(entry) = st.items.pop_front() {
                st.drained += 1;
                drop(st);
                self.turn.notify_all();
                return Some(entry);
            }
            st = self
                .ready
                .wait(st)
                .unwrap_or_else(|poison| poison.into_inner());
        }
    }

    /// Stop the queue: pending and future `push` calls fail, `pop` returns `None`.
    ///
    /// Queued items are dropped.
    pub fn abort(&self) {
        let mut st = self.lock_or_recover();
        st.aborted = true;
        st.items.clear();
        drop(st);
        self.turn.notify_all();
        self.ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn sequential_push_pop() {
        let q = OrderedWorkQueue::new(3, 4);
        q.push(0, "a").unwrap();
        q.push(1, "b").unwrap();
        assert_eq!(q.pop(), Some((0, "a")));
        q.push(2, "c").unwrap();
        assert_eq!(q.pop(), Some((1, "b")));
        assert_eq!(q.pop(), Some((2, "c")));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn empty_queue_is_exhausted_immediately() {
        let q: OrderedWorkQueue<()> = OrderedWorkQueue::new(0, 1);
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn out_of_order_pushes_are_released_in_order() {
        let n = 32;
        let q = OrderedWorkQueue::new(n, 4);
        let popped = std::thread::scope(|s| {
            // Push in reverse: each thread must wait for its predecessors.
            for i in (0..n).rev() {
                let q = &q;
                s.spawn(move || {
                    std::thread::sleep(Duration::from_millis(((n - i) % 5) as u64));
                    q.push(i, i * 10).unwrap();
                });
            }
            let mut out = Vec::new();
            while let Some((idx, v)) = q.pop() {
                out.push((idx, v));
            }
            out
        });
        let expected: Vec<_> = (0..n).map(|i| (i, i * 10)).collect();
        assert_eq!(popped, expected);
    }

    #[test]
    fn capacity_bounds_queue_with_stalled_consumer() {
        let n = 20;
        let q = OrderedWorkQueue::new(n, 3);
        let pushed = AtomicUsize::new(0);
        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..n {
                    q.push(i, i).unwrap();
                    pushed.fetch_add(1, Ordering::SeqCst);
                }
            });
            std::thread::sleep(Duration::from_millis(100));
            assert_eq!(pushed.load(Ordering::SeqCst), 3);
            assert_eq!(q.len(), 3);
            while q.pop().is_some() {}
        });
        assert_eq!(q.peak_len(), 3);
        assert_eq!(pushed.load(Ordering::SeqCst), n);
    }

    #[test]
    fn abort_wakes_blocked_pushers_and_consumer() {
        let q = OrderedWorkQueue::new(4, 1);
        std::thread::scope(|s| {
            let waiting_push = s.spawn(|| q.push(2, ()));
            let waiting_pop = s.spawn(|| {
                // first pop succeeds only if index 0 arrives; it never does
                q.pop()
            });
            std::thread::sleep(Duration::from_millis(50));
            q.abort();
            assert_eq!(waiting_push.join().unwrap(), Err(QueueAborted));
            assert_eq!(waiting_pop.join().unwrap(), None);
        });
        assert!(q.is_aborted());
        assert_eq!(q.push(0, ()), Err(QueueAborted));
    }
}
