//! Unbounded FIFO hand-off between the producer and the consumer.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::snapshot::ResultSnapshot;

/// Why a blocking wait returned without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Interrupt {
    /// Cancel/clear requested by the controller.
    Reset,
    /// The producer has finished and will publish nothing more.
    Closed,
}

impl Interrupt {
    // Reset wins: a cancelled run must not be reported as finished.
    fn merge(current: Option<Interrupt>, incoming: Interrupt) -> Interrupt {
        match current {
            Some(Interrupt::Reset) => Interrupt::Reset,
            _ => incoming,
        }
    }
}

#[derive(Debug)]
struct Inner<T> {
    queue: VecDeque<T>,
    interrupt: Option<Interrupt>,
}

/// Strictly FIFO, thread-safe, blocking queue.
///
/// `add` never blocks. `take` blocks until an item is queued or the channel is
/// interrupted; queued items are always handed out before the interruption is
/// reported. The interruption is sticky until [`ResultChannel::clear`].
#[derive(Debug)]
pub struct ResultChannel<T = ResultSnapshot> {
    inner: Mutex<Inner<T>>,
    ready: Condvar,
}

impl<T> Default for ResultChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResultChannel<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                interrupt: None,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue and return the queue depth after insertion.
    pub fn add(&self, item: T) -> usize {
        let mut inner = self.lock();
        inner.queue.push_back(item);
        let depth = inner.queue.len();
        drop(inner);
        self.ready.notify_one();
        depth
    }

    pub fn take(&self) -> Result<T, Interrupt> {
        let mut inner = self.lock();
        loop {
            if let Some(item) = inner.queue.pop_front() {
                return Ok(item);
            }
            if let Some(reason) = inner.interrupt {
                return Err(reason);
            }
            inner = self
                .ready
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn try_take(&self) -> Option<T> {
        self.lock().queue.pop_front()
    }

    /// Wake every blocked `take`.
    pub fn interrupt(&self, reason: Interrupt) {
        let mut inner = self.lock();
        inner.interrupt = Some(Interrupt::merge(inner.interrupt, reason));
        drop(inner);
        self.ready.notify_all();
    }

    /// Drop queued items and any pending interruption.
    ///
    /// Only valid while no producer is alive.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.queue.clear();
        inner.interrupt = None;
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn delivers_in_publish_order() {
        let ch = Arc::new(ResultChannel::new());
        let producer = {
            let ch = Arc::clone(&ch);
            thread::spawn(move || {
                for i in 0..500u32 {
                    ch.add(i);
                }
                ch.interrupt(Interrupt::Closed);
            })
        };

        let mut seen = Vec::new();
        while let Ok(v) = ch.take() {
            seen.push(v);
        }
        producer.join().unwrap();
        assert_eq!(seen, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn interrupt_wakes_blocked_take() {
        let ch: Arc<ResultChannel<u8>> = Arc::new(ResultChannel::new());
        let waiter = {
            let ch = Arc::clone(&ch);
            thread::spawn(move || ch.take())
        };
        thread::sleep(Duration::from_millis(20));
        ch.interrupt(Interrupt::Reset);
        assert_eq!(waiter.join().unwrap(), Err(Interrupt::Reset));
    }

    #[test]
    fn queued_items_outrank_interrupt() {
        let ch = ResultChannel::new();
        ch.add(1);
        ch.interrupt(Interrupt::Closed);
        assert_eq!(ch.take(), Ok(1));
        assert_eq!(ch.take(), Err(Interrupt::Closed));
    }

    #[test]
    fn reset_is_not_downgraded_to_closed() {
        let ch: ResultChannel<u8> = ResultChannel::new();
        ch.interrupt(Interrupt::Reset);
        ch.interrupt(Interrupt::Closed);
        assert_eq!(ch.take(), Err(Interrupt::Reset));
    }

    #[test]
    fn clear_drops_items_and_interrupt() {
        let ch = ResultChannel::new();
        assert_eq!(ch.add('a'), 1);
        assert_eq!(ch.add('b'), 2);
        ch.interrupt(Interrupt::Reset);
        ch.clear();
        assert!(ch.is_empty());
        ch.add('c');
        assert_eq!(ch.len(), 1);
        assert_eq!(ch.take(), Ok('c'));
        assert_eq!(ch.try_take(), None);
    }
}
