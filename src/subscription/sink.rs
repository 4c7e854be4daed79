//! Bounded per-subscription indication sink (spec.md §4.5, §4.6).
//!
//! One [`Sink`] per admitted subscription, single producer (the router's
//! indication-dispatch path), single consumer (whatever the xApp is doing
//! with `Subscription::indications`). Modeled on the teacher's
//! `with_outstanding_change` bounded-queue discipline for no_key history
//! caches: a `parking_lot::Mutex`-guarded ring buffer plus a `Notify` rather
//! than `tokio::mpsc`, because `mpsc` has no story for "drop the oldest
//! entry instead of blocking the writer."

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::timeout;

/// Backpressure policy applied when a sink is at capacity (spec.md §6,
/// config key `sink_policy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkPolicy {
  /// Evict the oldest buffered indication to make room for the new one.
  DropOldest,
  /// Refuse the new indication, keeping what's already buffered.
  DropNewest,
  /// Wait up to `t_sink_wait` for room; past that, degrade to `DropNewest`
  /// (spec.md §4.6: a sink must never hold up the association's reader
  /// task indefinitely).
  Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
  Enqueued,
  DroppedOldest,
  DroppedNewest,
}

struct State<T> {
  queue: VecDeque<T>,
  closed: bool,
  /// Envelopes evicted by `DropOldest` since the last [`Sink::take_lagged`]
  /// (spec.md §6, the xApp-facing `Lagged(n)` signal).
  lagged: u64,
}

pub struct Sink<T> {
  capacity: usize,
  policy: SinkPolicy,
  wait: Duration,
  state: Mutex<State<T>>,
  readable: Notify,
  writable: Notify,
}

impl<T> Sink<T> {
  pub fn new(capacity: usize, policy: SinkPolicy, wait: Duration) -> Self {
    Self {
      capacity: capacity.max(1),
      policy,
      wait,
      state: Mutex::new(State {
        queue: VecDeque::with_capacity(capacity.max(1)),
        closed: false,
        lagged: 0,
      }),
      readable: Notify::new(),
      writable: Notify::new(),
    }
  }

  pub fn policy(&self) -> SinkPolicy {
    self.policy
  }

  pub fn len(&self) -> usize {
    self.state.lock().queue.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Enqueue one item, applying the configured backpressure policy when
  /// the sink is full.
  pub async fn push(&self, item: T) -> PushOutcome {
    match self.policy {
      SinkPolicy::DropOldest => {
        let mut state = self.state.lock();
        let dropped = state.queue.len() >= self.capacity;
        if dropped {
          state.queue.pop_front();
          state.lagged += 1;
        }
        state.queue.push_back(item);
        drop(state);
        self.readable.notify_one();
        if dropped {
          PushOutcome::DroppedOldest
        } else {
          PushOutcome::Enqueued
        }
      }
      SinkPolicy::DropNewest => {
        let mut state = self.state.lock();
        if state.queue.len() >= self.capacity {
          PushOutcome::DroppedNewest
        } else {
          state.queue.push_back(item);
          drop(state);
          self.readable.notify_one();
          PushOutcome::Enqueued
        }
      }
      SinkPolicy::Block => {
        loop {
          {
            let mut state = self.state.lock();
            if state.queue.len() < self.capacity {
              state.queue.push_back(item);
              drop(state);
              self.readable.notify_one();
              return PushOutcome::Enqueued;
            }
          }
          let notified = self.writable.notified();
          if timeout(self.wait, notified).await.is_err() {
            // Degrade to DropNewest once the wait budget is spent.
            let mut state = self.state.lock();
            if state.queue.len() < self.capacity {
              state.queue.push_back(item);
              drop(state);
              self.readable.notify_one();
              return PushOutcome::Enqueued;
            }
            return PushOutcome::DroppedNewest;
          }
        }
      }
    }
  }

  /// Dequeue one item, waiting if the sink is currently empty. Returns
  /// `None` once closed and drained.
  pub async fn recv(&self) -> Option<T> {
    loop {
      {
        let mut state = self.state.lock();
        if let Some(item) = state.queue.pop_front() {
          drop(state);
          self.writable.notify_one();
          return Some(item);
        }
        if state.closed {
          return None;
        }
      }
      self.readable.notified().await;
    }
  }

  pub fn close(&self) {
    self.state.lock().closed = true;
    self.readable.notify_waiters();
    self.writable.notify_waiters();
  }

  /// Take and reset the count of envelopes evicted by `DropOldest` since the
  /// last call (spec.md §6's `Lagged(n)` signal). `0` if nothing was
  /// dropped.
  pub fn take_lagged(&self) -> u64 {
    let mut state = self.state.lock();
    std::mem::take(&mut state.lagged)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn drop_oldest_evicts_front_when_full() {
    let sink = Sink::new(2, SinkPolicy::DropOldest, Duration::from_millis(10));
    assert_eq!(sink.push(1).await, PushOutcome::Enqueued);
    assert_eq!(sink.push(2).await, PushOutcome::Enqueued);
    assert_eq!(sink.push(3).await, PushOutcome::DroppedOldest);
    assert_eq!(sink.recv().await, Some(2));
    assert_eq!(sink.recv().await, Some(3));
  }

  #[tokio::test]
  async fn drop_newest_keeps_buffered_items() {
    let sink = Sink::new(1, SinkPolicy::DropNewest, Duration::from_millis(10));
    assert_eq!(sink.push(1).await, PushOutcome::Enqueued);
    assert_eq!(sink.push(2).await, PushOutcome::DroppedNewest);
    assert_eq!(sink.recv().await, Some(1));
  }

  #[tokio::test]
  async fn block_degrades_to_drop_after_wait_budget() {
    let sink = Sink::new(1, SinkPolicy::Block, Duration::from_millis(5));
    assert_eq!(sink.push(1).await, PushOutcome::Enqueued);
    assert_eq!(sink.push(2).await, PushOutcome::DroppedNewest);
  }

  #[tokio::test]
  async fn take_lagged_counts_drop_oldest_evictions() {
    let sink = Sink::new(2, SinkPolicy::DropOldest, Duration::from_millis(10));
    assert_eq!(sink.push(1).await, PushOutcome::Enqueued);
    assert_eq!(sink.push(2).await, PushOutcome::Enqueued);
    assert_eq!(sink.push(3).await, PushOutcome::DroppedOldest);
    assert_eq!(sink.push(4).await, PushOutcome::DroppedOldest);
    assert_eq!(sink.take_lagged(), 2);
    assert_eq!(sink.take_lagged(), 0);
  }

  #[tokio::test]
  async fn close_unblocks_pending_recv() {
    let sink: Sink<u32> = Sink::new(4, SinkPolicy::DropOldest, Duration::from_millis(10));
    sink.close();
    assert_eq!(sink.recv().await, None);
  }
}
