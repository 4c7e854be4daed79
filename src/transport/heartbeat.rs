//! Liveness tracking for an association (spec.md §4.2).
//!
//! Inactivity heartbeats fire every `heartbeat_interval`; after
//! `heartbeat_misses_to_dead` consecutive misses with no traffic observed,
//! the association is declared dead. "Traffic" here is any inbound PDU —
//! a real E2 Node's own keep-alive procedure rides on top of this, this
//! tracker only needs to know that *something* arrived recently.

use std::time::Duration;

use tokio::time::Instant;

pub struct HeartbeatTracker {
  interval: Duration,
  misses_to_dead: u32,
  last_seen: Instant,
  misses: u32,
}

impl HeartbeatTracker {
  pub fn new(interval: Duration, misses_to_dead: u32) -> Self {
    Self {
      interval,
      misses_to_dead,
      last_seen: Instant::now(),
      misses: 0,
    }
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }

  /// Call whenever a PDU is received.
  pub fn note_activity(&mut self) {
    self.last_seen = Instant::now();
    self.misses = 0;
  }

  /// Call once per heartbeat tick. Returns `true` once the miss threshold is
  /// crossed, i.e. the association should be declared dead.
  pub fn tick(&mut self) -> bool {
    if self.last_seen.elapsed() >= self.interval {
      self.misses += 1;
    } else {
      self.misses = 0;
    }
    self.misses >= self.misses_to_dead
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn declares_dead_after_consecutive_misses() {
    let mut t = HeartbeatTracker::new(Duration::from_millis(0), 3);
    // Every tick will register as a miss because the interval is zero and
    // no activity is noted in between.
    assert!(!t.tick());
    assert!(!t.tick());
    assert!(t.tick());
  }

  #[test]
  fn activity_resets_miss_count() {
    let mut t = HeartbeatTracker::new(Duration::from_millis(0), 3);
    assert!(!t.tick());
    assert!(!t.tick());
    t.note_activity();
    assert!(!t.tick());
    assert!(!t.tick());
    assert!(t.tick());
  }
}
