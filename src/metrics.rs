//! Process-wide counters, threaded explicitly rather than kept as ambient
//! global state (spec.md §9's redesign note on "global ... metric
//! registries"). One [`Metrics`] is constructed per [`crate::core::E2TerminationCore`]
//! and cloned (cheaply, it is `Arc`-backed internally via `prometheus`'s own
//! `Arc<Mutex<..>>` vecs) into every task that needs to record something.

use prometheus::{CounterVec, IntCounterVec, Opts, Registry};

#[derive(Clone)]
pub struct Metrics {
  /// One counter per [`crate::error::E2Error::kind`].
  pub errors_total: IntCounterVec,
  /// Indications dropped because their subscription was unknown or not
  /// Active (spec.md §4.6, `indications_dropped_unknown`).
  pub indications_dropped_unknown: IntCounterVec,
  /// Indications dropped by sink backpressure, labeled by subscription id
  /// and the policy that caused the drop (spec.md §4.6).
  pub indications_dropped_backpressure: CounterVec,
  /// Late control/subscription responses that arrived after their
  /// transaction had already timed out (spec.md §4.6, §4.4).
  pub late_responses_discarded: IntCounterVec,
}

impl Metrics {
  pub fn new(registry: &Registry) -> prometheus::Result<Self> {
    let errors_total = IntCounterVec::new(
      Opts::new("e2tc_errors_total", "Errors by kind"),
      &["kind"],
    )?;
    let indications_dropped_unknown = IntCounterVec::new(
      Opts::new(
        "e2tc_indications_dropped_unknown_total",
        "Indications dropped for an unknown or inactive subscription",
      ),
      &["node_id"],
    )?;
    let indications_dropped_backpressure = CounterVec::new(
      Opts::new(
        "e2tc_indications_dropped_backpressure_total",
        "Indications dropped by sink backpressure",
      ),
      &["subscription_id", "policy"],
    )?;
    let late_responses_discarded = IntCounterVec::new(
      Opts::new(
        "e2tc_late_responses_discarded_total",
        "Responses that arrived after their transaction had already resolved",
      ),
      &["procedure"],
    )?;

    registry.register(Box::new(errors_total.clone()))?;
    registry.register(Box::new(indications_dropped_unknown.clone()))?;
    registry.register(Box::new(indications_dropped_backpressure.clone()))?;
    registry.register(Box::new(late_responses_discarded.clone()))?;

    Ok(Self {
      errors_total,
      indications_dropped_unknown,
      indications_dropped_backpressure,
      late_responses_discarded,
    })
  }

  /// A [`Metrics`] not attached to any [`Registry`], for tests and examples
  /// that don't care about scraping.
  pub fn detached() -> Self {
    Self::new(&Registry::new()).expect("metric descriptors are static and never collide")
  }

  pub fn record_error(&self, err: &crate::error::E2Error) {
    self.errors_total.with_label_values(&[err.kind()]).inc();
  }
}
