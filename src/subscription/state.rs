//! Subscription lifecycle state machine (spec.md §3 invariants I1-I4).

/// A subscription's lifecycle stage. Transitions are driven exclusively by
/// [`super::SubscriptionManager`]; nothing else mutates state directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
  /// `RICSubscriptionRequest` sent, awaiting the node's response (I1).
  Pending,
  /// Node admitted at least one action; indications may arrive (I2).
  Active,
  /// A Modify is outstanding: the old subscription keeps delivering under
  /// its previous terms until the Modify resolves (I3).
  Modifying,
  /// `RICSubscriptionDeleteRequest` sent, awaiting confirmation.
  Deleting,
  /// Terminal: deleted, rejected, or cascaded away by node loss or a
  /// `RICserviceUpdate` withdrawal (I4 — never reused, a new Create gets a
  /// fresh [`crate::types::SubscriptionId`]).
  Dead,
}

impl SubscriptionState {
  /// Indications are only ever delivered while `Active` or `Modifying`
  /// (the old action set stays live mid-Modify per I3).
  pub fn accepts_indications(self) -> bool {
    matches!(self, SubscriptionState::Active | SubscriptionState::Modifying)
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, SubscriptionState::Dead)
  }
}
