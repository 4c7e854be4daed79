//! Service-Model Registry (C3, spec.md §4.3).
//!
//! A `Registry` is an immutable map from [`RanFunctionId`] to a boxed
//! [`ServiceModelHandler`], built once at startup (xApp/host-process wiring)
//! and shared read-only by every association task afterwards — no locking
//! on the hot path, following the teacher's own preference for building a
//! `QosPolicies` table once and handing out `Arc` clones rather than
//! guarding it with a mutex.

pub mod ntn;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::types::{Cause, RanFunctionId};

/// Per-function behavior a service model plugs into the core. Everything
/// here is synchronous and side-effect free: the registry only validates
/// and classifies, it never itself talks to the network or holds state
/// (spec.md §4.3, "the registry does not interpret indication payloads
/// beyond what a handler chooses to do").
pub trait ServiceModelHandler: Send + Sync {
  /// Object identifier advertised in `E2SetupRequest`/`RICserviceUpdate`
  /// (spec data model).
  fn oid(&self) -> &str;

  /// Human-readable name for logs and metrics labels.
  fn name(&self) -> &str;

  /// Schema/definition revision this handler understands. A node
  /// advertising a higher revision than this is still accepted; the
  /// handler only refuses a *lower* one it no longer speaks (spec.md §4.3
  /// function-update semantics).
  fn schema_version(&self) -> u8;

  /// Validate an event-trigger-definition before a subscription referring
  /// to it is admitted. Returning `Err` fails the whole Create with that
  /// cause (spec.md §4.5 Create step 2).
  fn validate_event_trigger(&self, _definition: &[u8]) -> Result<(), Cause> {
    Ok(())
  }

  /// Validate one action's action-definition. Returning `Err` causes that
  /// single action to be reported in `not_admitted_actions` rather than
  /// failing the whole subscription (spec.md §4.5 Create step 3).
  fn validate_action_def(&self, _action_definition: &[u8]) -> Result<(), Cause> {
    Ok(())
  }

  /// Optional introspection hook: service models that want typed access to
  /// an indication's header/message can parse it here. The router never
  /// depends on this succeeding; it is purely for handlers that choose to
  /// look.
  fn parse_indication(&self, _header: &Bytes, _message: &Bytes) -> Option<String> {
    None
  }
}

/// Immutable function-id -> handler table.
#[derive(Clone, Default)]
pub struct Registry {
  handlers: HashMap<RanFunctionId, Arc<dyn ServiceModelHandler>>,
}

impl Registry {
  pub fn builder() -> RegistryBuilder {
    RegistryBuilder::new()
  }

  pub fn get(&self, id: RanFunctionId) -> Option<&Arc<dyn ServiceModelHandler>> {
    self.handlers.get(&id)
  }

  pub fn contains(&self, id: RanFunctionId) -> bool {
    self.handlers.contains_key(&id)
  }

  pub fn function_ids(&self) -> impl Iterator<Item = RanFunctionId> + '_ {
    self.handlers.keys().copied()
  }
}

#[derive(Default)]
pub struct RegistryBuilder {
  handlers: HashMap<RanFunctionId, Arc<dyn ServiceModelHandler>>,
}

impl RegistryBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(mut self, id: RanFunctionId, handler: Arc<dyn ServiceModelHandler>) -> Self {
    self.handlers.insert(id, handler);
    self
  }

  pub fn build(self) -> Registry {
    Registry {
      handlers: self.handlers,
    }
  }
}
