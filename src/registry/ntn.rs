//! E2SM-NTN service model stub (SPEC_FULL.md §12.2, resolving the open
//! question of what function id the non-terrestrial-network service model
//! should claim).
//!
//! This is a minimal, always-admitting handler: NTN indication/control
//! payload formats are not standardized in spec.md's scope, so validation
//! simply accepts any non-empty definition. A real deployment would swap
//! this out for a handler with actual ASN.1-backed validation; this one
//! exists so `Registry::builder().register(ntn::FUNCTION_ID, ...)` has
//! something sensible to plug in out of the box.

use bytes::Bytes;

use crate::registry::ServiceModelHandler;
use crate::types::{Cause, RanFunctionId};

/// Fixed by convention for this deployment; override by registering a
/// different handler under a different id if a node advertises otherwise.
pub const FUNCTION_ID: RanFunctionId = RanFunctionId(10);

pub struct NtnHandler {
  schema_version: u8,
}

impl NtnHandler {
  pub fn new(schema_version: u8) -> Self {
    Self { schema_version }
  }
}

impl Default for NtnHandler {
  fn default() -> Self {
    Self::new(1)
  }
}

impl ServiceModelHandler for NtnHandler {
  fn oid(&self) -> &str {
    "1.3.6.1.4.1.53148.1.1.2.100"
  }

  fn name(&self) -> &str {
    "ORAN-E2SM-NTN"
  }

  fn schema_version(&self) -> u8 {
    self.schema_version
  }

  fn validate_event_trigger(&self, definition: &[u8]) -> Result<(), Cause> {
    if definition.is_empty() {
      Err(Cause::Protocol("empty NTN event trigger definition".into()))
    } else {
      Ok(())
    }
  }

  fn validate_action_def(&self, _action_definition: &[u8]) -> Result<(), Cause> {
    Ok(())
  }

  fn parse_indication(&self, _header: &Bytes, _message: &Bytes) -> Option<String> {
    None
  }
}
