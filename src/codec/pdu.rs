//! E2AP PDU variants (spec.md §4.1).
//!
//! Outer envelope fields are concrete; service-model bodies
//! (event-trigger-definition, action-definition, indication header/message,
//! control header/message) are passed through as opaque [`Bytes`] — this
//! codec's only concern is the E2AP envelope, never the payload a service
//! model puts inside it.

use bytes::Bytes;
use speedy::{Readable, Writable};

use crate::types::{
  Action, Cause, GlobalE2NodeId, NodeType, RanFunctionId, RanFunctionRevision, RicRequestId,
};

/// One advertised RAN Function as carried in `E2SetupRequest`/`RicServiceUpdate`.
#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct RanFunctionItem {
  pub function_id: RanFunctionId,
  pub revision: RanFunctionRevision,
  pub oid: String,
  pub definition: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct E2SetupRequest {
  pub global_node_id: GlobalE2NodeId,
  pub node_type: NodeType,
  pub ran_functions: Vec<RanFunctionItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct E2SetupResponse {
  pub global_ric_id: Bytes,
  pub accepted_functions: Vec<RanFunctionId>,
  pub rejected_functions: Vec<(RanFunctionId, Cause)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct E2SetupFailure {
  pub cause: Cause,
  /// Optional retry hint, milliseconds.
  pub time_to_wait_ms: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct RicSubscriptionRequest {
  pub ric_request_id: RicRequestId,
  pub function_id: RanFunctionId,
  pub event_trigger_definition: Bytes,
  pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct RicSubscriptionResponse {
  pub ric_request_id: RicRequestId,
  pub function_id: RanFunctionId,
  pub admitted_actions: Vec<u16>,
  pub not_admitted_actions: Vec<(u16, Cause)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct RicSubscriptionFailure {
  pub ric_request_id: RicRequestId,
  pub function_id: RanFunctionId,
  pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct RicSubscriptionDeleteRequest {
  pub ric_request_id: RicRequestId,
  pub function_id: RanFunctionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct RicSubscriptionDeleteResponse {
  pub ric_request_id: RicRequestId,
  pub function_id: RanFunctionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct RicSubscriptionDeleteFailure {
  pub ric_request_id: RicRequestId,
  pub function_id: RanFunctionId,
  pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct RicIndication {
  pub ric_request_id: RicRequestId,
  pub function_id: RanFunctionId,
  pub action_id: u16,
  pub indication_header: Bytes,
  pub indication_message: Bytes,
  pub call_process_id: Option<Bytes>,
  pub sequence: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub enum ControlAckRequest {
  Ack,
  NoAck,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct RicControlRequest {
  pub ric_request_id: RicRequestId,
  pub function_id: RanFunctionId,
  pub control_header: Bytes,
  pub control_message: Bytes,
  pub ack_request: ControlAckRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct RicControlAcknowledge {
  pub ric_request_id: RicRequestId,
  pub function_id: RanFunctionId,
  pub outcome: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct RicControlFailure {
  pub ric_request_id: RicRequestId,
  pub function_id: RanFunctionId,
  pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct E2NodeConfigurationUpdate {
  pub added_functions: Vec<RanFunctionItem>,
  pub removed_functions: Vec<RanFunctionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct E2NodeConfigurationUpdateAcknowledge {
  pub accepted_additions: Vec<RanFunctionId>,
  pub accepted_removals: Vec<RanFunctionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct RicServiceUpdate {
  pub added_functions: Vec<RanFunctionItem>,
  pub removed_functions: Vec<RanFunctionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct ErrorIndication {
  pub ric_request_id: Option<RicRequestId>,
  pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct ResetRequest {
  pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct ResetResponse;

/// Every PDU the codec can encode/decode (spec.md §4.1).
#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub enum Pdu {
  E2SetupRequest(E2SetupRequest),
  E2SetupResponse(E2SetupResponse),
  E2SetupFailure(E2SetupFailure),
  RicSubscriptionRequest(RicSubscriptionRequest),
  RicSubscriptionResponse(RicSubscriptionResponse),
  RicSubscriptionFailure(RicSubscriptionFailure),
  RicSubscriptionDeleteRequest(RicSubscriptionDeleteRequest),
  RicSubscriptionDeleteResponse(RicSubscriptionDeleteResponse),
  RicSubscriptionDeleteFailure(RicSubscriptionDeleteFailure),
  RicIndication(RicIndication),
  RicControlRequest(RicControlRequest),
  RicControlAcknowledge(RicControlAcknowledge),
  RicControlFailure(RicControlFailure),
  E2NodeConfigurationUpdate(E2NodeConfigurationUpdate),
  E2NodeConfigurationUpdateAcknowledge(E2NodeConfigurationUpdateAcknowledge),
  RicServiceUpdate(RicServiceUpdate),
  ErrorIndication(ErrorIndication),
  ResetRequest(ResetRequest),
  ResetResponse(ResetResponse),
}

impl Pdu {
  /// Short name for logging, matching the teacher's habit of logging a
  /// procedure name rather than a `Debug`-formatted payload.
  pub fn procedure_name(&self) -> &'static str {
    match self {
      Pdu::E2SetupRequest(_) => "E2SetupRequest",
      Pdu::E2SetupResponse(_) => "E2SetupResponse",
      Pdu::E2SetupFailure(_) => "E2SetupFailure",
      Pdu::RicSubscriptionRequest(_) => "RICSubscriptionRequest",
      Pdu::RicSubscriptionResponse(_) => "RICSubscriptionResponse",
      Pdu::RicSubscriptionFailure(_) => "RICSubscriptionFailure",
      Pdu::RicSubscriptionDeleteRequest(_) => "RICSubscriptionDeleteRequest",
      Pdu::RicSubscriptionDeleteResponse(_) => "RICSubscriptionDeleteResponse",
      Pdu::RicSubscriptionDeleteFailure(_) => "RICSubscriptionDeleteFailure",
      Pdu::RicIndication(_) => "RICIndication",
      Pdu::RicControlRequest(_) => "RICControlRequest",
      Pdu::RicControlAcknowledge(_) => "RICControlAcknowledge",
      Pdu::RicControlFailure(_) => "RICControlFailure",
      Pdu::E2NodeConfigurationUpdate(_) => "E2NodeConfigurationUpdate",
      Pdu::E2NodeConfigurationUpdateAcknowledge(_) => "E2NodeConfigurationUpdateAcknowledge",
      Pdu::RicServiceUpdate(_) => "RICServiceUpdate",
      Pdu::ErrorIndication(_) => "ErrorIndication",
      Pdu::ResetRequest(_) => "ResetRequest",
      Pdu::ResetResponse(_) => "ResetResponse",
    }
  }
}
