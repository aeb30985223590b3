//! Request/response payloads for the remote resource-management API.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Task label for billable work.
pub const TASK_BILLABLE: &str = "Billable";

/// Task label for non-billable work. The remote service has no native
/// billable boolean; it is encoded into this free-text task field.
pub const TASK_BUSINESS_DEVELOPMENT: &str = "Business Development";

/// Encode a billable flag into the remote task label.
pub fn task_for_billable(billable: bool) -> &'static str {
    if billable {
        TASK_BILLABLE
    } else {
        TASK_BUSINESS_DEVELOPMENT
    }
}

/// Decode a remote task label. Anything other than the business-development
/// label counts as billable.
pub fn billable_from_task(task: &str) -> bool {
    task != TASK_BUSINESS_DEVELOPMENT
}

/// Write/update request body for a remote time entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeEntryPayload {
    pub assignable_id: i64,
    /// Calendar day, serialized as YYYY-MM-DD.
    pub date: NaiveDate,
    /// Hours with two decimal places.
    pub hours: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub task: String,
}

/// A time entry as the remote service reports it.
///
/// Remote ids exceed the 32-bit signed range in production datasets.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteTimeEntry {
    pub id: i64,
    pub assignable_id: i64,
    pub date: NaiveDate,
    pub hours: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
}

/// A project as the remote service reports it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteProject {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub project_code: Option<String>,
}

/// Envelope the remote service wraps list responses in.
#[derive(Debug, Deserialize)]
pub(crate) struct PageEnvelope<T> {
    pub data: Vec<T>,
}

/// Error body shape returned by the remote service.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    /// Field-level validation details, keyed by field name.
    #[serde(default)]
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ApiErrorBody {
    /// Assemble a single human-readable message, folding in field-level
    /// details when present.
    pub fn assembled_message(&self) -> Option<String> {
        let details = self
            .errors
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
            .collect::<Vec<_>>();

        match (self.message.as_deref(), details.is_empty()) {
            (Some(message), true) => Some(message.to_string()),
            (Some(message), false) => Some(format!("{} ({})", message, details.join("; "))),
            (None, false) => Some(details.join("; ")),
            (None, true) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_encoding_round_trips() {
        assert_eq!(task_for_billable(true), TASK_BILLABLE);
        assert_eq!(task_for_billable(false), TASK_BUSINESS_DEVELOPMENT);
        assert!(billable_from_task(TASK_BILLABLE));
        assert!(!billable_from_task(TASK_BUSINESS_DEVELOPMENT));
    }

    #[test]
    fn unknown_task_labels_count_as_billable() {
        assert!(billable_from_task("Client Work"));
        assert!(billable_from_task(""));
    }

    #[test]
    fn error_body_assembles_field_details() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"message":"Validation failed","errors":{"hours":["must be positive"],"date":["is required"]}}"#,
        )
        .expect("parse error body");
        assert_eq!(
            body.assembled_message().as_deref(),
            Some("Validation failed (date: is required; hours: must be positive)")
        );
    }

    #[test]
    fn payload_omits_absent_notes() {
        let payload = TimeEntryPayload {
            assignable_id: 9_000_000_001,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).expect("date"),
            hours: rust_decimal_macros::dec!(1.50),
            notes: None,
            task: TASK_BILLABLE.to_string(),
        };
        let json = serde_json::to_string(&payload).expect("serialize");
        assert!(!json.contains("notes"));
        assert!(json.contains("\"date\":\"2026-03-02\""));
    }
}
