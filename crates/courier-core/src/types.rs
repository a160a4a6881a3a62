// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the session registry, the scheduler, and adapters.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use crate::error::CourierError;

/// Collection holding scheduled jobs.
pub const SCHEDULES_COLLECTION: &str = "schedules";

/// Collection holding persisted session metadata.
pub const SESSIONS_COLLECTION: &str = "sessions";

/// Collection holding registered gateway users.
pub const USERS_COLLECTION: &str = "users";

/// Identifier of an independently authenticated tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        TenantId(s.to_string())
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        TenantId(s)
    }
}

/// Unique identifier for a scheduled job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}

/// Unique identifier for a message accepted by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Transport,
    Store,
    Auth,
}

// --- Session types ---

/// Lifecycle state of a tenant session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Connecting,
    AwaitingHandshake,
    Connected,
    Disconnected,
}

/// Identity reported by a transport once it is connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Transport-level address (e.g. the phone number JID).
    pub id: String,
    /// Display name, when the transport knows one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Lifecycle events emitted by a transport instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The tenant must pair out-of-band using this artifact (e.g. a QR payload).
    HandshakeArtifactReady(String),
    Connecting,
    Connected(Identity),
    Disconnected,
}

/// Events delivered to session observers, in order, over their channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A handshake artifact is available for display.
    #[serde(rename = "qr")]
    Artifact { artifact: String },
    /// The session changed state.
    Status {
        state: SessionState,
        #[serde(skip_serializing_if = "Option::is_none")]
        identity: Option<Identity>,
    },
    /// Something went wrong in this tenant's session lifecycle.
    Error { message: String },
}

impl SessionEvent {
    pub fn status(state: SessionState) -> Self {
        SessionEvent::Status {
            state,
            identity: None,
        }
    }
}

/// Identity resolved from a request credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantIdentity {
    pub tenant_id: TenantId,
    pub username: Option<String>,
}

// --- Job types ---

/// Kind of payload a message carries; selects the transport send operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PayloadKind {
    Text,
    Image,
    Video,
    Document,
    Sticker,
}

/// Terminal-or-pending status of a scheduled job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Sent,
    Failed,
}

/// Message body plus an optional media reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobContent {
    /// Message text for `text` payloads, caption otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// URL or staged-file handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    /// File name shown to the recipient of a document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// `media` refers to a staged temporary file owned by the job.
    #[serde(default)]
    pub is_temporary_file: bool,
}

impl JobContent {
    /// Plain text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Media content with an optional caption.
    pub fn media(media: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            text: caption,
            media: Some(media.into()),
            ..Self::default()
        }
    }

    /// Marks the media reference as a staged temporary file.
    pub fn temporary(mut self) -> Self {
        self.is_temporary_file = true;
        self
    }

    /// Returns the temporary resource this content owns, if any.
    pub fn temporary_resource(&self) -> Option<&str> {
        if self.is_temporary_file {
            self.media.as_deref()
        } else {
            None
        }
    }

    /// Checks that the content carries what `kind` needs and fills derived fields.
    pub fn normalize_for(mut self, kind: PayloadKind) -> Result<Self, CourierError> {
        let has_text = self.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        let has_media = self.media.as_deref().is_some_and(|m| !m.trim().is_empty());

        match kind {
            PayloadKind::Text if !has_text => {
                return Err(CourierError::Validation(
                    "text payload requires a message".to_string(),
                ));
            }
            PayloadKind::Text => {}
            _ if !has_media => {
                return Err(CourierError::Validation(format!(
                    "{kind} payload requires a media reference"
                )));
            }
            _ => {}
        }

        if self.is_temporary_file && !has_media {
            return Err(CourierError::Validation(
                "temporary file flag set without a media reference".to_string(),
            ));
        }

        if kind == PayloadKind::Document && self.filename.is_none() {
            self.filename = self
                .media
                .as_deref()
                .and_then(|m| m.rsplit('/').find(|s| !s.is_empty()))
                .map(|s| s.split('?').next().unwrap_or(s).to_string());
        }

        Ok(self)
    }
}

/// A message ready to be handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient: String,
    pub kind: PayloadKind,
    pub content: JobContent,
}

/// A time-deferred send, as persisted in the `schedules` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: JobId,
    pub tenant_id: TenantId,
    pub recipient: String,
    pub payload_kind: PayloadKind,
    pub content: JobContent,
    /// Due instant, expressed in the scheduler's reference time zone.
    pub due_at: DateTime<FixedOffset>,
    pub status: JobStatus,
    pub created_at: DateTime<FixedOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScheduledJob {
    /// Builds the outbound message this job dispatches.
    pub fn to_outbound(&self) -> OutboundMessage {
        OutboundMessage {
            recipient: self.recipient.clone(),
            kind: self.payload_kind,
            content: self.content.clone(),
        }
    }

    /// A job is due when it is still pending and its due instant has passed.
    pub fn is_due(&self, now: &DateTime<FixedOffset>) -> bool {
        self.status == JobStatus::Pending && self.due_at <= *now
    }
}

// --- Store criteria ---

/// Field-equality criteria used to select records in a store collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria(Map<String, Value>);

impl Criteria {
    /// Criteria matching every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Adds an equality constraint on a top-level field.
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Returns true when every constrained field of `record` equals the expected value.
    pub fn matches(&self, record: &Value) -> bool {
        self.0
            .iter()
            .all(|(key, expected)| record.get(key) == Some(expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criteria_matches_all_fields() {
        let record = serde_json::json!({"id": "a", "tenant_id": "u1", "status": "pending"});
        assert!(Criteria::all().matches(&record));
        assert!(Criteria::all().field("id", "a").matches(&record));
        assert!(
            Criteria::all()
                .field("id", "a")
                .field("tenant_id", "u1")
                .matches(&record)
        );
        assert!(
            !Criteria::all()
                .field("id", "a")
                .field("tenant_id", "u2")
                .matches(&record)
        );
        assert!(!Criteria::all().field("missing", "x").matches(&record));
    }

    #[test]
    fn text_payload_requires_message() {
        let err = JobContent::default()
            .normalize_for(PayloadKind::Text)
            .unwrap_err();
        assert!(matches!(err, CourierError::Validation(_)));

        let blank = JobContent::text("   ").normalize_for(PayloadKind::Text);
        assert!(blank.is_err());
    }

    #[test]
    fn media_payload_requires_reference() {
        let err = JobContent::text("caption only")
            .normalize_for(PayloadKind::Image)
            .unwrap_err();
        assert!(err.to_string().contains("image"));
    }

    #[test]
    fn document_filename_defaults_to_last_segment() {
        let content = JobContent::media("https://cdn.example.com/files/report.pdf?sig=1", None)
            .normalize_for(PayloadKind::Document)
            .unwrap();
        assert_eq!(content.filename.as_deref(), Some("report.pdf"));

        let named = JobContent {
            filename: Some("q3.pdf".into()),
            ..JobContent::media("https://cdn.example.com/x", None)
        }
        .normalize_for(PayloadKind::Document)
        .unwrap();
        assert_eq!(named.filename.as_deref(), Some("q3.pdf"));
    }

    #[test]
    fn temporary_resource_only_when_flagged() {
        let plain = JobContent::media("/tmp/a.png", None);
        assert_eq!(plain.temporary_resource(), None);
        let staged = plain.temporary();
        assert_eq!(staged.temporary_resource(), Some("/tmp/a.png"));
    }

    #[test]
    fn session_event_wire_shape() {
        let qr = serde_json::to_value(SessionEvent::Artifact {
            artifact: "X".into(),
        })
        .unwrap();
        assert_eq!(qr, serde_json::json!({"type": "qr", "artifact": "X"}));

        let status = serde_json::to_value(SessionEvent::status(SessionState::AwaitingHandshake))
            .unwrap();
        assert_eq!(
            status,
            serde_json::json!({"type": "status", "state": "awaiting_handshake"})
        );
    }

    #[test]
    fn job_round_trips_through_json() {
        let due = DateTime::parse_from_rfc3339("2026-01-02T10:00:00+07:00").unwrap();
        let job = ScheduledJob {
            id: JobId("j1".into()),
            tenant_id: TenantId("u1".into()),
            recipient: "+100".into(),
            payload_kind: PayloadKind::Text,
            content: JobContent::text("hi"),
            due_at: due,
            status: JobStatus::Pending,
            created_at: due,
            executed_at: None,
            error: None,
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["payload_kind"], "text");
        assert_eq!(value["tenant_id"], "u1");
        assert!(value.get("executed_at").is_none());
        let back: ScheduledJob = serde_json::from_value(value).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn due_requires_pending_and_past() {
        let now = DateTime::parse_from_rfc3339("2026-01-02T10:00:00+07:00").unwrap();
        let mut job = ScheduledJob {
            id: JobId("j1".into()),
            tenant_id: TenantId("u1".into()),
            recipient: "+100".into(),
            payload_kind: PayloadKind::Text,
            content: JobContent::text("hi"),
            due_at: DateTime::parse_from_rfc3339("2026-01-02T03:00:00Z").unwrap(),
            status: JobStatus::Pending,
            created_at: now,
            executed_at: None,
            error: None,
        };
        // Same instant expressed in another offset counts as due.
        assert!(job.is_due(&now));
        job.status = JobStatus::Failed;
        assert!(!job.is_due(&now));
    }
}
