// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the session bridge HTTP API.

use serde::{Deserialize, Serialize};

use courier_core::{Identity, PayloadKind, TransportEvent};

/// Session state as the bridge reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    Starting,
    Qr,
    Connected,
    Disconnected,
    #[serde(other)]
    Unknown,
}

/// Account the bridge session is logged in as.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BridgeUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Body of `GET /sessions/{tenant}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BridgeStatus {
    pub status: BridgeState,
    #[serde(default)]
    pub qr: Option<String>,
    #[serde(default)]
    pub user: Option<BridgeUser>,
}

impl BridgeStatus {
    /// The lifecycle event this status corresponds to, if any.
    ///
    /// A `qr` status without a payload and unknown states map to nothing.
    pub fn to_event(&self) -> Option<TransportEvent> {
        match self.status {
            BridgeState::Starting => Some(TransportEvent::Connecting),
            BridgeState::Qr => self
                .qr
                .clone()
                .filter(|qr| !qr.is_empty())
                .map(TransportEvent::HandshakeArtifactReady),
            BridgeState::Connected => {
                let identity = match &self.user {
                    Some(user) => Identity {
                        id: user.id.clone(),
                        name: user.name.clone(),
                    },
                    None => Identity {
                        id: String::new(),
                        name: None,
                    },
                };
                Some(TransportEvent::Connected(identity))
            }
            BridgeState::Disconnected => Some(TransportEvent::Disconnected),
            BridgeState::Unknown => None,
        }
    }
}

/// Body of `POST /sessions/{tenant}/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendRequest<'a> {
    pub to: &'a str,
    #[serde(rename = "type")]
    pub kind: PayloadKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<&'a str>,
}

impl<'a> SendRequest<'a> {
    pub fn text(to: &'a str, text: &'a str) -> Self {
        Self {
            to,
            kind: PayloadKind::Text,
            text: Some(text),
            media: None,
            caption: None,
            filename: None,
        }
    }

    pub fn media(to: &'a str, kind: PayloadKind, media: &'a str, caption: Option<&'a str>) -> Self {
        Self {
            to,
            kind,
            text: None,
            media: Some(media),
            caption,
            filename: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SendResponse {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BridgeErrorBody {
    pub error: String,
}
