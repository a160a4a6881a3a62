// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport traits: the per-tenant connection, its factory, and the lookup
//! the dispatcher uses to find a ready connection.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MessageId, OutboundMessage, PayloadKind, TenantId, TransportEvent};

/// One tenant's connection to the messaging network.
///
/// Lifecycle events are pushed into the sender handed to
/// [`TransportFactory::create`].
#[async_trait]
pub trait TransportProvider: PluginAdapter {
    /// Starts connecting. Returns once the transport is running; progress is
    /// reported through lifecycle events.
    async fn initialize(&self) -> Result<(), CourierError>;

    async fn send_text(&self, recipient: &str, text: &str) -> Result<MessageId, CourierError>;

    async fn send_image(
        &self,
        recipient: &str,
        media: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, CourierError>;

    async fn send_video(
        &self,
        recipient: &str,
        media: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, CourierError>;

    async fn send_document(
        &self,
        recipient: &str,
        media: &str,
        filename: Option<&str>,
        caption: Option<&str>,
    ) -> Result<MessageId, CourierError>;

    async fn send_sticker(&self, recipient: &str, media: &str) -> Result<MessageId, CourierError>;

    /// Tears the connection down. With `purge_credentials` the stored pairing
    /// is deleted and the next session starts with a fresh handshake.
    async fn destroy(&self, purge_credentials: bool) -> Result<(), CourierError>;

    /// Routes `message` to the send operation for its payload kind.
    async fn send(&self, message: &OutboundMessage) -> Result<MessageId, CourierError> {
        let recipient = message.recipient.as_str();
        let content = &message.content;
        let caption = content.text.as_deref();
        let media = || {
            content.media.as_deref().ok_or_else(|| {
                CourierError::Validation(format!("{} message has no media", message.kind))
            })
        };
        match message.kind {
            PayloadKind::Text => {
                let text = caption.ok_or_else(|| {
                    CourierError::Validation("text message has no body".to_string())
                })?;
                self.send_text(recipient, text).await
            }
            PayloadKind::Image => self.send_image(recipient, media()?, caption).await,
            PayloadKind::Video => self.send_video(recipient, media()?, caption).await,
            PayloadKind::Document => {
                self.send_document(recipient, media()?, content.filename.as_deref(), caption)
                    .await
            }
            PayloadKind::Sticker => self.send_sticker(recipient, media()?).await,
        }
    }
}

/// Creates transport instances, one per tenant session.
pub trait TransportFactory: Send + Sync + 'static {
    fn create(
        &self,
        tenant_id: &TenantId,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn TransportProvider>, CourierError>;
}

/// Resolves a tenant to a transport that is connected and able to send.
#[async_trait]
pub trait TransportDirectory: Send + Sync + 'static {
    /// Returns `None` unless the tenant's session is connected.
    async fn ready_transport(&self, tenant_id: &TenantId) -> Option<Arc<dyn TransportProvider>>;
}
