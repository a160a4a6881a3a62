// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routes outbound messages to the tenant's connected transport.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use courier_core::{CourierError, MessageId, OutboundMessage, TenantId, TransportDirectory};

/// Looks up a *ready* transport and sends through it with a deadline.
///
/// Never starts a session: a tenant that is not connected fails immediately
/// with [`CourierError::SessionNotReady`].
#[derive(Clone)]
pub struct DispatchBridge {
    directory: Arc<dyn TransportDirectory>,
    send_timeout: Duration,
}

impl DispatchBridge {
    pub fn new(directory: Arc<dyn TransportDirectory>, send_timeout: Duration) -> Self {
        Self {
            directory,
            send_timeout,
        }
    }

    pub async fn dispatch(
        &self,
        tenant_id: &TenantId,
        message: &OutboundMessage,
    ) -> Result<MessageId, CourierError> {
        let transport = self
            .directory
            .ready_transport(tenant_id)
            .await
            .ok_or_else(|| CourierError::SessionNotReady {
                tenant_id: tenant_id.to_string(),
            })?;

        debug!(tenant_id = %tenant_id, kind = %message.kind, "dispatching message");
        tokio::time::timeout(self.send_timeout, transport.send(message))
            .await
            .map_err(|_| CourierError::Timeout {
                duration: self.send_timeout,
            })?
    }
}
