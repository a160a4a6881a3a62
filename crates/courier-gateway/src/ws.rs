// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket observer for a tenant's session lifecycle.
//!
//! Opening the socket acquires the tenant's session and binds the socket as an
//! observer.
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "qr", "artifact": "2@..."}
//! {"type": "status", "state": "connected", "identity": {"id": "628...@c.us"}}
//! {"type": "error", "message": "..."}
//! ```
//!
//! Client -> Server (JSON):
//! ```json
//! {"action": "logout"}
//! {"action": "connect"}
//! ```

use axum::Extension;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use courier_core::{SessionEvent, TenantIdentity};
use courier_session::SessionHandle;

use crate::server::GatewayState;

/// Frame sent by the client.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientAction {
    /// Log out and purge the tenant's credentials.
    Logout,
    /// Rebind to the session, creating it again after a logout.
    Connect,
}

/// GET /ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    Extension(identity): Extension<TenantIdentity>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn attach(
    state: &GatewayState,
    identity: &TenantIdentity,
) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = state.registry.acquire(&identity.tenant_id, tx).await;
    (handle, rx)
}

/// Relay session events to the socket and client actions to the registry.
///
/// When the session ends the observer channel closes; the socket stays open so
/// the client can `connect` again.
async fn handle_socket(socket: WebSocket, state: GatewayState, identity: TenantIdentity) {
    let tenant_id = identity.tenant_id.clone();
    let (mut sink, mut stream) = socket.split();
    let (handle, rx) = attach(&state, &identity).await;
    let mut handle = Some(handle);
    let mut events = Some(rx);
    info!(tenant_id = %tenant_id, "observer socket opened");

    loop {
        let next_event = async {
            match events.as_mut() {
                Some(rx) => rx.recv().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            event = next_event => match event {
                Some(event) => {
                    let frame = match serde_json::to_string(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(tenant_id = %tenant_id, error = %e, "failed to encode session event");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                None => {
                    debug!(tenant_id = %tenant_id, "session ended, observer released");
                    events = None;
                    handle = None;
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientAction>(text.as_str()) {
                        Ok(ClientAction::Logout) => {
                            state.registry.logout(&tenant_id).await;
                        }
                        Ok(ClientAction::Connect) => {
                            if let Some(old) = handle.take() {
                                state.registry.detach_observer(&old).await;
                            }
                            let (h, rx) = attach(&state, &identity).await;
                            handle = Some(h);
                            events = Some(rx);
                        }
                        Err(e) => debug!(tenant_id = %tenant_id, error = %e, "ignoring client frame"),
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    if let Some(handle) = handle {
        state.registry.detach_observer(&handle).await;
    }
    info!(tenant_id = %tenant_id, "observer socket closed");
}
