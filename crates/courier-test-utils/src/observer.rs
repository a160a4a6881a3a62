// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for observing session events in tests.

use std::time::Duration;

use tokio::sync::mpsc;

use courier_core::{SessionEvent, SessionState};
use courier_session::Observer;

/// Default bound for waiting on a single event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

pub fn observer() -> (Observer, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Next event, or `None` if nothing arrives within [`EVENT_TIMEOUT`].
pub async fn next_event(rx: &mut EventReceiver) -> Option<SessionEvent> {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .ok()
        .flatten()
}

/// Receive until `matches` accepts an event. Returns every event seen,
/// ending with the matching one, or `None` on timeout or closed channel.
pub async fn collect_until(
    rx: &mut EventReceiver,
    matches: impl Fn(&SessionEvent) -> bool,
) -> Option<Vec<SessionEvent>> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(rx).await?;
        let done = matches(&event);
        seen.push(event);
        if done {
            return Some(seen);
        }
    }
}

/// Wait for a `Status` event carrying `state`.
pub async fn wait_for_state(rx: &mut EventReceiver, state: SessionState) -> bool {
    collect_until(rx, |event| is_state(event, state))
        .await
        .is_some()
}

pub fn is_state(event: &SessionEvent, state: SessionState) -> bool {
    matches!(event, SessionEvent::Status { state: s, .. } if *s == state)
}

/// Everything already queued, without waiting.
pub fn drain(rx: &mut EventReceiver) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
