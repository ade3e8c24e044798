//! Reload events bridging pipeline completions to the dev server.
//!
//! The executor side is synchronous; the dev server is async. A
//! `tokio::sync::broadcast` channel works from both worlds: `emit` is a
//! plain send, each connected client holds its own receiver, and receivers
//! that lag or disconnect are dropped by the channel itself.

use crate::pipeline::ExecutionResult;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;

/// How a browser should react to a completed pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadKind {
    /// Full page reload
    Reload,
    /// Stylesheet-only refresh, no page reload
    Refresh,
}

/// Notification that a pipeline finished and its outputs changed.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadEvent {
    /// Pipeline that completed
    pub pipeline: String,
    /// Reaction the client should take
    pub kind: ReloadKind,
    /// Destination paths written by the run
    pub paths: Vec<String>,
    /// Milliseconds since the Unix epoch at emission time
    pub timestamp_ms: u64,
}

impl ReloadEvent {
    /// Build an event from a completed run.
    ///
    /// Runs that wrote only stylesheets yield `Refresh`; everything else,
    /// including partially failed runs, yields `Reload` so the developer
    /// sees the current output state in the browser.
    pub fn from_result(result: &ExecutionResult) -> Self {
        let kind = if result.css_only() { ReloadKind::Refresh } else { ReloadKind::Reload };
        Self {
            pipeline: result.pipeline.clone(),
            kind,
            paths: result.outputs.iter().map(|p| p.display().to_string()).collect(),
            timestamp_ms: now_ms(),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Cloneable fan-out handle for reload events.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadEvent>,
}

impl ReloadHub {
    /// Create a hub with room for a small backlog per client.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Publish an event to all connected clients.
    ///
    /// With no clients connected the event is simply dropped.
    pub fn emit(&self, event: ReloadEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe a new client.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    /// Number of currently connected clients.
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn result_with_outputs(outputs: Vec<&str>) -> ExecutionResult {
        ExecutionResult {
            pipeline: "css".to_string(),
            succeeded: vec![],
            failed: vec![],
            outputs: outputs.into_iter().map(PathBuf::from).collect(),
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn test_css_only_run_is_refresh() {
        let event =
            ReloadEvent::from_result(&result_with_outputs(vec!["/d/a.css", "/d/a.min.css"]));
        assert_eq!(event.kind, ReloadKind::Refresh);
    }

    #[test]
    fn test_mixed_run_is_reload() {
        let event = ReloadEvent::from_result(&result_with_outputs(vec!["/d/a.css", "/d/a.js"]));
        assert_eq!(event.kind, ReloadKind::Reload);
    }

    #[test]
    fn test_empty_run_is_reload() {
        let event = ReloadEvent::from_result(&result_with_outputs(vec![]));
        assert_eq!(event.kind, ReloadKind::Reload);
    }

    #[test]
    fn test_hub_delivers_to_subscriber() {
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();
        hub.emit(ReloadEvent::from_result(&result_with_outputs(vec!["/d/a.css"])));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.pipeline, "css");
    }

    #[test]
    fn test_hub_emit_without_clients() {
        let hub = ReloadHub::new();
        assert_eq!(hub.client_count(), 0);
        // Must not panic or block
        hub.emit(ReloadEvent::from_result(&result_with_outputs(vec![])));
    }

    #[test]
    fn test_event_serializes_kind_lowercase() {
        let event = ReloadEvent::from_result(&result_with_outputs(vec!["/d/a.css"]));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"refresh\""));
    }
}
