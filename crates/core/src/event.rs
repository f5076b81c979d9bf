//! Progress events emitted while a run is in flight.
//!
//! Sinks are fire-and-forget: the loop never waits on them and never fails
//! because a consumer went away.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::feature::GeoFeature;

/// A progress event, serialized as `{"kind": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum LoopEvent {
    UserPrompt {
        prompt: String,
    },
    LlmResponse {
        stop_reason: String,
        content: Vec<crate::message::ContentBlock>,
    },
    ToolCall {
        tool_use_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        tool_name: String,
        result: String,
    },
    ToolError {
        tool_use_id: String,
        tool_name: String,
        error: String,
    },
    GeoFeature(GeoFeature),
    RemoveGeoFeature {
        feature_id: String,
    },
}

impl LoopEvent {
    /// The wire name of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            LoopEvent::UserPrompt { .. } => "user_prompt",
            LoopEvent::LlmResponse { .. } => "llm_response",
            LoopEvent::ToolCall { .. } => "tool_call",
            LoopEvent::ToolResult { .. } => "tool_result",
            LoopEvent::ToolError { .. } => "tool_error",
            LoopEvent::GeoFeature(_) => "geo_feature",
            LoopEvent::RemoveGeoFeature { .. } => "remove_geo_feature",
        }
    }

    /// The event payload without the kind.
    pub fn data(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut value| value.get_mut("data").map(serde_json::Value::take))
            .unwrap_or_default()
    }
}

/// Receives progress events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: LoopEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: LoopEvent) {}
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<LoopEvent>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::UnboundedSender<LoopEvent>) -> Self {
        Self { sender }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LoopEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: LoopEvent) {
        // A closed receiver means nobody is listening any more
        let _ = self.sender.send(event);
    }
}

impl<F> ProgressSink for F
where
    F: Fn(LoopEvent) + Send + Sync,
{
    fn emit(&self, event: LoopEvent) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureKind;
    use serde_json::json;

    #[test]
    fn event_wire_shape() {
        let event = LoopEvent::RemoveGeoFeature { feature_id: "f-1".into() };
        assert_eq!(event.kind(), "remove_geo_feature");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"kind": "remove_geo_feature", "data": {"feature_id": "f-1"}})
        );
        assert_eq!(event.data(), json!({"feature_id": "f-1"}));
    }

    #[test]
    fn geo_feature_data_is_the_feature() {
        let event = LoopEvent::GeoFeature(GeoFeature {
            id: "f-2".into(),
            kind: FeatureKind::Marker,
            latitude: 10.0,
            longitude: 20.0,
            label: "Somewhere".into(),
        });
        assert_eq!(event.kind(), "geo_feature");
        assert_eq!(event.data()["lat"], 10.0);
        assert_eq!(event.data()["type"], "marker");
    }

    #[tokio::test]
    async fn channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelSink::channel();
        sink.emit(LoopEvent::UserPrompt { prompt: "one".into() });
        sink.emit(LoopEvent::UserPrompt { prompt: "two".into() });

        assert_eq!(rx.recv().await.unwrap(), LoopEvent::UserPrompt { prompt: "one".into() });
        assert_eq!(rx.recv().await.unwrap(), LoopEvent::UserPrompt { prompt: "two".into() });
    }

    #[test]
    fn closed_channel_does_not_panic() {
        let (sink, rx) = ChannelSink::channel();
        drop(rx);
        sink.emit(LoopEvent::UserPrompt { prompt: "lost".into() });
    }
}
