//! The agentic tool-use loop.
//!
//! A run moves through a small state machine:
//!
//! ```text
//! Init -> AwaitingModel -> TerminalText -> Done
//!               ^    |
//!               |    v
//!          ExecutingTools        (round limit hit -> LimitExceeded)
//! ```
//!
//! Tool calls within a round execute sequentially in request order, and
//! their results go back to the model as one tool-results turn in that same
//! order. A failing tool is reported to the model and the run continues;
//! any other failure ends the run.

use std::sync::Arc;

use geoagent_core::error::{Error, Result};
use geoagent_core::event::{LoopEvent, ProgressSink};
use geoagent_core::feature::GeoFeature;
use geoagent_core::history::{HistoryEntry, HistoryJournal, HistoryPayload};
use geoagent_core::message::{ContentBlock, Turn, validate_turns};
use geoagent_core::provider::{ModelRequest, ModelResponse, Provider, StopReason, ToolDefinition};
use geoagent_core::tool::{ToolRouter, ToolUse, base_tool_name};
use geoagent_telemetry::{CostSummary, PricingTable, UsageTracker};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::features::extract_features;

const REMOVE_FEATURE_TOOL: &str = "remove_map_feature";

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Init,
    AwaitingModel,
    TerminalText,
    ExecutingTools,
    Done,
    LimitExceeded,
    Failed,
}

/// The terminal output of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopResult {
    pub final_text: String,
    pub history: Vec<HistoryEntry>,
    pub features: Vec<GeoFeature>,
    pub usage: CostSummary,
}

/// Per-run inputs beyond the conversation itself.
#[derive(Default)]
pub struct RunContext<'a> {
    pub system_prompt: Option<String>,

    /// Receives every history entry as soon as it is produced
    pub journal: Option<&'a dyn HistoryJournal>,
}

/// Orchestrates model calls and tool execution for one user message at a time.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<dyn ToolRouter>,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,

    /// Model round-trips that may request tools before the run fails
    max_tool_rounds: u32,

    pricing: PricingTable,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<dyn ToolRouter>, model: impl Into<String>) -> Self {
        Self {
            provider,
            tools,
            model: model.into(),
            max_tokens: 4096,
            temperature: None,
            max_tool_rounds: 10,
            pricing: PricingTable::with_defaults(),
        }
    }

    pub fn with_max_tool_rounds(mut self, max: u32) -> Self {
        self.max_tool_rounds = max;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_tool_rounds(&self) -> u32 {
        self.max_tool_rounds
    }

    /// Run without a system prompt or journal.
    pub async fn run(
        &self,
        user_message: &str,
        prior_turns: Vec<Turn>,
        catalog: &[ToolDefinition],
        sink: &dyn ProgressSink,
    ) -> Result<LoopResult> {
        self.run_in(RunContext::default(), user_message, prior_turns, catalog, sink)
            .await
    }

    /// Process one user message on top of `prior_turns`.
    ///
    /// `prior_turns` must already be a well-formed conversation; a malformed
    /// one fails the run before the model is called.
    pub async fn run_in(
        &self,
        context: RunContext<'_>,
        user_message: &str,
        prior_turns: Vec<Turn>,
        catalog: &[ToolDefinition],
        sink: &dyn ProgressSink,
    ) -> Result<LoopResult> {
        let mut run = Run {
            sink,
            journal: context.journal,
            state: LoopState::Init,
            history: Vec::new(),
            features: Vec::new(),
            usage: UsageTracker::new(self.pricing.clone()),
        };

        let outcome = self
            .drive(&mut run, context.system_prompt, user_message, prior_turns, catalog)
            .await;

        match &outcome {
            Ok(_) => run.transition(LoopState::Done),
            Err(Error::RoundLimitExceeded { .. }) => run.transition(LoopState::LimitExceeded),
            Err(e) => {
                warn!(error = %e, "Agent run failed");
                run.transition(LoopState::Failed);
            }
        }
        run.usage.log_summary();

        let final_text = outcome?;
        info!(
            history_entries = run.history.len(),
            features = run.features.len(),
            "Agent run complete"
        );
        Ok(LoopResult {
            final_text,
            history: run.history,
            features: run.features,
            usage: run.usage.summary(),
        })
    }

    async fn drive(
        &self,
        run: &mut Run<'_>,
        system_prompt: Option<String>,
        user_message: &str,
        prior_turns: Vec<Turn>,
        catalog: &[ToolDefinition],
    ) -> Result<String> {
        validate_turns(&prior_turns)?;
        info!(
            prior_turns = prior_turns.len(),
            tools = catalog.len(),
            model = %self.model,
            "Starting agent run"
        );

        run.record(HistoryPayload::UserPrompt {
            prompt: user_message.to_string(),
        })
        .await?;
        run.sink.emit(LoopEvent::UserPrompt {
            prompt: user_message.to_string(),
        });

        let mut turns = prior_turns;
        turns.push(Turn::user(user_message));
        let mut rounds = 0u32;

        loop {
            run.transition(LoopState::AwaitingModel);
            let response = self
                .provider
                .complete(ModelRequest {
                    model: self.model.clone(),
                    system: system_prompt.clone(),
                    turns: turns.clone(),
                    tools: catalog.to_vec(),
                    max_tokens: self.max_tokens,
                    temperature: self.temperature,
                })
                .await?;

            let model = if response.model.is_empty() { &self.model } else { &response.model };
            run.usage
                .record(model, response.usage.input_tokens, response.usage.output_tokens);

            run.record(HistoryPayload::LlmResponse {
                content: response.content.clone(),
                stop_reason: response.stop_reason.to_string(),
            })
            .await?;
            run.sink.emit(LoopEvent::LlmResponse {
                stop_reason: response.stop_reason.to_string(),
                content: response.content.clone(),
            });

            let tool_uses = response.tool_uses();
            if response.stop_reason != StopReason::ToolUse {
                run.transition(LoopState::TerminalText);
                return Ok(response.text());
            }
            if tool_uses.is_empty() {
                warn!("Model stopped for tool use without requesting any tool");
                run.transition(LoopState::TerminalText);
                return Ok(response.text());
            }
            if rounds >= self.max_tool_rounds {
                warn!(limit = self.max_tool_rounds, "Tool round limit reached");
                return Err(Error::RoundLimitExceeded {
                    limit: self.max_tool_rounds,
                });
            }

            rounds += 1;
            run.transition(LoopState::ExecutingTools);
            debug!(round = rounds, tool_count = tool_uses.len(), "Executing tool round");

            let ModelResponse { content, .. } = response;
            turns.push(Turn::Assistant { content });

            let mut results = Vec::with_capacity(tool_uses.len());
            for tool_use in &tool_uses {
                results.push(self.execute_tool(run, tool_use).await?);
            }
            turns.push(Turn::ToolResults { results });
        }
    }

    /// Execute one tool request and produce the block fed back to the model.
    async fn execute_tool(&self, run: &mut Run<'_>, tool_use: &ToolUse) -> Result<ContentBlock> {
        run.record(HistoryPayload::ToolCall {
            tool_use_id: tool_use.id.clone(),
            tool_name: tool_use.name.clone(),
            arguments: tool_use.arguments.clone(),
        })
        .await?;
        run.sink.emit(LoopEvent::ToolCall {
            tool_use_id: tool_use.id.clone(),
            tool_name: tool_use.name.clone(),
            arguments: tool_use.arguments.clone(),
        });

        match self.tools.call_tool(&tool_use.name, &tool_use.arguments).await {
            Ok(result) => {
                debug!(tool = %tool_use.name, bytes = result.len(), "Tool succeeded");
                run.record(HistoryPayload::ToolResult {
                    tool_use_id: tool_use.id.clone(),
                    tool_name: tool_use.name.clone(),
                    result: result.clone(),
                })
                .await?;
                run.sink.emit(LoopEvent::ToolResult {
                    tool_use_id: tool_use.id.clone(),
                    tool_name: tool_use.name.clone(),
                    result: result.clone(),
                });

                for feature in extract_features(tool_use, &result) {
                    run.sink.emit(LoopEvent::GeoFeature(feature.clone()));
                    run.features.push(feature);
                }

                if base_tool_name(&tool_use.name) == REMOVE_FEATURE_TOOL
                    && let Some(feature_id) = removed_feature_id(&result)
                {
                    run.sink.emit(LoopEvent::RemoveGeoFeature { feature_id });
                }

                Ok(ContentBlock::tool_result(&tool_use.id, result))
            }
            Err(e) => {
                let error = e.to_string();
                warn!(tool = %tool_use.name, error = %error, "Tool execution failed");
                run.record(HistoryPayload::ToolError {
                    tool_use_id: tool_use.id.clone(),
                    tool_name: tool_use.name.clone(),
                    error: error.clone(),
                })
                .await?;
                run.sink.emit(LoopEvent::ToolError {
                    tool_use_id: tool_use.id.clone(),
                    tool_name: tool_use.name.clone(),
                    error: error.clone(),
                });

                Ok(ContentBlock::tool_error(&tool_use.id, &error))
            }
        }
    }
}

/// The id a successful removal reports. Anything else is ignored.
fn removed_feature_id(result: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(result).ok()?;
    if parsed.get("success")?.as_bool()? {
        parsed.get("removed_feature_id")?.as_str().map(str::to_string)
    } else {
        None
    }
}

/// Mutable state of one run.
struct Run<'a> {
    sink: &'a dyn ProgressSink,
    journal: Option<&'a dyn HistoryJournal>,
    state: LoopState,
    history: Vec<HistoryEntry>,
    features: Vec<GeoFeature>,
    usage: UsageTracker,
}

impl Run<'_> {
    fn transition(&mut self, next: LoopState) {
        debug!(from = ?self.state, to = ?next, "Loop transition");
        self.state = next;
    }

    async fn record(&mut self, payload: HistoryPayload) -> Result<()> {
        let entry = HistoryEntry::new(self.history.len() as u64 + 1, payload);
        if let Some(journal) = self.journal {
            journal.record(&entry).await?;
        }
        self.history.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedProvider, StubRouter, text_response, tool_response};
    use async_trait::async_trait;
    use geoagent_core::error::ProviderError;
    use geoagent_core::event::{ChannelSink, NoopSink};
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Asks for a tool on every call.
    #[derive(Default)]
    struct AlwaysToolUse {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl Provider for AlwaysToolUse {
        fn name(&self) -> &str {
            "always_tool_use"
        }

        async fn complete(&self, _request: ModelRequest) -> std::result::Result<ModelResponse, ProviderError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            let id = format!("toolu_{calls}");
            Ok(tool_response(&[(id.as_str(), "calculate_area", json!({}))]))
        }
    }

    #[derive(Default)]
    struct RecordingJournal {
        entries: Mutex<Vec<HistoryEntry>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl HistoryJournal for RecordingJournal {
        async fn record(&self, entry: &HistoryEntry) -> Result<()> {
            if self.fail_on == Some(entry.kind()) {
                return Err(Error::Internal("journal offline".into()));
            }
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    fn drain(rx: &mut UnboundedReceiver<LoopEvent>) -> Vec<LoopEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn agent(provider: Arc<dyn Provider>, router: Arc<dyn ToolRouter>) -> AgentLoop {
        AgentLoop::new(provider, router, "claude-sonnet-4-5-20250929")
    }

    #[tokio::test]
    async fn text_only_response_completes() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("Seattle is in Washington.")]));
        let agent = agent(provider.clone(), Arc::new(StubRouter::default()));
        let (sink, mut rx) = ChannelSink::channel();

        let result = agent.run("Where is Seattle?", Vec::new(), &[], &sink).await.unwrap();

        assert_eq!(result.final_text, "Seattle is in Washington.");
        let kinds: Vec<&str> = result.history.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["user_prompt", "llm_response"]);
        assert_eq!(result.history[0].sequence, 1);
        assert_eq!(result.history[1].sequence, 2);
        assert!(result.features.is_empty());
        assert_eq!(result.usage.api_calls, 1);
        assert_eq!(result.usage.total_tokens, 120);

        let events: Vec<&str> = drain(&mut rx).iter().map(LoopEvent::kind).collect();
        assert_eq!(events, vec!["user_prompt", "llm_response"]);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].turns, vec![Turn::user("Where is Seattle?")]);
        assert_eq!(requests[0].system, None);
    }

    #[tokio::test]
    async fn tool_round_preserves_request_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(&[
                ("toolu_a", "geocode_address", json!({"address": "Seattle"})),
                ("toolu_b", "calculate_distance", json!({"lat1": 1})),
            ]),
            text_response("Seattle is about 800 km away."),
        ]));
        let router = Arc::new(
            StubRouter::default()
                .with("geocode_address", Ok(r#"{"lat": 47.6, "lon": -122.3, "display_name": "Seattle, WA"}"#))
                .with("calculate_distance", Ok(r#"{"distance_km": 800}"#)),
        );
        let agent = agent(provider.clone(), router.clone());
        let (sink, mut rx) = ChannelSink::channel();
        let catalog = vec![ToolDefinition {
            name: "geocode_address".into(),
            description: "Geocode".into(),
            input_schema: json!({"type": "object"}),
        }];

        let result = agent
            .run("How far is Seattle?", Vec::new(), &catalog, &sink)
            .await
            .unwrap();

        assert_eq!(result.final_text, "Seattle is about 800 km away.");
        assert_eq!(router.calls(), vec!["geocode_address", "calculate_distance"]);
        assert_eq!(result.features.len(), 1);
        assert_eq!(result.features[0].label, "Seattle, WA");

        let events: Vec<&str> = drain(&mut rx).iter().map(LoopEvent::kind).collect();
        assert_eq!(
            events,
            vec![
                "user_prompt",
                "llm_response",
                "tool_call",
                "tool_result",
                "geo_feature",
                "tool_call",
                "tool_result",
                "llm_response",
            ]
        );

        let requests = provider.requests();
        assert_eq!(requests[0].tools, catalog);
        let second = &requests[1].turns;
        assert_eq!(second.len(), 3);
        assert_eq!(second[1].tool_use_ids(), vec!["toolu_a", "toolu_b"]);
        let Turn::ToolResults { results } = &second[2] else {
            panic!("expected tool results, got {:?}", second[2]);
        };
        let ids: Vec<&str> = results
            .iter()
            .map(|block| match block {
                ContentBlock::ToolResult { tool_use_id, .. } => tool_use_id.as_str(),
                other => panic!("unexpected block {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec!["toolu_a", "toolu_b"]);
        assert!(validate_turns(second).is_ok());
    }

    #[tokio::test]
    async fn tool_failure_is_fed_back_and_run_continues() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(&[("toolu_1", "calculate_area", json!({"coordinates": []}))]),
            text_response("I couldn't compute that area."),
        ]));
        let router = Arc::new(StubRouter::default().with("calculate_area", Err("polygon needs 3 points")));
        let agent = agent(provider.clone(), router);
        let (sink, mut rx) = ChannelSink::channel();

        let result = agent.run("Area?", Vec::new(), &[], &sink).await.unwrap();

        assert_eq!(result.final_text, "I couldn't compute that area.");
        let kinds: Vec<&str> = result.history.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec!["user_prompt", "llm_response", "tool_call", "tool_error", "llm_response"]
        );
        assert!(drain(&mut rx).contains(&LoopEvent::ToolError {
            tool_use_id: "toolu_1".into(),
            tool_name: "calculate_area".into(),
            error: "polygon needs 3 points".into(),
        }));

        let requests = provider.requests();
        assert_eq!(
            requests[1].turns[2],
            Turn::ToolResults {
                results: vec![ContentBlock::ToolResult {
                    tool_use_id: "toolu_1".into(),
                    content: "Error: polygon needs 3 points".into(),
                    is_error: true,
                }]
            }
        );
    }

    #[tokio::test]
    async fn round_limit_stops_after_exactly_max_rounds() {
        let provider = Arc::new(AlwaysToolUse::default());
        let router = Arc::new(StubRouter::default());
        let agent = agent(provider.clone(), router.clone());
        assert_eq!(agent.max_tool_rounds(), 10);

        let err = agent.run("Loop forever", Vec::new(), &[], &NoopSink).await.unwrap_err();

        assert!(matches!(err, Error::RoundLimitExceeded { limit: 10 }));
        assert_eq!(
            err.to_string(),
            "Maximum tool call limit (10) reached. Please try rephrasing your request."
        );
        assert_eq!(router.calls().len(), 10);
        assert_eq!(*provider.calls.lock().unwrap(), 11);
    }

    #[tokio::test]
    async fn configured_round_limit_is_honoured() {
        let provider = Arc::new(AlwaysToolUse::default());
        let router = Arc::new(StubRouter::default());
        let agent = agent(provider.clone(), router.clone()).with_max_tool_rounds(2);

        let err = agent.run("Loop", Vec::new(), &[], &NoopSink).await.unwrap_err();
        assert!(matches!(err, Error::RoundLimitExceeded { limit: 2 }));
        assert_eq!(router.calls().len(), 2);
    }

    #[tokio::test]
    async fn successful_removal_emits_event() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(&[
                ("toolu_1", "remove_map_feature", json!({"query": "Seattle"})),
                ("toolu_2", "mcp__gis__remove_map_feature", json!({"query": "Tacoma"})),
            ]),
            text_response("Removed."),
        ]));
        let router = Arc::new(
            StubRouter::default()
                .with(
                    "remove_map_feature",
                    Ok(r#"{"success": true, "removed_feature_id": "f-42", "message": "Removed feature: Seattle"}"#),
                )
                .with("mcp__gis__remove_map_feature", Ok("not json at all")),
        );
        let agent = agent(provider, router);
        let (sink, mut rx) = ChannelSink::channel();

        agent.run("Remove Seattle", Vec::new(), &[], &sink).await.unwrap();

        let removals: Vec<LoopEvent> = drain(&mut rx)
            .into_iter()
            .filter(|e| e.kind() == "remove_geo_feature")
            .collect();
        assert_eq!(removals, vec![LoopEvent::RemoveGeoFeature { feature_id: "f-42".into() }]);
    }

    #[test]
    fn removal_detection_requires_success() {
        assert_eq!(
            removed_feature_id(r#"{"success": true, "removed_feature_id": "f-1"}"#),
            Some("f-1".into())
        );
        assert_eq!(removed_feature_id(r#"{"success": false, "message": "No features"}"#), None);
        assert_eq!(removed_feature_id(r#"{"success": true}"#), None);
        assert_eq!(removed_feature_id("{"), None);
    }

    #[tokio::test]
    async fn tool_only_final_response_has_empty_text() {
        let mut response = tool_response(&[("toolu_1", "geocode_address", json!({}))]);
        response.stop_reason = StopReason::EndTurn;
        let agent = agent(Arc::new(ScriptedProvider::new(vec![response])), Arc::new(StubRouter::default()));

        let result = agent.run("Hi", Vec::new(), &[], &NoopSink).await.unwrap();
        assert_eq!(result.final_text, "");
    }

    #[tokio::test]
    async fn usage_accumulates_across_calls() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(&[("toolu_1", "geocode_address", json!({"address": "Oslo"}))]),
            text_response("Done"),
        ]));
        let agent = agent(provider, Arc::new(StubRouter::default()));

        let result = agent.run("Find Oslo", Vec::new(), &[], &NoopSink).await.unwrap();

        assert_eq!(result.usage.api_calls, 2);
        assert_eq!(result.usage.input_tokens, 300);
        assert_eq!(result.usage.output_tokens, 60);
        assert_eq!(result.usage.total_tokens, 360);
        // 300 * $3/M + 60 * $15/M
        assert!((result.usage.estimated_cost_usd - 0.0018).abs() < 1e-9);
    }

    #[tokio::test]
    async fn malformed_prior_turns_fail_before_model_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("unused")]));
        let agent = agent(provider.clone(), Arc::new(StubRouter::default()));
        let prior = vec![
            Turn::user("earlier"),
            Turn::ToolResults {
                results: vec![ContentBlock::tool_result("toolu_x", "{}")],
            },
        ];

        let err = agent.run("Next", prior, &[], &NoopSink).await.unwrap_err();
        assert!(matches!(err, Error::MalformedHistory { .. }));
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn prior_turns_and_system_prompt_reach_the_model() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("Still Seattle.")]));
        let agent = agent(provider.clone(), Arc::new(StubRouter::default()));
        let prior = vec![Turn::user("Where is Seattle?"), Turn::assistant_text("In Washington.")];

        agent
            .run_in(
                RunContext {
                    system_prompt: Some("You are a GIS assistant.".into()),
                    journal: None,
                },
                "And now?",
                prior,
                &[],
                &NoopSink,
            )
            .await
            .unwrap();

        let request = &provider.requests()[0];
        assert_eq!(request.system.as_deref(), Some("You are a GIS assistant."));
        assert_eq!(request.turns.len(), 3);
        assert_eq!(request.turns[2], Turn::user("And now?"));
    }

    #[tokio::test]
    async fn journal_sees_entries_as_they_happen() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(&[("toolu_1", "geocode_address", json!({"address": "Oslo"}))]),
            text_response("Done"),
        ]));
        let agent = agent(provider, Arc::new(StubRouter::default()));
        let journal = RecordingJournal::default();

        let result = agent
            .run_in(
                RunContext {
                    system_prompt: None,
                    journal: Some(&journal),
                },
                "Find Oslo",
                Vec::new(),
                &[],
                &NoopSink,
            )
            .await
            .unwrap();

        assert_eq!(*journal.entries.lock().unwrap(), result.history);
    }

    #[tokio::test]
    async fn journal_failure_fails_run_and_keeps_earlier_entries() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(&[("toolu_1", "geocode_address", json!({"address": "Oslo"}))]),
            text_response("Done"),
        ]));
        let router = Arc::new(StubRouter::default());
        let agent = agent(provider, router.clone());
        let journal = RecordingJournal {
            fail_on: Some("tool_result"),
            ..Default::default()
        };

        let err = agent
            .run_in(
                RunContext {
                    system_prompt: None,
                    journal: Some(&journal),
                },
                "Find Oslo",
                Vec::new(),
                &[],
                &NoopSink,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Internal(_)));
        let kinds: Vec<&str> = journal.entries.lock().unwrap().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["user_prompt", "llm_response", "tool_call"]);
        assert_eq!(router.calls().len(), 1);
    }

    #[tokio::test]
    async fn provider_failure_ends_the_run() {
        let agent = agent(Arc::new(ScriptedProvider::new(Vec::new())), Arc::new(StubRouter::default()));
        let err = agent.run("Hello", Vec::new(), &[], &NoopSink).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::InvalidResponse(_))));
    }
}
