//! `geoagent ask` — Send one message and print the run as it happens.

use anyhow::Context;
use geoagent_agent::LoopResult;
use geoagent_config::AppConfig;
use geoagent_core::event::LoopEvent;
use geoagent_core::message::ConversationId;
use std::sync::Arc;

pub async fn run(
    config: AppConfig,
    message: String,
    conversation: Option<String>,
    ephemeral: bool,
) -> anyhow::Result<()> {
    let store = super::open_store(&config, ephemeral).await?;
    let service = geoagent_gateway::assemble(&config, Arc::clone(&store))?;

    let conversation_id = match conversation {
        Some(id) => ConversationId::from(&id),
        None => ConversationId::new(),
    };

    println!("🗺️  geoagent ({})", config.anthropic.model);
    println!("   Conversation: {conversation_id}");
    if ephemeral {
        println!("   Store: in-memory (nothing is kept)");
    }
    println!();

    let print_event = |event: LoopEvent| println!("{}", describe(&event));
    let result = service
        .send_message(&conversation_id, &message, &print_event)
        .await
        .context("Run failed")?;

    print_result(&result);
    Ok(())
}

fn print_result(result: &LoopResult) {
    println!();
    println!("{}", result.final_text);
    println!();
    if !result.features.is_empty() {
        println!("📍 {} feature(s) added to the map", result.features.len());
    }
    let usage = &result.usage;
    println!(
        "📊 {} API call(s), {} input + {} output = {} tokens, ${:.4}",
        usage.api_calls, usage.input_tokens, usage.output_tokens, usage.total_tokens, usage.estimated_cost_usd
    );
}

/// One terminal line per loop event.
fn describe(event: &LoopEvent) -> String {
    match event {
        LoopEvent::UserPrompt { prompt } => format!("› {prompt}"),
        LoopEvent::LlmResponse { stop_reason, content } => {
            format!("… model replied ({stop_reason}, {} block(s))", content.len())
        }
        LoopEvent::ToolCall {
            tool_name, arguments, ..
        } => format!("🔧 {tool_name} {arguments}"),
        LoopEvent::ToolResult { tool_name, result, .. } => {
            format!("   {tool_name} → {}", truncate(result, 120))
        }
        LoopEvent::ToolError { tool_name, error, .. } => format!("   {tool_name} ✗ {error}"),
        LoopEvent::GeoFeature(feature) => format!(
            "📍 {} at ({}, {})",
            feature.label, feature.latitude, feature.longitude
        ),
        LoopEvent::RemoveGeoFeature { feature_id } => format!("🗑️  removed feature {feature_id}"),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("héllo wörld", 5), "héllo…");
    }

    #[test]
    fn describes_tool_calls_and_features() {
        let call = LoopEvent::ToolCall {
            tool_use_id: "toolu_1".into(),
            tool_name: "geocode_address".into(),
            arguments: serde_json::json!({"address": "Paris"}),
        };
        assert_eq!(describe(&call), r#"🔧 geocode_address {"address":"Paris"}"#);

        let removed = LoopEvent::RemoveGeoFeature {
            feature_id: "f-1".into(),
        };
        assert!(describe(&removed).contains("f-1"));
    }
}
