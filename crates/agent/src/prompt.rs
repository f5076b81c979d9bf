//! System prompt for the GIS assistant.

use geoagent_core::feature::StoredFeature;
use geoagent_core::message::ConversationId;

const SYSTEM_CONTEXT: &str = "You are a GIS (Geographic Information Systems) processing assistant.

You help users with geospatial data analysis, manipulation, and transformation tasks.

The user is viewing a map interface. When you use tools that return GeoFeature objects,
those features will automatically appear on the map. The user may reference \"the map\"
when asking questions or giving commands about the displayed geographic data.

If a user asks for a feature to be added to the map you only need to geolocate it. That is
enough to get it mapped.
";

/// Build the system prompt: the assistant role, what is on the map, and the
/// conversation id the removal tool needs.
pub fn build_system_prompt(conversation_id: &ConversationId, features: &[StoredFeature]) -> String {
    format!(
        "{SYSTEM_CONTEXT}{}\n\nConversation ID: {conversation_id}",
        map_context(features)
    )
}

fn map_context(features: &[StoredFeature]) -> String {
    if features.is_empty() {
        return "\n\nThe map currently has no features.".to_string();
    }

    let mut context = String::from("\n\nCurrent map features:\n");
    for feature in features {
        context.push_str(&format!(
            "- {}: \"{}\" at ({}, {})\n",
            feature.feature_type,
            feature.display_label(),
            feature.latitude,
            feature.longitude
        ));
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stored(label: Option<&str>, latitude: f64, longitude: f64) -> StoredFeature {
        StoredFeature {
            id: "f".into(),
            message_id: "m".into(),
            feature_type: "marker".into(),
            latitude,
            longitude,
            label: label.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_map() {
        let prompt = build_system_prompt(&ConversationId::from("conv-1"), &[]);
        assert!(prompt.starts_with("You are a GIS (Geographic Information Systems) processing assistant."));
        assert!(prompt.contains("\n\nThe map currently has no features."));
        assert!(prompt.ends_with("\n\nConversation ID: conv-1"));
    }

    #[test]
    fn lists_features_with_coordinates() {
        let features = vec![stored(Some("Seattle, WA"), 47.6062, -122.3321), stored(None, 45.0, 10.5)];
        let prompt = build_system_prompt(&ConversationId::from("conv-2"), &features);

        assert!(prompt.contains(
            "Current map features:\n\
             - marker: \"Seattle, WA\" at (47.6062, -122.3321)\n\
             - marker: \"Unlabeled\" at (45, 10.5)\n"
        ));
        assert!(!prompt.contains("no features"));
        assert!(prompt.ends_with("Conversation ID: conv-2"));
    }
}
