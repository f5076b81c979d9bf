//! Map features derived from tool results.
//!
//! Extraction is a pure function of the tool request and its result text:
//! the same input always yields the same features, including their ids, and
//! anything that does not parse yields no features at all.

use geoagent_core::feature::{FeatureKind, GeoFeature};
use geoagent_core::tool::{ToolUse, base_tool_name};
use serde_json::Value;
use uuid::Uuid;

const GEOCODE_TOOL: &str = "geocode_address";

/// Extract the features a successful tool result describes.
pub fn extract_features(tool_use: &ToolUse, result: &str) -> Vec<GeoFeature> {
    match base_tool_name(&tool_use.name) {
        GEOCODE_TOOL => geocode_feature(tool_use, result).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn geocode_feature(tool_use: &ToolUse, result: &str) -> Option<GeoFeature> {
    let parsed: Value = serde_json::from_str(result).ok()?;
    let latitude = coordinate(parsed.get("lat")?)?;
    let longitude = coordinate(parsed.get("lon")?)?;

    let label = non_empty_str(&parsed, "display_name")
        .or_else(|| non_empty_str(&parsed, "address"))
        .or_else(|| non_empty_str(&tool_use.arguments, "address"))
        .unwrap_or("Unknown")
        .to_string();

    Some(GeoFeature {
        id: feature_id(&tool_use.id, 0),
        kind: FeatureKind::Marker,
        latitude,
        longitude,
        label,
    })
}

/// Numbers and numeric strings are both accepted.
fn coordinate(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn feature_id(tool_use_id: &str, index: usize) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{tool_use_id}:{index}").as_bytes()).to_string()
}
