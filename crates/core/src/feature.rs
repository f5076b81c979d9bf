//! Map features derived from tool results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The geometry type of a feature. Only point markers exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    #[default]
    Marker,
}

impl FeatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Marker => "marker",
        }
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A renderable point of interest, as sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFeature {
    pub id: String,

    #[serde(rename = "type", default)]
    pub kind: FeatureKind,

    #[serde(rename = "lat")]
    pub latitude: f64,

    #[serde(rename = "lon")]
    pub longitude: f64,

    pub label: String,
}

/// A feature as persisted, tied to the assistant message that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFeature {
    pub id: String,
    pub message_id: String,
    pub feature_type: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredFeature {
    pub fn display_label(&self) -> &str {
        self.label.as_deref().filter(|l| !l.is_empty()).unwrap_or("Unlabeled")
    }

    /// Back to the client shape; unlabeled features keep an empty label.
    pub fn to_feature(&self) -> GeoFeature {
        GeoFeature {
            id: self.id.clone(),
            kind: FeatureKind::Marker,
            latitude: self.latitude,
            longitude: self.longitude,
            label: self.label.clone().unwrap_or_default(),
        }
    }
}
