//! Remote data service request and response models

use crate::domain::timestamp::format_utc;
use crate::domain::{BoundingBox, Geometry, JobId, LayerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of an export validation or creation request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRequest {
    /// Output coordinate reference, `EPSG:<wkid>`
    pub crs: String,
    /// Layers to export
    pub items: Vec<ExportItem>,
    /// Output formats
    pub formats: ExportFormats,
    /// Crop polygon; the service clips geometries at its boundary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extent: Option<Geometry>,
}

/// One exported layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportItem {
    /// Layer URL
    pub item: String,
}

/// Requested export formats
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportFormats {
    /// Vector media type
    pub vector: String,
}

impl ExportRequest {
    /// Builds an export request for a single layer
    ///
    /// # Arguments
    ///
    /// * `api_base_url` - Service API root, with or without a trailing slash
    /// * `layer` - Layer to export
    /// * `wkid` - Output coordinate reference id
    /// * `vector_format` - Vector media type
    /// * `extent` - Crop rectangle, already buffered
    pub fn new(
        api_base_url: &str,
        layer: &LayerId,
        wkid: u32,
        vector_format: &str,
        extent: Option<BoundingBox>,
    ) -> Self {
        Self {
            crs: format!("EPSG:{wkid}"),
            items: vec![ExportItem {
                item: format!("{}/layers/{}/", api_base_url.trim_end_matches('/'), layer),
            }],
            formats: ExportFormats {
                vector: vector_format.to_string(),
            },
            extent: extent.map(|bbox| bbox.to_polygon()),
        }
    }
}

/// Response of the export validation endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ExportValidation {
    /// Per-item validation results
    #[serde(default)]
    pub items: Vec<ValidatedItem>,
}

/// Validation result for one item
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatedItem {
    /// Whether the item can be exported as requested
    #[serde(default = "default_true")]
    pub is_valid: bool,
    /// Reasons given by the service when invalid
    #[serde(default)]
    pub invalid_reasons: Value,
}

impl ExportValidation {
    /// Items the service rejected
    pub fn invalid_items(&self) -> impl Iterator<Item = &ValidatedItem> {
        self.items.iter().filter(|item| !item.is_valid)
    }
}

fn default_true() -> bool {
    true
}

/// Coarse phase of a remote export job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    /// Still being generated
    Processing,
    /// Artifact can be downloaded
    Ready,
    /// The service gave up on the job
    Failed,
}

/// Export job status as reported by the service
#[derive(Debug, Clone, PartialEq)]
pub struct ExportStatus {
    /// Job identifier
    pub id: JobId,
    /// Raw state string (`processing`, `complete`, `error`, ...)
    pub state: String,
    /// Progress between 0 and 1 when reported
    pub progress: Option<f64>,
    /// When the job was created
    pub created_at: Option<DateTime<Utc>>,
    /// Status URL of the job
    pub url: Option<String>,
    /// Download URL, present once the job is complete
    pub download_url: Option<String>,
}

impl ExportStatus {
    /// Reads a status document
    ///
    /// Returns `None` when the document has no usable `id`.
    pub fn from_json(value: &Value) -> Option<Self> {
        let id = value.get("id").and_then(JobId::from_json)?;
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let progress = value.get("progress").and_then(|p| match p {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        });
        let created_at = text("created_at")
            .and_then(|s| crate::domain::timestamp::parse_utc(&s).ok());
        Some(Self {
            id,
            state: text("state").unwrap_or_default(),
            progress,
            created_at,
            url: text("url"),
            download_url: text("download_url"),
        })
    }

    /// Maps the service state onto a phase
    pub fn phase(&self) -> ExportPhase {
        match self.state.to_ascii_lowercase().as_str() {
            "complete" | "completed" | "ready" => ExportPhase::Ready,
            "error" | "failed" | "cancelled" | "gone" => ExportPhase::Failed,
            _ => ExportPhase::Processing,
        }
    }
}

/// Request-time spatial or attribute constraint of a changeset request
///
/// The feed accepts at most one of them per request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestConstraint {
    /// Whole layer
    None,
    /// CQL attribute filter
    Filter(String),
    /// Intersecting bounding box
    BoundingBox(BoundingBox),
}

/// Changeset feed query
#[derive(Debug, Clone, PartialEq)]
pub struct ChangesetQuery {
    /// Layer to query
    pub layer: LayerId,
    /// Output coordinate reference id
    pub wkid: u32,
    /// Window start (inclusive)
    pub from: DateTime<Utc>,
    /// Window end (exclusive)
    pub to: DateTime<Utc>,
    /// Request constraint
    pub constraint: RequestConstraint,
}

impl ChangesetQuery {
    /// WFS `GetFeature` query parameters
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("service", "WFS".to_string()),
            ("version", "2.0.0".to_string()),
            ("request", "GetFeature".to_string()),
            ("typeNames", format!("layer-{}-changeset", self.layer)),
            ("srsName", format!("EPSG:{}", self.wkid)),
            ("outputFormat", "json".to_string()),
            (
                "viewparams",
                format!("from:{};to:{}", format_utc(&self.from), format_utc(&self.to)),
            ),
        ];
        match &self.constraint {
            RequestConstraint::None => {}
            RequestConstraint::Filter(cql) => params.push(("cql_filter", cql.clone())),
            RequestConstraint::BoundingBox(bbox) => {
                params.push(("bbox", bbox.to_wfs_param(self.wkid)))
            }
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn query(constraint: RequestConstraint) -> ChangesetQuery {
        ChangesetQuery {
            layer: LayerId::new("50772").unwrap(),
            wkid: 2193,
            from: Utc.with_ymd_and_hms(2024, 6, 20, 1, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2024, 6, 20, 2, 0, 0).unwrap(),
            constraint,
        }
    }

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_changeset_params() {
        let params = query(RequestConstraint::None).to_params();
        assert_eq!(param(&params, "typeNames"), Some("layer-50772-changeset"));
        assert_eq!(param(&params, "srsName"), Some("EPSG:2193"));
        assert_eq!(
            param(&params, "viewparams"),
            Some("from:2024-06-20T01:00:00Z;to:2024-06-20T02:00:00Z")
        );
        assert!(param(&params, "bbox").is_none());
        assert!(param(&params, "cql_filter").is_none());
    }

    #[test]
    fn test_changeset_params_carry_one_constraint() {
        let params = query(RequestConstraint::Filter("status='current'".into())).to_params();
        assert_eq!(param(&params, "cql_filter"), Some("status='current'"));
        assert!(param(&params, "bbox").is_none());

        let params =
            query(RequestConstraint::BoundingBox(BoundingBox::new(1.0, 2.0, 3.0, 4.0))).to_params();
        assert_eq!(param(&params, "bbox"), Some("1,2,3,4,EPSG:2193"));
        assert!(param(&params, "cql_filter").is_none());
    }

    #[test]
    fn test_export_request_body() {
        let request = ExportRequest::new(
            "https://data.example.com/services/api/v1.x",
            &LayerId::new("50772").unwrap(),
            2193,
            "application/vnd.geo+json",
            Some(BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
        );
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["crs"], "EPSG:2193");
        assert_eq!(
            body["items"][0]["item"],
            "https://data.example.com/services/api/v1.x/layers/50772/"
        );
        assert_eq!(body["formats"]["vector"], "application/vnd.geo+json");
        assert_eq!(body["extent"]["type"], "Polygon");
    }

    #[test]
    fn test_export_request_without_extent_omits_member() {
        let request = ExportRequest::new("https://x/", &LayerId::new("1").unwrap(), 2193, "f", None);
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("extent").is_none());
    }

    #[test]
    fn test_status_phases() {
        let status = |state: &str| {
            ExportStatus::from_json(&json!({"id": 901, "state": state})).unwrap().phase()
        };
        assert_eq!(status("processing"), ExportPhase::Processing);
        assert_eq!(status("complete"), ExportPhase::Ready);
        assert_eq!(status("error"), ExportPhase::Failed);
        assert_eq!(status("cancelled"), ExportPhase::Failed);
        assert_eq!(status(""), ExportPhase::Processing);
    }

    #[test]
    fn test_status_parses_numeric_id_and_progress() {
        let status = ExportStatus::from_json(&json!({
            "id": 901,
            "state": "processing",
            "progress": "0.25",
            "created_at": "2024-06-20T01:59:00Z",
            "url": "https://x/exports/901/"
        }))
        .unwrap();
        assert_eq!(status.id.as_str(), "901");
        assert_eq!(status.progress, Some(0.25));
        assert!(status.created_at.is_some());
        assert!(status.download_url.is_none());
        assert!(ExportStatus::from_json(&json!({"state": "processing"})).is_none());
    }

    #[test]
    fn test_validation_invalid_items() {
        let validation: ExportValidation = serde_json::from_value(json!({
            "items": [{"is_valid": true}, {"is_valid": false, "invalid_reasons": ["too big"]}]
        }))
        .unwrap();
        assert_eq!(validation.invalid_items().count(), 1);
    }
}
