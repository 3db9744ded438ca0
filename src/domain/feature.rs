//! Feature and geometry models
//!
//! A [`Feature`] is one attributed geometry record as delivered by the remote
//! service, keyed by the dataset's identity field. Changeset payloads also carry
//! a change tag; full payloads never do.

use crate::domain::ids::IdentityValue;
use crate::domain::{GeosyncError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Attribute carrying the change tag in changeset payloads
pub const CHANGE_TAG: &str = "__change__";

/// A GeoJSON position (`[x, y]` or `[x, y, z]`)
pub type Position = Vec<f64>;

/// GeoJSON geometry
///
/// Only the simple geometry types are modelled; geometry collections are not
/// produced by the service for vector layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    /// Single point
    Point(Position),
    /// Set of points
    MultiPoint(Vec<Position>),
    /// Polyline
    LineString(Vec<Position>),
    /// Set of polylines
    MultiLineString(Vec<Vec<Position>>),
    /// Polygon as exterior ring followed by holes
    Polygon(Vec<Vec<Position>>),
    /// Set of polygons
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Geometry {
    /// Visits every coordinate pair of the geometry
    pub fn for_each_xy(&self, mut f: impl FnMut(f64, f64)) {
        let mut visit = |p: &Position| {
            if p.len() >= 2 {
                f(p[0], p[1]);
            }
        };
        match self {
            Geometry::Point(p) => visit(p),
            Geometry::MultiPoint(ps) | Geometry::LineString(ps) => ps.iter().for_each(visit),
            Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => {
                lines.iter().flatten().for_each(visit)
            }
            Geometry::MultiPolygon(polys) => polys.iter().flatten().flatten().for_each(visit),
        }
    }

    /// Axis-aligned envelope, `None` for empty geometries
    pub fn envelope(&self) -> Option<BoundingBox> {
        let mut bbox: Option<BoundingBox> = None;
        self.for_each_xy(|x, y| {
            bbox = Some(match bbox {
                None => BoundingBox::new(x, y, x, y),
                Some(b) => BoundingBox::new(b.min_x.min(x), b.min_y.min(y), b.max_x.max(x), b.max_y.max(y)),
            });
        });
        bbox
    }

    /// True for polygonal geometries
    pub fn is_polygonal(&self) -> bool {
        matches!(self, Geometry::Polygon(_) | Geometry::MultiPolygon(_))
    }
}

/// Axis-aligned bounding box in the dataset coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum x
    pub min_x: f64,
    /// Minimum y
    pub min_y: f64,
    /// Maximum x
    pub max_x: f64,
    /// Maximum y
    pub max_y: f64,
}

impl BoundingBox {
    /// Creates a new bounding box
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Returns the box grown by `distance` on every side
    pub fn expanded(&self, distance: f64) -> Self {
        Self::new(
            self.min_x - distance,
            self.min_y - distance,
            self.max_x + distance,
            self.max_y + distance,
        )
    }

    /// True when the two boxes share at least one point
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// True when the point lies inside or on the box
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Closed rectangular polygon covering the box
    pub fn to_polygon(&self) -> Geometry {
        Geometry::Polygon(vec![vec![
            vec![self.min_x, self.min_y],
            vec![self.max_x, self.min_y],
            vec![self.max_x, self.max_y],
            vec![self.min_x, self.max_y],
            vec![self.min_x, self.min_y],
        ]])
    }

    /// WFS `bbox` parameter value: `minx,miny,maxx,maxy,EPSG:<wkid>`
    pub fn to_wfs_param(&self, wkid: u32) -> String {
        format!(
            "{},{},{},{},EPSG:{}",
            self.min_x, self.min_y, self.max_x, self.max_y, wkid
        )
    }
}

impl FromStr for BoundingBox {
    type Err = String;

    /// Parses `minx,miny,maxx,maxy`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| format!("Invalid bbox '{s}': {e}"))?;
        if parts.len() != 4 {
            return Err(format!(
                "Invalid bbox '{s}': expected minx,miny,maxx,maxy"
            ));
        }
        if parts[0] > parts[2] || parts[1] > parts[3] {
            return Err(format!("Invalid bbox '{s}': min exceeds max"));
        }
        Ok(Self::new(parts[0], parts[1], parts[2], parts[3]))
    }
}

/// Change tag carried by changeset records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    /// Record was created in the window
    Insert,
    /// Record was modified in the window
    Update,
    /// Record was removed in the window
    Delete,
}

impl ChangeKind {
    /// True for the deletion tag
    pub fn is_deletion(&self) -> bool {
        matches!(self, ChangeKind::Delete)
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("Unknown change tag '{other}'")),
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        };
        write!(f, "{s}")
    }
}

/// One attributed geometry record
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Value of the configured identity field
    pub identity: IdentityValue,
    /// Geometry, absent for attribute-only records and most deletions
    pub geometry: Option<Geometry>,
    /// Attributes, including the identity field and excluding the change tag
    pub properties: Map<String, Value>,
    /// Change tag, present only in changeset payloads
    pub change: Option<ChangeKind>,
}

/// A set of features produced by the geoprocessing engine
pub type FeatureSet = Vec<Feature>;

impl Feature {
    /// Creates a feature, writing the identity into its properties
    pub fn new(
        id_field: &str,
        identity: IdentityValue,
        geometry: Option<Geometry>,
        mut properties: Map<String, Value>,
    ) -> Self {
        properties.insert(id_field.to_string(), identity.to_json());
        Self {
            identity,
            geometry,
            properties,
            change: None,
        }
    }

    /// Sets the change tag
    pub fn with_change(mut self, change: ChangeKind) -> Self {
        self.change = Some(change);
        self
    }

    /// True when the record carries the deletion tag
    pub fn is_deletion(&self) -> bool {
        self.change.is_some_and(|c| c.is_deletion())
    }

    /// Parses a GeoJSON feature object
    ///
    /// The identity is read from `properties[id_field]` and normalised; the
    /// change tag is lifted out of the properties.
    ///
    /// # Errors
    ///
    /// Returns a serialization error when the object is not a feature, the
    /// identity is missing or unusable, or the change tag is unknown.
    pub fn from_geojson(value: &Value, id_field: &str) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| GeosyncError::Serialization("Feature is not a JSON object".into()))?;

        let mut properties = match object.get("properties") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(GeosyncError::Serialization(
                    "Feature properties must be an object".into(),
                ))
            }
        };

        let change = match properties.remove(CHANGE_TAG) {
            Some(Value::String(tag)) => Some(tag.parse::<ChangeKind>().map_err(GeosyncError::Serialization)?),
            Some(Value::Null) | None => None,
            Some(other) => {
                return Err(GeosyncError::Serialization(format!(
                    "Change tag must be a string, got {other}"
                )))
            }
        };

        let identity = properties
            .get(id_field)
            .and_then(IdentityValue::from_json)
            .ok_or_else(|| {
                GeosyncError::Serialization(format!(
                    "Feature is missing a usable identity field '{id_field}'"
                ))
            })?;
        properties.insert(id_field.to_string(), identity.to_json());

        let geometry = match object.get("geometry") {
            Some(Value::Null) | None => None,
            Some(g) => Some(serde_json::from_value::<Geometry>(g.clone())?),
        };

        Ok(Self {
            identity,
            geometry,
            properties,
            change,
        })
    }

    /// Serializes to a GeoJSON feature object (without the change tag)
    pub fn to_geojson(&self) -> Value {
        let geometry = self
            .geometry
            .as_ref()
            .and_then(|g| serde_json::to_value(g).ok())
            .unwrap_or(Value::Null);
        serde_json::json!({
            "type": "Feature",
            "geometry": geometry,
            "properties": Value::Object(self.properties.clone()),
        })
    }
}
