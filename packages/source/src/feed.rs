//! Category feed parsing.
//!
//! Each category feed is a `GeoJSON` `FeatureCollection` wrapped in a
//! JSONP callback (`callback({...})`). Parsing never fails past this
//! module: an unrecognized envelope or malformed collection yields zero
//! reports and a warning.

use std::sync::LazyLock;

use regex::Regex;
use road_reports_report_models::{Coordinates, RawReport, ReportCategory};
use serde::Deserialize;

/// Outermost parenthesized span of a JSONP body.
static ENVELOPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\((.*)\)").unwrap_or_else(|_| unreachable!()));

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(deserialize_with = "road_reports_report_models::serde_id::deserialize")]
    id: String,
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Vec<serde_json::Value>,
}

impl Geometry {
    /// Reads a `[lon, lat]` point. Anything else is treated as missing.
    fn point(&self) -> Option<Coordinates> {
        let lon = self.coordinates.first()?.as_f64()?;
        let lat = self.coordinates.get(1)?.as_f64()?;
        Some(Coordinates::new(lon, lat))
    }
}

/// Strips the JSONP callback wrapper, returning the JSON payload.
///
/// Returns `None` if the body has no parenthesized payload.
#[must_use]
pub fn unwrap_envelope(body: &str) -> Option<&str> {
    ENVELOPE_RE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Parses a category feed body into raw reports tagged with `category`.
///
/// Features keep their feed order. Features whose geometry is missing or
/// not a point are kept with `coordinates: None`; the detail merge drops
/// them later so they still occupy their slot in the details request.
#[must_use]
pub fn parse_feed(body: &str, category: ReportCategory) -> Vec<RawReport> {
    let Some(payload) = unwrap_envelope(body) else {
        log::warn!("{category}: response has no JSONP envelope, treating as empty");
        return Vec::new();
    };

    let collection: FeatureCollection = match serde_json::from_str(payload) {
        Ok(collection) => collection,
        Err(e) => {
            log::warn!("{category}: feature collection parse failed ({e}), treating as empty");
            return Vec::new();
        }
    };

    let reports: Vec<RawReport> = collection
        .features
        .into_iter()
        .map(|feature| RawReport {
            id: feature.id,
            category,
            coordinates: feature.geometry.as_ref().and_then(Geometry::point),
            properties: feature.properties.unwrap_or_default(),
        })
        .collect();

    log::debug!("{category}: parsed {} features", reports.len());
    reports
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"jsonCallback({"type":"FeatureCollection","features":[
        {"id":"101","type":"Feature","geometry":{"type":"Point","coordinates":[-77.43,37.54]},
         "properties":{"location_description":"I-64 E at Exit 190"}},
        {"id":102,"type":"Feature","geometry":null,
         "properties":{"location_description":"Route 1 N"}}
    ]})"#;

    #[test]
    fn unwraps_callback_envelope() {
        assert_eq!(unwrap_envelope("cb({\"a\":1})"), Some("{\"a\":1}"));
        assert_eq!(unwrap_envelope("cb(\n{\"a\":\n1}\n);"), Some("\n{\"a\":\n1}\n"));
        assert_eq!(unwrap_envelope("{\"a\":1}"), None);
    }

    #[test]
    fn parses_features_in_order_with_category() {
        let reports = parse_feed(BODY, ReportCategory::Construction);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].id, "101");
        assert_eq!(reports[1].id, "102");
        assert!(reports.iter().all(|r| r.category == ReportCategory::Construction));
        assert_eq!(reports[0].location_description(), Some("I-64 E at Exit 190"));
        let point = reports[0].coordinates.unwrap();
        assert!((point.longitude - -77.43).abs() < f64::EPSILON);
        assert!((point.latitude - 37.54).abs() < f64::EPSILON);
    }

    #[test]
    fn keeps_features_without_geometry() {
        let reports = parse_feed(BODY, ReportCategory::Incident);
        assert!(reports[1].coordinates.is_none());
    }

    #[test]
    fn missing_envelope_yields_nothing() {
        assert!(parse_feed("<html>503</html>", ReportCategory::Incident).is_empty());
    }

    #[test]
    fn malformed_payload_yields_nothing() {
        assert!(parse_feed("cb({\"features\": [)", ReportCategory::Incident).is_empty());
    }

    #[test]
    fn empty_collection() {
        assert!(parse_feed("cb({\"features\": []})", ReportCategory::Incident).is_empty());
        assert!(parse_feed("cb({})", ReportCategory::Incident).is_empty());
    }

    #[test]
    fn non_point_geometry_is_missing() {
        let body = r#"cb({"features":[{"id":"1","geometry":{"coordinates":[[1,2],[3,4]]}}]})"#;
        let reports = parse_feed(body, ReportCategory::Incident);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].coordinates.is_none());
        assert!(reports[0].properties.is_empty());
    }
}
