#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Road report categories, raw feed records, and the merged report type.
//!
//! A fetch cycle produces [`RawReport`] records (one per feed feature,
//! tagged with its [`ReportCategory`]). After the detail merge drops the
//! records without geometry, each survivor becomes a [`Report`] that the
//! session registry owns until the next cycle replaces it.

pub mod serde_id;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Property key holding the free-text location of a report.
pub const LOCATION_DESCRIPTION_KEY: &str = "location_description";

/// Classification of a report, one per published category feed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReportCategory {
    /// Road closed because of weather.
    WeatherClosure,
    /// Traffic incident.
    Incident,
    /// Work zone or scheduled construction.
    Construction,
    /// Incident with major traffic impact.
    HighImpactIncident,
}

impl ReportCategory {
    /// Every category, in the order feeds are requested.
    pub const ALL: &[Self] = &[
        Self::WeatherClosure,
        Self::Incident,
        Self::Construction,
        Self::HighImpactIncident,
    ];

    /// Heading shown above a report's detail popover.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::WeatherClosure => "WEATHER CLOSURE",
            Self::Incident => "INCIDENT",
            Self::Construction => "CONSTRUCTION",
            Self::HighImpactIncident => "HIGH PRIORITY INCIDENT",
        }
    }

    /// Base name of the marker icon image (without extension).
    #[must_use]
    pub fn icon_name(self) -> &'static str {
        match self {
            Self::HighImpactIncident => "incident_major",
            other => other.into(),
        }
    }
}

/// A WGS84 point as published by the feeds (`[lon, lat]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Longitude in degrees.
    pub longitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
}

impl Coordinates {
    /// Creates a point from a longitude/latitude pair.
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Projects the point to spherical web mercator (EPSG:3857), returning
    /// `(x, y)` in meters.
    #[must_use]
    pub fn to_web_mercator(self) -> (f64, f64) {
        const EARTH_RADIUS_M: f64 = 6_378_137.0;
        let x = EARTH_RADIUS_M * self.longitude.to_radians();
        let y = EARTH_RADIUS_M
            * (std::f64::consts::FRAC_PI_4 + self.latitude.to_radians() / 2.0)
                .tan()
                .ln();
        (x, y)
    }
}

/// One feature from a category feed, before detail correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReport {
    /// Feed identifier, also used in the details request.
    pub id: String,
    /// Category of the feed this record came from.
    pub category: ReportCategory,
    /// Point geometry. `None` when the feature had no usable geometry.
    pub coordinates: Option<Coordinates>,
    /// Raw feature properties.
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl RawReport {
    /// Returns the `location_description` property, if it is a string.
    #[must_use]
    pub fn location_description(&self) -> Option<&str> {
        self.properties
            .get(LOCATION_DESCRIPTION_KEY)
            .and_then(serde_json::Value::as_str)
    }
}

/// Opaque handle to a marker created by the map host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerHandle(pub u64);

/// Opaque handle to a table row created by the map host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowHandle(pub u64);

/// A merged report: feed data, correlated detail, and archive state.
///
/// `marker` and `row` are back-references into the presentation layer.
/// They are ignored by equality.
#[derive(Debug, Clone)]
pub struct Report {
    /// Feed identifier.
    pub id: String,
    /// Category of the originating feed.
    pub category: ReportCategory,
    /// Free-text location, the primary display and sort key.
    pub location_description: String,
    /// Point location in WGS84.
    pub coordinates: Coordinates,
    /// Raw feature properties, reachable from `properties.*` sort keys.
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// Narrative detail correlated from the details response.
    pub detail_html: Option<String>,
    /// Whether the report is in the archive. Derived from settings.
    pub archived: bool,
    /// Marker rendered for this report, once the host created one.
    pub marker: Option<MarkerHandle>,
    /// Table row rendered for this report, once the host created one.
    pub row: Option<RowHandle>,
}

impl Report {
    /// Builds a report from a raw record that has geometry.
    ///
    /// Returns `None` for records without coordinates.
    #[must_use]
    pub fn from_raw(raw: RawReport, detail_html: Option<String>) -> Option<Self> {
        let coordinates = raw.coordinates?;
        let location_description = raw.location_description().unwrap_or_default().to_string();
        Some(Self {
            id: raw.id,
            category: raw.category,
            location_description,
            coordinates,
            properties: raw.properties,
            detail_html,
            archived: false,
            marker: None,
            row: None,
        })
    }

    /// Label of the popover action that flips the archive state.
    #[must_use]
    pub const fn archive_action_label(&self) -> &'static str {
        if self.archived {
            "Un-Archive"
        } else {
            "Archive"
        }
    }

    /// Plain-text body of the detail popover.
    #[must_use]
    pub fn popover_text(&self) -> String {
        let mut text = self.location_description.clone();
        if let Some(detail) = &self.detail_html {
            text.push_str("\n\n");
            text.push_str(detail);
        }
        text.push_str("\n\n[");
        text.push_str(self.archive_action_label());
        text.push(']');
        text
    }
}

impl PartialEq for Report {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.category == other.category
            && self.location_description == other.location_description
            && self.coordinates == other.coordinates
            && self.properties == other.properties
            && self.detail_html == other.detail_html
            && self.archived == other.archived
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    fn raw(id: &str, coordinates: Option<Coordinates>) -> RawReport {
        let mut properties = serde_json::Map::new();
        properties.insert(
            LOCATION_DESCRIPTION_KEY.to_string(),
            serde_json::Value::String(format!("I-95 at exit {id}")),
        );
        RawReport {
            id: id.to_string(),
            category: ReportCategory::Incident,
            coordinates,
            properties,
        }
    }

    #[test]
    fn category_names_match_feed_names() {
        assert_eq!(ReportCategory::WeatherClosure.as_ref(), "weather_closure");
        assert_eq!(
            ReportCategory::from_str("high_impact_incident").unwrap(),
            ReportCategory::HighImpactIncident
        );
        assert_eq!(
            serde_json::to_string(&ReportCategory::Construction).unwrap(),
            "\"construction\""
        );
    }

    #[test]
    fn high_impact_uses_major_incident_icon() {
        assert_eq!(
            ReportCategory::HighImpactIncident.icon_name(),
            "incident_major"
        );
        assert_eq!(ReportCategory::Construction.icon_name(), "construction");
    }

    #[test]
    fn report_requires_geometry() {
        assert!(Report::from_raw(raw("1", None), None).is_none());
        let report =
            Report::from_raw(raw("1", Some(Coordinates::new(-77.4, 37.5))), None).unwrap();
        assert_eq!(report.location_description, "I-95 at exit 1");
        assert!(!report.archived);
    }

    #[test]
    fn equality_ignores_presentation_handles() {
        let a = Report::from_raw(raw("2", Some(Coordinates::new(-77.0, 38.0))), None).unwrap();
        let mut b = a.clone();
        b.marker = Some(MarkerHandle(7));
        b.row = Some(RowHandle(9));
        assert_eq!(a, b);
    }

    #[test]
    fn popover_text_reflects_archive_state() {
        let mut report = Report::from_raw(
            raw("3", Some(Coordinates::new(-77.0, 38.0))),
            Some("Left lane closed".to_string()),
        )
        .unwrap();
        assert!(report.popover_text().contains("Left lane closed"));
        assert!(report.popover_text().ends_with("[Archive]"));
        report.archived = true;
        assert!(report.popover_text().ends_with("[Un-Archive]"));
    }

    #[test]
    fn web_mercator_origin_and_sign() {
        let (x, y) = Coordinates::new(0.0, 0.0).to_web_mercator();
        assert!(x.abs() < 1e-6);
        assert!(y.abs() < 1e-6);
        let (x, y) = Coordinates::new(-77.0, 38.0).to_web_mercator();
        assert!(x < 0.0);
        assert!(y > 0.0);
    }
}
