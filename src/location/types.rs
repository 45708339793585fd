//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default NUTS nomenclature year queried from GISCO.
pub const DEFAULT_NUTS_YEAR: u16 = 2013;

/// Location resolution errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("place not found: {0}")]
    PlaceNotFound(String),
    #[error("NUTS region not found for location ({lat}, {lon})")]
    NutsNotFound { lat: f64, lon: f64 },
    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A free-text place description, e.g. "Bremen, Germany".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Place(String);

impl Place {
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("no place given".into()));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Query-string form: commas become spaces, words are joined with `+`.
    ///
    /// ```
    /// # use place2nuts::location::Place;
    /// let place = Place::new("Bremen, Germany").unwrap();
    /// assert_eq!(place.to_url(), "Bremen+Germany");
    /// ```
    pub fn to_url(&self) -> String {
        self.0
            .replace(',', " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("+")
    }
}

impl TryFrom<String> for Place {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<Place> for String {
    fn from(p: Place) -> Self {
        p.0
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Geographic coordinates in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub lat: f64,
    pub lon: f64,
}

impl GeoLocation {
    /// Validated constructor: both coordinates present, finite and in range.
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        Self::from_parts(Some(lat), Some(lon))
    }

    pub fn from_parts(lat: Option<f64>, lon: Option<f64>) -> Result<Self> {
        let (lat, lon) = match (lat, lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            (None, _) => return Err(Error::InvalidInput("missing latitude".into())),
            (_, None) => return Err(Error::InvalidInput("missing longitude".into())),
        };
        if !lat.is_finite() || !lon.is_finite() {
            return Err(Error::InvalidInput(format!("non-finite coordinates ({}, {})", lat, lon)));
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(Error::InvalidInput(format!(
                "coordinates ({}, {}) out of range (lat -90..90, lon -180..180)",
                lat, lon
            )));
        }
        Ok(Self { lat, lon })
    }

    /// Point in (x = lon, y = lat) order.
    pub fn to_point(&self) -> geo::Point<f64> {
        geo::Point::new(self.lon, self.lat)
    }
}

impl fmt::Display for GeoLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lon)
    }
}

/// A NUTS region as identified by GISCO or a boundary dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutsRegion {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
}

impl NutsRegion {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            level: None,
        }
    }

    pub fn with_level(mut self, level: Option<u8>) -> Self {
        self.level = level;
        self
    }
}

impl fmt::Display for NutsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NUTS ID: {} - NUTS name: {}", self.id, self.name)
    }
}

/// Input of [`crate::location::PlaceResolver::resolve_location`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceQuery {
    Place(Place),
    Coordinates { lat: Option<f64>, lon: Option<f64> },
}

impl PlaceQuery {
    pub fn place(text: impl Into<String>) -> Result<Self> {
        Place::new(text).map(Self::Place)
    }

    pub fn coordinates(lat: f64, lon: f64) -> Self {
        Self::Coordinates {
            lat: Some(lat),
            lon: Some(lon),
        }
    }
}

impl From<Place> for PlaceQuery {
    fn from(p: Place) -> Self {
        Self::Place(p)
    }
}

impl From<GeoLocation> for PlaceQuery {
    fn from(loc: GeoLocation) -> Self {
        Self::coordinates(loc.lat, loc.lon)
    }
}

/// Parameters of a NUTS lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NutsQuery {
    pub year: u16,
    /// Restrict matches to this NUTS level (0-3).
    pub level: Option<u8>,
}

impl NutsQuery {
    pub fn new(year: u16) -> Self {
        Self { year, level: None }
    }

    pub fn at_level(mut self, level: u8) -> Self {
        self.level = Some(level);
        self
    }
}

impl Default for NutsQuery {
    fn default() -> Self {
        Self::new(DEFAULT_NUTS_YEAR)
    }
}

/// Outcome of the full place → location → NUTS workflow.
///
/// `nuts` is `None` only in offline mode, when no boundary contains the point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub location: GeoLocation,
    pub nuts: Option<NutsRegion>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_to_url() {
        let p = Place::new("Bremen, Germany").unwrap();
        assert_eq!(p.to_url(), "Bremen+Germany");
        let p = Place::new("  Brussels ,Belgium  ").unwrap();
        assert_eq!(p.to_url(), "Brussels+Belgium");
    }

    #[test]
    fn test_place_rejects_blank() {
        assert!(matches!(Place::new("   "), Err(Error::InvalidInput(_))));
        assert!(matches!(PlaceQuery::place(""), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_location_requires_both_coordinates() {
        assert!(matches!(GeoLocation::from_parts(None, Some(8.8)), Err(Error::InvalidInput(_))));
        assert!(matches!(GeoLocation::from_parts(Some(53.08), None), Err(Error::InvalidInput(_))));
        let loc = GeoLocation::from_parts(Some(53.08), Some(8.8)).unwrap();
        assert_eq!(loc, GeoLocation { lat: 53.08, lon: 8.8 });
    }

    #[test]
    fn test_location_rejects_nan_and_out_of_range() {
        assert!(GeoLocation::new(f64::NAN, 0.0).is_err());
        assert!(GeoLocation::new(91.0, 0.0).is_err());
        assert!(GeoLocation::new(0.0, -180.5).is_err());
    }

    #[test]
    fn test_point_is_lon_lat() {
        let p = GeoLocation::new(53.08, 8.8).unwrap().to_point();
        assert_eq!(p.x(), 8.8);
        assert_eq!(p.y(), 53.08);
    }

    #[test]
    fn test_region_display() {
        let r = NutsRegion::new("DE50", "Bremen");
        assert_eq!(r.to_string(), "NUTS ID: DE50 - NUTS name: Bremen");
    }

    #[test]
    fn test_nuts_query_default_year() {
        assert_eq!(NutsQuery::default().year, 2013);
        assert_eq!(NutsQuery::new(2016).at_level(2).level, Some(2));
    }
}
