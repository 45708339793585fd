//! Location providers: GISCO, Nominatim and Google geocoding, GISCO NUTS lookup.

use super::transport::Transport;
use super::types::{Error, GeoLocation, NutsQuery, NutsRegion, Place, Result};
use crate::url::{Protocol, UrlBuilder};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Eurostat GISCO REST root.
pub const GISCO_DOMAIN: &str = "europa.eu/webtools/rest/gisco";
pub const NOMINATIM_DOMAIN: &str = "nominatim.openstreetmap.org";
pub const GOOGLE_DOMAIN: &str = "maps.googleapis.com";

/// Projection requested for geometries returned by `find-nuts.py`.
const NUTS_PROJECTION: u16 = 3035;

/// Forward (and optionally reverse) geocoding against a remote service.
pub trait Geocoder: Send + Sync {
    /// Short provider name for logs and messages.
    fn name(&self) -> &'static str;

    fn geocode(&self, transport: &dyn Transport, place: &Place) -> Result<GeoLocation>;

    fn reverse(&self, _transport: &dyn Transport, _location: &GeoLocation) -> Result<Vec<String>> {
        Err(Error::Configuration(format!(
            "reverse geocoding not supported by {}",
            self.name()
        )))
    }
}

// ─── Response shapes ────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct LatLng {
    lat: Option<f64>,
    lng: Option<f64>,
}

#[derive(Deserialize, Debug)]
struct ResultGeometry {
    location: Option<LatLng>,
}

#[derive(Deserialize, Debug)]
struct AddressComponent {
    long_name: String,
}

#[derive(Deserialize, Debug)]
struct GeocodeResult {
    geometry: Option<ResultGeometry>,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Deserialize, Debug)]
struct FeatureGeometry {
    coordinates: Vec<f64>,
}

#[derive(Deserialize, Debug)]
struct GeocodeFeature {
    geometry: Option<FeatureGeometry>,
}

/// Bodies accepted from geocoding endpoints.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum GeocodeResponse {
    Results {
        results: Vec<GeocodeResult>,
        #[serde(default)]
        status: Option<String>,
    },
    Features {
        features: Vec<GeocodeFeature>,
    },
    List(Vec<GeocodeResult>),
}

fn not_found(place: &Place, why: impl std::fmt::Display) -> Error {
    Error::PlaceNotFound(format!("'{}': {}", place, why))
}

/// Extract the first result's location from a geocoding body.
fn parse_geocode(place: &Place, body: &str) -> Result<GeoLocation> {
    let response: GeocodeResponse =
        serde_json::from_str(body).map_err(|e| not_found(place, format!("malformed response ({})", e)))?;

    let (lat, lng) = match response {
        GeocodeResponse::Results { results, status } => {
            let first = results.into_iter().next().ok_or_else(|| {
                not_found(place, status.map_or("no results".to_string(), |s| format!("no results (status {})", s)))
            })?;
            let loc = first
                .geometry
                .and_then(|g| g.location)
                .ok_or_else(|| not_found(place, "result without geometry.location"))?;
            (loc.lat, loc.lng)
        }
        GeocodeResponse::List(results) => {
            let first = results.into_iter().next().ok_or_else(|| not_found(place, "no results"))?;
            let loc = first
                .geometry
                .and_then(|g| g.location)
                .ok_or_else(|| not_found(place, "result without geometry.location"))?;
            (loc.lat, loc.lng)
        }
        GeocodeResponse::Features { features } => {
            let first = features.into_iter().next().ok_or_else(|| not_found(place, "no features"))?;
            let coords = first
                .geometry
                .map(|g| g.coordinates)
                .ok_or_else(|| not_found(place, "feature without geometry"))?;
            match coords.as_slice() {
                [lon, lat, ..] => (Some(*lat), Some(*lon)),
                _ => return Err(not_found(place, "feature without coordinates")),
            }
        }
    };

    GeoLocation::from_parts(lat, lng).map_err(|e| not_found(place, e))
}

// ─── GISCO ──────────────────────────────────────────────────────

/// Geocoding through the GISCO `api` endpoint.
#[derive(Debug, Clone)]
pub struct GiscoGeocoder {
    domain: String,
    protocol: Protocol,
}

impl GiscoGeocoder {
    pub fn new(domain: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            domain: domain.into(),
            protocol,
        }
    }

    /// `{domain}/api?q=<place>`
    pub fn url(&self, place: &Place) -> Result<String> {
        UrlBuilder::new(self.domain.as_str())
            .protocol(self.protocol.as_str())
            .query("api")
            .filter("q", place.to_url())
            .build()
    }
}

impl Default for GiscoGeocoder {
    fn default() -> Self {
        Self::new(GISCO_DOMAIN, Protocol::Http)
    }
}

impl Geocoder for GiscoGeocoder {
    fn name(&self) -> &'static str {
        "GISCO"
    }

    fn geocode(&self, transport: &dyn Transport, place: &Place) -> Result<GeoLocation> {
        let body = transport.get(&self.url(place)?)?;
        parse_geocode(place, &body)
    }
}

// ─── Nominatim provider ─────────────────────────────────────────

#[derive(Deserialize, Debug, Clone)]
struct NominatimResult {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// Geocoding through OpenStreetMap Nominatim.
#[derive(Debug, Clone, Default)]
pub struct NominatimGeocoder;

impl NominatimGeocoder {
    pub fn url(&self, place: &Place) -> Result<String> {
        UrlBuilder::new(NOMINATIM_DOMAIN)
            .protocol("https")
            .query("search")
            .filter("q", place.to_url())
            .filter("format", "json")
            .filter("limit", 1)
            .build()
    }
}

impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &'static str {
        "Nominatim"
    }

    fn geocode(&self, transport: &dyn Transport, place: &Place) -> Result<GeoLocation> {
        let body = transport.get(&self.url(place)?)?;
        let results: Vec<NominatimResult> =
            serde_json::from_str(&body).map_err(|e| not_found(place, format!("malformed response ({})", e)))?;
        let top = results.into_iter().next().ok_or_else(|| not_found(place, "no results"))?;
        if let Some(ref name) = top.display_name {
            debug!(place = %place, display_name = %name, "Nominatim match");
        }
        GeoLocation::from_parts(top.lat.parse().ok(), top.lon.parse().ok()).map_err(|e| not_found(place, e))
    }
}

// ─── Google Maps geocoding ──────────────────────────────────────

/// Google Maps Geocoding API client (the offline-mode geocoder).
#[derive(Clone)]
pub struct GoogleGeocoder {
    key: String,
}

impl std::fmt::Debug for GoogleGeocoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleGeocoder").field("key", &"<redacted>").finish()
    }
}

impl GoogleGeocoder {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(Error::Configuration("Google geocoding requires an API key".into()));
        }
        Ok(Self { key })
    }

    fn builder(&self) -> UrlBuilder {
        UrlBuilder::new(GOOGLE_DOMAIN)
            .protocol("https")
            .path("maps/api/geocode")
            .query("json")
    }

    pub fn url(&self, place: &Place) -> Result<String> {
        self.builder()
            .filter("address", place.to_url())
            .filter("key", self.key.as_str())
            .build()
    }

    pub fn reverse_url(&self, location: &GeoLocation) -> Result<String> {
        self.builder()
            .filter("latlng", format!("{},{}", location.lat, location.lon))
            .filter("key", self.key.as_str())
            .build()
    }
}

impl Geocoder for GoogleGeocoder {
    fn name(&self) -> &'static str {
        "Google"
    }

    fn geocode(&self, transport: &dyn Transport, place: &Place) -> Result<GeoLocation> {
        let body = transport.get(&self.url(place)?)?;
        parse_geocode(place, &body)
    }

    /// Address components (`long_name`) of the best match, most specific first,
    /// e.g. street number, street, district, city, region, country, postcode.
    fn reverse(&self, transport: &dyn Transport, location: &GeoLocation) -> Result<Vec<String>> {
        let body = transport.get(&self.reverse_url(location)?)?;
        let response: GeocodeResponse = serde_json::from_str(&body)
            .map_err(|e| Error::PlaceNotFound(format!("{}: malformed response ({})", location, e)))?;
        let first = match response {
            GeocodeResponse::Results { results, .. } | GeocodeResponse::List(results) => results.into_iter().next(),
            GeocodeResponse::Features { .. } => None,
        };
        let components: Vec<String> = first
            .map(|r| r.address_components.into_iter().map(|c| c.long_name).collect())
            .unwrap_or_default();
        if components.is_empty() {
            return Err(Error::PlaceNotFound(format!("no address known at {}", location)));
        }
        Ok(components)
    }
}

// ─── GISCO NUTS lookup ──────────────────────────────────────────

/// Online NUTS identification through GISCO `nuts/find-nuts.py`.
#[derive(Debug, Clone)]
pub struct GiscoNuts {
    domain: String,
    protocol: Protocol,
}

impl GiscoNuts {
    pub fn new(domain: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            domain: domain.into(),
            protocol,
        }
    }

    /// `{domain}/nuts/find-nuts.py?x=<lon>&y=<lat>&f=JSON&year=<year>&proj=3035&geometry=Y`
    pub fn url(&self, location: &GeoLocation, year: u16) -> Result<String> {
        UrlBuilder::new(self.domain.as_str())
            .protocol(self.protocol.as_str())
            .path("nuts")
            .query("find-nuts.py")
            .filter("x", location.lon)
            .filter("y", location.lat)
            .filter("f", "JSON")
            .filter("year", year)
            .filter("proj", NUTS_PROJECTION)
            .filter("geometry", "Y")
            .build()
    }

    /// Every region GISCO reports for the location, in response order
    /// (usually levels 0 to 3), restricted to `query.level` when set.
    ///
    /// An empty or unparseable answer is [`Error::NutsNotFound`].
    pub fn lookup_all(
        &self,
        transport: &dyn Transport,
        location: &GeoLocation,
        query: &NutsQuery,
    ) -> Result<Vec<NutsRegion>> {
        let not_found = || Error::NutsNotFound {
            lat: location.lat,
            lon: location.lon,
        };
        let body = transport.get(&self.url(location, query.year)?)?;
        let regions = parse_nuts(&body).ok_or_else(not_found)?;
        debug!(count = regions.len(), "GISCO NUTS candidates");

        let regions: Vec<NutsRegion> = regions
            .into_iter()
            .filter(|r| query.level.is_none() || r.level == query.level)
            .collect();
        if regions.is_empty() {
            return Err(not_found());
        }
        Ok(regions)
    }

    /// First region of [`lookup_all`](Self::lookup_all). Without a level
    /// filter this is whatever GISCO lists first, normally the level-0 country.
    pub fn lookup(&self, transport: &dyn Transport, location: &GeoLocation, query: &NutsQuery) -> Result<NutsRegion> {
        let mut regions = self.lookup_all(transport, location, query)?;
        Ok(regions.swap_remove(0))
    }
}

impl Default for GiscoNuts {
    fn default() -> Self {
        Self::new(GISCO_DOMAIN, Protocol::Http)
    }
}

/// Parse a `find-nuts.py` body into regions, in response order.
/// `None` when the body is not JSON or carries no `results` array.
fn parse_nuts(body: &str) -> Option<Vec<NutsRegion>> {
    let value: Value = serde_json::from_str(body).ok()?;
    let results = match &value {
        Value::Array(items) => items,
        Value::Object(map) => map.get("results")?.as_array()?,
        _ => return None,
    };

    Some(
        results
            .iter()
            .filter_map(|r| {
                let attrs = r.get("attributes").unwrap_or(r);
                let id = attrs.get("NUTS_ID")?.as_str()?;
                let name = attrs
                    .get("NUTS_NAME")
                    .or_else(|| attrs.get("NAME_LATN"))
                    .and_then(Value::as_str)
                    .unwrap_or(id);
                let level = attrs
                    .get("LEVL_CODE")
                    .or_else(|| attrs.get("STAT_LEVL_"))
                    .and_then(level_from_value);
                Some(NutsRegion::new(id, name).with_level(level))
            })
            .collect(),
    )
}

/// NUTS levels arrive as numbers or numeric strings depending on the source.
pub(crate) fn level_from_value(v: &Value) -> Option<u8> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
