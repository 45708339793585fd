//! Place resolver: place → location → NUTS.
//!
//! Online flow:   GISCO/Nominatim geocoding → GISCO `find-nuts.py`
//! Offline flow:  Google geocoding → scan of the local boundary layer
//!
//! Each call is independent: nothing is cached and failures are returned
//! to the caller without retrying.

use tracing::{debug, info};

use super::boundary::BoundaryLayer;
use super::providers::{Geocoder, GiscoGeocoder, GiscoNuts, GoogleGeocoder, NominatimGeocoder};
use super::transport::Transport;
use super::types::{Error, GeoLocation, NutsQuery, NutsRegion, PlaceQuery, Resolution, Result};
use crate::capabilities::Capabilities;
use crate::config::{OnlineProvider, ResolverConfig, ServiceMode};

enum Backend {
    Online {
        geocoder: Box<dyn Geocoder>,
        nuts: GiscoNuts,
    },
    Offline {
        geocoder: GoogleGeocoder,
        layer: BoundaryLayer,
    },
}

/// Resolves places and coordinates to locations and NUTS regions.
///
/// All calls block on network or file I/O. A resolver has at most one
/// request in flight; run separate resolvers for parallel work.
pub struct PlaceResolver {
    config: ResolverConfig,
    transport: Box<dyn Transport>,
    backend: Backend,
}

impl PlaceResolver {
    /// Create a resolver over the default HTTP transport.
    #[cfg(any(feature = "online", feature = "google"))]
    pub fn new(config: ResolverConfig, capabilities: Capabilities) -> Result<Self> {
        let transport = super::transport::HttpTransport::new(config.timeout);
        Self::with_transport(config, capabilities, Box::new(transport))
    }

    /// Without an HTTP client only [`with_transport`](Self::with_transport) works.
    #[cfg(not(any(feature = "online", feature = "google")))]
    pub fn new(_config: ResolverConfig, _capabilities: Capabilities) -> Result<Self> {
        Err(Error::Configuration("built without an HTTP transport".into()))
    }

    /// Create a resolver over a caller-supplied transport.
    pub fn with_transport(
        config: ResolverConfig,
        capabilities: Capabilities,
        transport: Box<dyn Transport>,
    ) -> Result<Self> {
        let backend = match config.mode {
            ServiceMode::Online => {
                if !capabilities.online_available() {
                    return Err(Error::Configuration(
                        "online mode requested but online geocoding is unavailable".into(),
                    ));
                }
                let geocoder: Box<dyn Geocoder> = match config.provider {
                    OnlineProvider::Gisco => Box::new(GiscoGeocoder::new(config.domain.as_str(), config.protocol)),
                    OnlineProvider::Nominatim => Box::new(NominatimGeocoder),
                };
                Backend::Online {
                    geocoder,
                    nuts: GiscoNuts::new(config.domain.as_str(), config.protocol),
                }
            }
            ServiceMode::Offline => {
                if !capabilities.offline_geocoding {
                    return Err(Error::Configuration(
                        "offline mode requested but the geocoding client is unavailable".into(),
                    ));
                }
                if !capabilities.boundary_files {
                    return Err(Error::Configuration(
                        "offline mode requested but boundary file reading is unavailable".into(),
                    ));
                }
                let key = config
                    .api_key
                    .as_deref()
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| Error::Configuration("offline mode requires a geocoding API key".into()))?;
                let path = config
                    .boundary_path
                    .as_deref()
                    .ok_or_else(|| Error::Configuration("offline mode requires a boundary dataset path".into()))?;
                Backend::Offline {
                    geocoder: GoogleGeocoder::new(key)?,
                    layer: BoundaryLayer::open(path)?,
                }
            }
        };

        info!(mode = %config.mode, "Place resolver ready");
        Ok(Self {
            config,
            transport,
            backend,
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn mode(&self) -> ServiceMode {
        self.config.mode
    }

    /// Resolve a place name or explicit coordinates to a location.
    pub fn resolve_location(&self, query: &PlaceQuery) -> Result<GeoLocation> {
        match query {
            PlaceQuery::Coordinates { lat, lon } => GeoLocation::from_parts(*lat, *lon),
            PlaceQuery::Place(place) => {
                let geocoder: &dyn Geocoder = match &self.backend {
                    Backend::Online { geocoder, .. } => geocoder.as_ref(),
                    Backend::Offline { geocoder, .. } => geocoder,
                };
                let location = geocoder.geocode(self.transport.as_ref(), place)?;
                debug!(place = %place, provider = geocoder.name(), %location, "Geocoded");
                Ok(location)
            }
        }
    }

    /// Resolve the NUTS region of a location for the given nomenclature year.
    pub fn resolve_nuts(&self, location: &GeoLocation, year: u16) -> Result<Option<NutsRegion>> {
        self.resolve_nuts_with(location, &NutsQuery::new(year))
    }

    /// Online: a missing region is [`Error::NutsNotFound`].
    /// Offline: a point outside every boundary yields `Ok(None)`.
    pub fn resolve_nuts_with(&self, location: &GeoLocation, query: &NutsQuery) -> Result<Option<NutsRegion>> {
        let region = match &self.backend {
            Backend::Online { nuts, .. } => Some(nuts.lookup(self.transport.as_ref(), location, query)?),
            Backend::Offline { layer, .. } => {
                if query.year != self.config.year {
                    debug!(year = query.year, "Offline lookup ignores the year; the dataset fixes it");
                }
                layer.find(location, query.level).cloned()
            }
        };

        match region {
            Some(ref r) => debug!(%location, nuts = %r.id, "NUTS region found"),
            None => debug!(%location, "No NUTS region contains the location"),
        }
        Ok(region)
    }

    /// Every NUTS region containing the location, coarsest level first when
    /// the source lists them that way, restricted to `query.level` when set.
    ///
    /// Online this is the full `find-nuts.py` answer and an empty answer is
    /// [`Error::NutsNotFound`]. Offline it is every containing feature in file
    /// order, possibly none.
    pub fn resolve_nuts_all(&self, location: &GeoLocation, query: &NutsQuery) -> Result<Vec<NutsRegion>> {
        let regions = match &self.backend {
            Backend::Online { nuts, .. } => nuts.lookup_all(self.transport.as_ref(), location, query)?,
            Backend::Offline { layer, .. } => layer
                .containing(location)
                .into_iter()
                .map(|f| &f.region)
                .filter(|r| query.level.is_none() || r.level == query.level)
                .cloned()
                .collect(),
        };
        debug!(%location, count = regions.len(), "NUTS regions found");
        Ok(regions)
    }

    /// Both steps with the configured year.
    pub fn resolve(&self, query: &PlaceQuery) -> Result<Resolution> {
        self.resolve_with(query, &NutsQuery::new(self.config.year))
    }

    pub fn resolve_with(&self, query: &PlaceQuery, nuts_query: &NutsQuery) -> Result<Resolution> {
        let location = self.resolve_location(query)?;
        let nuts = self.resolve_nuts_with(&location, nuts_query)?;
        Ok(Resolution { location, nuts })
    }

    /// Addresses known at a location, most specific first.
    pub fn reverse(&self, location: &GeoLocation) -> Result<Vec<String>> {
        match &self.backend {
            Backend::Online { geocoder, .. } => geocoder.reverse(self.transport.as_ref(), location),
            Backend::Offline { geocoder, .. } => geocoder.reverse(self.transport.as_ref(), location),
        }
    }

    /// The loaded boundary layer, in offline mode.
    pub fn boundary_layer(&self) -> Option<&BoundaryLayer> {
        match &self.backend {
            Backend::Offline { layer, .. } => Some(layer),
            Backend::Online { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::boundary::tests::write_fixture;
    use crate::location::transport::stub::StubTransport;
    use std::sync::Arc;
    use tempfile::TempDir;

    const BREMEN_GEOCODE: &str = r#"{"results":[{"geometry":{"location":{"lat":53.08,"lng":8.80}}}]}"#;

    fn online(bodies: &[&str]) -> (PlaceResolver, Arc<StubTransport>) {
        let transport = Arc::new(StubTransport::with_bodies(bodies));
        let resolver = PlaceResolver::with_transport(
            ResolverConfig::online(),
            Capabilities::all(),
            Box::new(Arc::clone(&transport)),
        )
        .unwrap();
        (resolver, transport)
    }

    fn offline(bodies: &[&str]) -> (PlaceResolver, Arc<StubTransport>, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir);
        let transport = Arc::new(StubTransport::with_bodies(bodies));
        let resolver = PlaceResolver::with_transport(
            ResolverConfig::offline("KEY", path),
            Capabilities::all(),
            Box::new(Arc::clone(&transport)),
        )
        .unwrap();
        (resolver, transport, dir)
    }

    fn stub() -> Box<dyn Transport> {
        Box::new(StubTransport::default())
    }

    #[test]
    fn test_resolve_location_online() {
        let (resolver, transport) = online(&[BREMEN_GEOCODE]);
        let loc = resolver.resolve_location(&PlaceQuery::place("Bremen, Germany").unwrap()).unwrap();
        assert_eq!(loc, GeoLocation { lat: 53.08, lon: 8.80 });
        assert_eq!(
            transport.requested(),
            vec!["http://europa.eu/webtools/rest/gisco/api?q=Bremen+Germany".to_string()]
        );
    }

    #[test]
    fn test_resolve_location_empty_results() {
        let (resolver, _) = online(&[r#"{"results":[]}"#]);
        let err = resolver.resolve_location(&PlaceQuery::place("Atlantis").unwrap()).unwrap_err();
        assert!(matches!(err, Error::PlaceNotFound(_)));
    }

    #[test]
    fn test_coordinates_pass_through_without_io() {
        let (resolver, transport) = online(&[]);
        let loc = resolver.resolve_location(&PlaceQuery::coordinates(43.77, 11.25)).unwrap();
        assert_eq!(loc, GeoLocation { lat: 43.77, lon: 11.25 });
        assert!(transport.requested().is_empty());
    }

    #[test]
    fn test_missing_coordinate_is_invalid_input() {
        let (resolver, _) = online(&[]);
        let query = PlaceQuery::Coordinates { lat: Some(43.77), lon: None };
        assert!(matches!(resolver.resolve_location(&query), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_resolve_nuts_online() {
        let (resolver, transport) =
            online(&[r#"{"results":[{"attributes":{"NUTS_ID":"DE50","NUTS_NAME":"Bremen","LEVL_CODE":2}}]}"#]);
        let loc = GeoLocation::new(53.08, 8.80).unwrap();
        let region = resolver.resolve_nuts(&loc, 2016).unwrap().unwrap();
        assert_eq!(region.id, "DE50");
        assert!(transport.requested()[0].contains("year=2016"));
    }

    #[test]
    fn test_resolve_nuts_all_online() {
        let body = r#"{"results":[
            {"attributes":{"NUTS_ID":"DE","NUTS_NAME":"Deutschland","LEVL_CODE":0}},
            {"attributes":{"NUTS_ID":"DE5","NUTS_NAME":"Bremen","LEVL_CODE":1}},
            {"attributes":{"NUTS_ID":"DE50","NUTS_NAME":"Bremen","LEVL_CODE":2}},
            {"attributes":{"NUTS_ID":"DE501","NUTS_NAME":"Bremen, Kreisfreie Stadt","LEVL_CODE":3}}
        ]}"#;
        let (resolver, _) = online(&[body, body]);
        let loc = GeoLocation::new(53.08, 8.80).unwrap();

        let all = resolver.resolve_nuts_all(&loc, &NutsQuery::default()).unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["DE", "DE5", "DE50", "DE501"]);

        let l2 = resolver.resolve_nuts_all(&loc, &NutsQuery::default().at_level(2)).unwrap();
        assert_eq!(l2, vec![NutsRegion::new("DE50", "Bremen").with_level(Some(2))]);
    }

    #[test]
    fn test_resolve_nuts_all_offline() {
        let (resolver, transport, _dir) = offline(&[]);
        let bremen = GeoLocation::new(53.08, 8.80).unwrap();

        let all = resolver.resolve_nuts_all(&bremen, &NutsQuery::default()).unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["DE50", "DE"]);

        let l0 = resolver.resolve_nuts_all(&bremen, &NutsQuery::default().at_level(0)).unwrap();
        assert_eq!(l0.len(), 1);
        assert_eq!(l0[0].id, "DE");

        let atlantic = GeoLocation::new(30.0, -40.0).unwrap();
        assert!(resolver.resolve_nuts_all(&atlantic, &NutsQuery::default()).unwrap().is_empty());
        assert!(transport.requested().is_empty());
    }

    #[test]
    fn test_resolve_nuts_online_not_found() {
        let (resolver, _) = online(&[r#"{"results":[]}"#]);
        let loc = GeoLocation::new(30.0, -40.0).unwrap();
        assert!(matches!(resolver.resolve_nuts(&loc, 2013), Err(Error::NutsNotFound { .. })));
    }

    #[test]
    fn test_transport_failure_surfaces() {
        let transport = StubTransport::failing("timed out");
        let resolver =
            PlaceResolver::with_transport(ResolverConfig::online(), Capabilities::all(), Box::new(transport)).unwrap();
        let err = resolver.resolve(&PlaceQuery::place("Bremen").unwrap()).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_resolve_nuts_offline_bremen() {
        let (resolver, transport, _dir) = offline(&[]);
        let region = resolver.resolve_nuts(&GeoLocation::new(53.08, 8.80).unwrap(), 2013).unwrap().unwrap();
        assert_eq!(region.id, "DE50");
        assert_eq!(region.name, "Bremen");
        assert!(transport.requested().is_empty());
    }

    #[test]
    fn test_resolve_nuts_offline_outside_is_none() {
        let (resolver, _, _dir) = offline(&[]);
        let atlantic = GeoLocation::new(30.0, -40.0).unwrap();
        assert_eq!(resolver.resolve_nuts(&atlantic, 2013).unwrap(), None);
    }

    #[test]
    fn test_resolve_offline_full_chain() {
        let (resolver, transport, _dir) = offline(&[BREMEN_GEOCODE]);
        let resolution = resolver.resolve(&PlaceQuery::place("Bremen, Germany").unwrap()).unwrap();
        assert_eq!(resolution.location, GeoLocation { lat: 53.08, lon: 8.80 });
        assert_eq!(resolution.nuts.unwrap().id, "DE50");
        assert_eq!(
            transport.requested(),
            vec!["https://maps.googleapis.com/maps/api/geocode/json?address=Bremen+Germany&key=KEY".to_string()]
        );
    }

    #[test]
    fn test_resolve_with_level_offline() {
        let (resolver, _, _dir) = offline(&[]);
        let query = PlaceQuery::coordinates(53.08, 8.80);
        let resolution = resolver.resolve_with(&query, &NutsQuery::default().at_level(0)).unwrap();
        assert_eq!(resolution.nuts.unwrap().id, "DE");
    }

    #[test]
    fn test_offline_without_dataset_path() {
        let config = ResolverConfig {
            boundary_path: None,
            ..ResolverConfig::offline("KEY", "unused.geojson")
        };
        let err = PlaceResolver::with_transport(config, Capabilities::all(), stub()).err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_offline_without_key() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir);
        for key in [None, Some(String::new())] {
            let config = ResolverConfig {
                api_key: key,
                ..ResolverConfig::offline("KEY", path.clone())
            };
            let err = PlaceResolver::with_transport(config, Capabilities::all(), stub()).err().unwrap();
            assert!(matches!(err, Error::Configuration(_)));
        }
    }

    #[test]
    fn test_missing_capability_fails_fast() {
        let no_online = Capabilities {
            online_geocoding: false,
            ..Capabilities::all()
        };
        let err = PlaceResolver::with_transport(ResolverConfig::online(), no_online, stub()).err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));

        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir);
        let no_files = Capabilities {
            boundary_files: false,
            ..Capabilities::all()
        };
        let err = PlaceResolver::with_transport(ResolverConfig::offline("KEY", path), no_files, stub()).err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_unreadable_dataset_is_transport_error() {
        let dir = TempDir::new().unwrap();
        let config = ResolverConfig::offline("KEY", dir.path().join("absent.shp"));
        let err = PlaceResolver::with_transport(config, Capabilities::all(), stub()).err().unwrap();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_nominatim_provider() {
        let transport = Arc::new(StubTransport::with_bodies(&[r#"[{"lat":"43.7696","lon":"11.2558"}]"#]));
        let config = ResolverConfig {
            provider: OnlineProvider::Nominatim,
            ..ResolverConfig::online()
        };
        let resolver =
            PlaceResolver::with_transport(config, Capabilities::all(), Box::new(Arc::clone(&transport))).unwrap();
        let loc = resolver.resolve_location(&PlaceQuery::place("Florence, Italy").unwrap()).unwrap();
        assert!((loc.lon - 11.2558).abs() < 1e-9);
        assert!(transport.requested()[0].starts_with("https://nominatim.openstreetmap.org/search?q=Florence+Italy"));
    }

    #[test]
    fn test_reverse_online_unsupported() {
        let (resolver, _) = online(&[]);
        let err = resolver.reverse(&GeoLocation::new(48.85, 2.34).unwrap()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_custom_domain_and_protocol() {
        let transport = Arc::new(StubTransport::with_bodies(&[BREMEN_GEOCODE]));
        let config = ResolverConfig {
            domain: "gisco.example.org/".into(),
            protocol: crate::url::Protocol::Https,
            ..ResolverConfig::online()
        };
        let resolver =
            PlaceResolver::with_transport(config, Capabilities::all(), Box::new(Arc::clone(&transport))).unwrap();
        resolver.resolve_location(&PlaceQuery::place("Bremen").unwrap()).unwrap();
        assert_eq!(transport.requested()[0], "https://gisco.example.org/api?q=Bremen");
    }
}
