//! Place resolution: geocoding, NUTS lookup and the local boundary layer.
//!
//! The online path talks to Eurostat GISCO (or Nominatim); the offline path
//! geocodes through Google and tests containment against a NUTS dataset
//! on disk.

pub mod boundary;
pub mod distance;
pub mod providers;
pub mod resolver;
pub mod transport;
pub mod types;

pub use boundary::{BoundaryFeature, BoundaryLayer};
pub use distance::{distance, distance_matrix, DistanceMethod, DistanceUnit};
pub use providers::{Geocoder, GiscoGeocoder, GiscoNuts, GoogleGeocoder, NominatimGeocoder};
pub use resolver::PlaceResolver;
#[cfg(any(feature = "online", feature = "google"))]
pub use transport::HttpTransport;
pub use transport::Transport;
pub use types::{
    Error, GeoLocation, NutsQuery, NutsRegion, Place, PlaceQuery, Resolution, Result, DEFAULT_NUTS_YEAR,
};
