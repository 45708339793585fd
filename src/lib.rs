//! place2nuts: resolve place names and coordinates to Eurostat NUTS regions.
//!
//! ```no_run
//! use place2nuts::{Capabilities, PlaceQuery, PlaceResolver, ResolverConfig};
//!
//! let resolver = PlaceResolver::new(ResolverConfig::online(), Capabilities::probe())?;
//! let resolution = resolver.resolve(&PlaceQuery::place("Bremen, Germany")?)?;
//! if let Some(region) = resolution.nuts {
//!     println!("{}", region);
//! }
//! # Ok::<(), place2nuts::Error>(())
//! ```

pub mod capabilities;
pub mod config;
pub mod location;
pub mod url;

pub use capabilities::Capabilities;
pub use config::{OnlineProvider, ResolverConfig, ServiceMode, Settings};
pub use location::{
    Error, GeoLocation, NutsQuery, NutsRegion, Place, PlaceQuery, PlaceResolver, Resolution, Result,
};
pub use url::{build_url, Protocol, UrlBuilder};
