//! Which optional services this build can reach.

use serde::Serialize;

/// Capability flags, probed once and handed to
/// [`PlaceResolver::new`](crate::location::PlaceResolver::new).
///
/// Tests and embedders may construct any combination directly to simulate
/// a build without a given capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// HTTP geocoding and NUTS lookup against GISCO/Nominatim.
    pub online_geocoding: bool,
    /// The Google geocoding client used in offline mode.
    pub offline_geocoding: bool,
    /// Reading local boundary datasets.
    pub boundary_files: bool,
}

impl Capabilities {
    /// Flags for the features compiled into this build.
    pub fn probe() -> Self {
        let caps = Self {
            online_geocoding: cfg!(feature = "online"),
            offline_geocoding: cfg!(feature = "google"),
            boundary_files: cfg!(feature = "boundary"),
        };
        if !caps.online_geocoding {
            tracing::warn!("online geocoding not available in this build");
        }
        if !caps.offline_geocoding || !caps.boundary_files {
            tracing::warn!("offline resolution not available in this build");
        }
        caps
    }

    pub fn all() -> Self {
        Self {
            online_geocoding: true,
            offline_geocoding: true,
            boundary_files: true,
        }
    }

    pub fn online_available(&self) -> bool {
        self.online_geocoding
    }

    pub fn offline_available(&self) -> bool {
        self.offline_geocoding && self.boundary_files
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::probe()
    }
}
