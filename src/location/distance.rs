//! Distances between resolved locations.

use std::fmt;
use std::str::FromStr;

use geo::{Distance, Geodesic, Haversine};

use super::types::{Error, GeoLocation, Result};

/// How the distance is measured on the Earth's surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMethod {
    /// Haversine formula on a sphere of mean Earth radius.
    #[default]
    GreatCircle,
    /// Geodesic on the WGS84 ellipsoid (Karney).
    Geodesic,
}

impl FromStr for DistanceMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "great_circle" | "great-circle" | "haversine" => Ok(Self::GreatCircle),
            "geodesic" | "vincenty" => Ok(Self::Geodesic),
            other => Err(Error::InvalidInput(format!("unknown distance method '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceUnit {
    #[default]
    Kilometers,
    Miles,
    Meters,
    Feet,
}

impl DistanceUnit {
    fn per_meter(self) -> f64 {
        match self {
            Self::Kilometers => 1e-3,
            Self::Miles => 1.0 / 1609.344,
            Self::Meters => 1.0,
            Self::Feet => 1.0 / 0.3048,
        }
    }
}

impl FromStr for DistanceUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "km" => Ok(Self::Kilometers),
            "mi" => Ok(Self::Miles),
            "m" => Ok(Self::Meters),
            "ft" => Ok(Self::Feet),
            other => Err(Error::InvalidInput(format!("unknown distance unit '{}'", other))),
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Kilometers => "km",
            Self::Miles => "mi",
            Self::Meters => "m",
            Self::Feet => "ft",
        })
    }
}

pub fn distance(a: &GeoLocation, b: &GeoLocation, method: DistanceMethod, unit: DistanceUnit) -> f64 {
    let (pa, pb) = (a.to_point(), b.to_point());
    let meters = match method {
        DistanceMethod::GreatCircle => Haversine.distance(pa, pb),
        DistanceMethod::Geodesic => Geodesic.distance(pa, pb),
    };
    meters * unit.per_meter()
}

/// Symmetric matrix of pairwise distances, zero on the diagonal.
pub fn distance_matrix(locations: &[GeoLocation], method: DistanceMethod, unit: DistanceUnit) -> Vec<Vec<f64>> {
    let n = locations.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = distance(&locations[i], &locations[j], method, unit);
            matrix[i][j] = d;
            matrix[j][i] = d;
        }
    }
    matrix
}
