//! NUTS boundary layer loaded from a local vector dataset.
//!
//! Features keep their file order; lookups return the first containing
//! feature in that order. An R-tree over feature envelopes narrows the
//! candidates before the exact containment test.

use std::path::Path;

use geo::{BoundingRect, Contains, MultiPolygon};
use rstar::{RTree, RTreeObject, AABB};
use tracing::info;

use super::types::{Error, GeoLocation, NutsRegion, Result};

/// One polygon feature of the boundary dataset.
#[derive(Debug, Clone)]
pub struct BoundaryFeature {
    pub region: NutsRegion,
    pub geometry: MultiPolygon<f64>,
}

struct IndexedFeature {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// A read-only boundary layer.
pub struct BoundaryLayer {
    features: Vec<BoundaryFeature>,
    tree: RTree<IndexedFeature>,
}

impl BoundaryLayer {
    pub fn from_features(features: Vec<BoundaryFeature>) -> Self {
        let indexed: Vec<IndexedFeature> = features
            .iter()
            .enumerate()
            .filter_map(|(index, f)| {
                let rect = f.geometry.bounding_rect()?;
                Some(IndexedFeature {
                    index,
                    envelope: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();

        Self {
            features,
            tree: RTree::bulk_load(indexed),
        }
    }

    /// Open a dataset, dispatching on the file extension:
    /// `.shp` (ESRI shapefile with its `.dbf`) or `.geojson`/`.json`.
    pub fn open(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let features = match ext.as_str() {
            "shp" => readers::read_shapefile(path)?,
            "geojson" | "json" => readers::read_geojson(path)?,
            other => {
                return Err(Error::Configuration(format!(
                    "unsupported boundary dataset format '{}' ({})",
                    other,
                    path.display()
                )))
            }
        };

        info!(path = %path.display(), features = features.len(), "Opened boundary dataset");
        Ok(Self::from_features(features))
    }

    /// First feature in file order whose polygon contains the location,
    /// optionally restricted to one NUTS level.
    pub fn find(&self, location: &GeoLocation, level: Option<u8>) -> Option<&NutsRegion> {
        self.candidates(location)
            .into_iter()
            .filter(|&i| level.is_none() || self.features[i].region.level == level)
            .min()
            .map(|i| &self.features[i].region)
    }

    /// All features containing the location, in file order.
    pub fn containing(&self, location: &GeoLocation) -> Vec<&BoundaryFeature> {
        let mut hits = self.candidates(location);
        hits.sort_unstable();
        hits.into_iter().map(|i| &self.features[i]).collect()
    }

    /// Indices of features containing the location, in tree order.
    fn candidates(&self, location: &GeoLocation) -> Vec<usize> {
        let point = location.to_point();
        let envelope = AABB::from_point([point.x(), point.y()]);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|f| f.index)
            .filter(|&i| self.features[i].geometry.contains(&point))
            .collect()
    }

    pub fn features(&self) -> &[BoundaryFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Keep polygonal geometries only.
#[cfg(feature = "boundary")]
fn to_multipolygon(geometry: geo::Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        geo::Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        _ => None,
    }
}

#[cfg(feature = "boundary")]
fn skipped(index: usize, why: &str) {
    tracing::debug!(feature = index, "Skipping boundary feature: {}", why);
}

#[cfg(feature = "boundary")]
mod readers {
    use super::{skipped, to_multipolygon, BoundaryFeature};
    use crate::location::providers::level_from_value;
    use crate::location::types::{Error, NutsRegion, Result};
    use serde_json::Value;
    use shapefile::dbase::{FieldValue, Record};
    use std::fs;
    use std::path::Path;

    fn io_error(path: &Path, e: impl std::fmt::Display) -> Error {
        Error::Transport(format!("reading {}: {}", path.display(), e))
    }

    fn record_text(record: &Record, field: &str) -> Option<String> {
        match record.get(field)? {
            FieldValue::Character(Some(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            FieldValue::Numeric(Some(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// `LEVL_CODE` (or the older `STAT_LEVL_`), numeric or text. Values that
    /// are not whole numbers in `0..=255` are treated as missing.
    fn record_level(record: &Record) -> Option<u8> {
        ["LEVL_CODE", "STAT_LEVL_"].iter().find_map(|field| match record.get(field)? {
            FieldValue::Numeric(Some(n)) => level_from_number(*n),
            FieldValue::Character(Some(s)) => s.trim().parse::<f64>().ok().and_then(level_from_number),
            _ => None,
        })
    }

    pub(super) fn level_from_number(n: f64) -> Option<u8> {
        if n.fract() != 0.0 || !(0.0..=255.0).contains(&n) {
            return None;
        }
        Some(n as u8)
    }

    pub(super) fn read_shapefile(path: &Path) -> Result<Vec<BoundaryFeature>> {
        let mut reader = shapefile::Reader::from_path(path).map_err(|e| io_error(path, e))?;
        let mut features = Vec::new();

        for (i, item) in reader.iter_shapes_and_records().enumerate() {
            let (shape, record) = item.map_err(|e| io_error(path, e))?;

            let Some(geometry) = geo_types::Geometry::<f64>::try_from(shape).ok().and_then(to_multipolygon) else {
                skipped(i, "not a polygon");
                continue;
            };
            let Some(id) = record_text(&record, "NUTS_ID") else {
                skipped(i, "no NUTS_ID");
                continue;
            };
            let name = record_text(&record, "NUTS_NAME").unwrap_or_else(|| id.clone());
            let level = record_level(&record);

            features.push(BoundaryFeature {
                region: NutsRegion::new(id, name).with_level(level),
                geometry,
            });
        }

        Ok(features)
    }

    pub(super) fn read_geojson(path: &Path) -> Result<Vec<BoundaryFeature>> {
        let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        let geojson: geojson::GeoJson = text.parse().map_err(|e| io_error(path, e))?;

        let items = match geojson {
            geojson::GeoJson::FeatureCollection(fc) => fc.features,
            geojson::GeoJson::Feature(f) => vec![f],
            geojson::GeoJson::Geometry(_) => {
                return Err(io_error(path, "expected a Feature or FeatureCollection"));
            }
        };

        let mut features = Vec::new();
        for (i, feature) in items.into_iter().enumerate() {
            let Some(geometry) = feature
                .geometry
                .and_then(|g| geo_types::Geometry::<f64>::try_from(g.value).ok())
                .and_then(to_multipolygon)
            else {
                skipped(i, "no polygon geometry");
                continue;
            };
            let props = feature.properties.unwrap_or_default();
            let Some(id) = props.get("NUTS_ID").and_then(Value::as_str).map(str::to_string) else {
                skipped(i, "no NUTS_ID");
                continue;
            };
            let name = props
                .get("NUTS_NAME")
                .or_else(|| props.get("NAME_LATN"))
                .and_then(Value::as_str)
                .map_or_else(|| id.clone(), str::to_string);
            let level = props.get("LEVL_CODE").and_then(level_from_value);

            features.push(BoundaryFeature {
                region: NutsRegion::new(id, name).with_level(level),
                geometry,
            });
        }

        Ok(features)
    }
}

#[cfg(not(feature = "boundary"))]
mod readers {
    use super::BoundaryFeature;
    use crate::location::types::{Error, Result};
    use std::path::Path;

    fn unavailable(path: &Path) -> Error {
        Error::Configuration(format!(
            "boundary file support not compiled in; cannot read {}",
            path.display()
        ))
    }

    pub(super) fn read_shapefile(path: &Path) -> Result<Vec<BoundaryFeature>> {
        Err(unavailable(path))
    }

    pub(super) fn read_geojson(path: &Path) -> Result<Vec<BoundaryFeature>> {
        Err(unavailable(path))
    }
}
