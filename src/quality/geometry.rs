//! Decodes the raw WKB bytes a [`crate::source::FeatureRow`] carries, for
//! checks the server-derived scalar columns don't expose (per-coordinate
//! NaN/∞, which a bounding box alone can mask if only one ordinate is
//! affected and the others happen to be finite).

use geo::{CoordsIter, Geometry, Relate};
use geozero::wkb::Wkb;
use geozero::{ToGeo, ToJson};

/// Parse well-known binary into a `geo` geometry. Returns `None` on malformed
/// bytes rather than an error type of its own; callers treat a decode
/// failure as a validity finding in its own right.
pub fn decode(wkb: &[u8]) -> Option<Geometry<f64>> {
    Wkb(wkb.to_vec()).to_geo().ok()
}

/// True if any coordinate in the geometry is NaN or infinite.
pub fn has_non_finite_coordinate(geom: &Geometry<f64>) -> bool {
    geom.coords_iter().any(|c| !c.x.is_finite() || !c.y.is_finite())
}

/// Render WKB as a GeoJSON geometry object, for the diff-detail API
/// endpoint. `None` on malformed bytes.
pub fn to_geojson(wkb: &[u8]) -> Option<serde_json::Value> {
    let json = Wkb(wkb.to_vec()).to_json().ok()?;
    serde_json::from_str(&json).ok()
}

/// `ST_Equals`-style topological equality: true if the two geometries
/// occupy the same point set, independent of vertex order or the
/// specific ring/part representation either one uses.
pub fn spatially_equal(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.relate(b).is_equal_topo()
}
