//! The confidence scorer shared by the change detector (to decide whether
//! a change is worth surfacing) and the spatial quality engine (to decide
//! per-finding severity). Collapses "problematic geometry" detection into
//! one scoring function rather than two separate predicates.

use crate::config::QualityThresholds;
use crate::source::FeatureRow;

/// Outcome of scoring one geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceResult {
    pub score: f64,
    /// True if a critical condition was hit, regardless of numeric score.
    pub critical: bool,
}

impl ConfidenceResult {
    /// Whether this geometry should be treated as problematic: score at or
    /// above the flag threshold, or any critical short-circuit condition.
    pub fn is_problematic(&self, thresholds: &QualityThresholds) -> bool {
        self.critical || self.score >= thresholds.flag_threshold
    }
}

fn is_point_type(geom_type: &str) -> bool {
    geom_type.eq_ignore_ascii_case("POINT") || geom_type.eq_ignore_ascii_case("MULTIPOINT")
}

fn min_points_for_type(geom_type: &str) -> i64 {
    let t = geom_type.to_ascii_uppercase();
    if t.contains("POLYGON") {
        4
    } else if t.contains("LINESTRING") {
        2
    } else {
        1
    }
}

/// Score one feature's geometry, escalating through fixed tiers
/// (highest-priority rule wins) and then applying a multiplicative
/// complexity discount, clamped to `[0, 1]`.
pub fn confidence(row: &FeatureRow, thresholds: &QualityThresholds) -> ConfidenceResult {
    let mut score = thresholds.default_confidence;
    let mut critical = false;

    if !row.is_valid {
        score = score.max(thresholds.invalid_geometry_confidence);
        critical = true;
    }

    let degenerate = !is_point_type(&row.geom_type) && row.num_points <= 1;
    let insufficient = row.num_points < min_points_for_type(&row.geom_type);
    if degenerate {
        score = score.max(thresholds.degenerate_geometry_confidence);
        critical = true;
    } else if insufficient {
        let tier = if row.num_points < min_points_for_type(&row.geom_type) - 1 {
            thresholds.insufficient_points_confidence_high
        } else {
            thresholds.insufficient_points_confidence_low
        };
        score = score.max(tier);
        critical = true;
    }

    if !row.is_simple {
        score = score.max(thresholds.non_simple_geometry_confidence);
        critical = true;
    }

    if !row.is_topologically_clean {
        score = score.max(thresholds.topologically_unclean_confidence);
        critical = true;
    }

    let geom_type = row.geom_type.to_ascii_uppercase();
    if geom_type.contains("POLYGON") && row.geom_area <= thresholds.zero_area_threshold {
        score = score.max(thresholds.zero_area_polygon_confidence);
        critical = true;
    }
    if geom_type.contains("LINESTRING") && row.geom_length <= thresholds.zero_length_threshold {
        score = score.max(thresholds.zero_length_line_confidence);
        critical = true;
    }

    let coords_suspicious = row.min_x.abs() > thresholds.max_coordinate_magnitude
        || row.max_x.abs() > thresholds.max_coordinate_magnitude
        || row.min_y.abs() > thresholds.max_coordinate_magnitude
        || row.max_y.abs() > thresholds.max_coordinate_magnitude
        || !row.min_x.is_finite()
        || !row.max_x.is_finite()
        || !row.min_y.is_finite()
        || !row.max_y.is_finite();
    if coords_suspicious {
        score = score.max(thresholds.suspicious_coordinates_confidence);
    }

    if geom_type.contains("POLYGON") && row.geom_area > thresholds.large_area_threshold {
        score = score.max(thresholds.large_geometry_confidence_high);
    }
    if geom_type.contains("LINESTRING") && row.geom_length > thresholds.large_length_threshold {
        score = score.max(thresholds.large_geometry_confidence_low);
    }

    let points = row.num_points.max(0) as usize;
    if points > thresholds.very_complex_geometry_point_threshold {
        score *= thresholds.very_complex_geometry_confidence_reduction;
    } else if points > thresholds.complex_geometry_point_threshold {
        score *= thresholds.complex_geometry_confidence_reduction;
    }

    ConfidenceResult { score: score.clamp(0.0, 1.0), critical }
}

/// Shared fixtures reused by the category-tester test modules.
#[cfg(test)]
pub(crate) mod tests_support {
    use super::FeatureRow;

    pub(crate) fn base_row() -> FeatureRow {
        FeatureRow {
            source_row_id: None,
            attributes: Default::default(),
            geometry_wkb: vec![],
            is_valid: true,
            validity_reason: None,
            is_simple: true,
            geom_area: 100.0,
            geom_length: 10.0,
            num_points: 5,
            geom_type: "POLYGON".to_string(),
            is_ccw_oriented: Some(false),
            is_topologically_clean: true,
            min_x: 0.0,
            max_x: 10.0,
            min_y: 0.0,
            max_y: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tests_support::base_row;

    #[test]
    fn clean_geometry_scores_below_threshold() {
        let thresholds = QualityThresholds::default();
        let result = confidence(&base_row(), &thresholds);
        assert!(!result.critical);
        assert!(!result.is_problematic(&thresholds));
    }

    #[test]
    fn invalid_geometry_is_critical() {
        let thresholds = QualityThresholds::default();
        let mut row = base_row();
        row.is_valid = false;
        let result = confidence(&row, &thresholds);
        assert!(result.critical);
        assert!(result.is_problematic(&thresholds));
        assert!(result.score >= thresholds.invalid_geometry_confidence);
    }

    #[test]
    fn zero_area_polygon_is_critical() {
        let thresholds = QualityThresholds::default();
        let mut row = base_row();
        row.geom_area = 0.0;
        let result = confidence(&row, &thresholds);
        assert!(result.critical);
    }

    #[test]
    fn large_polygon_alone_is_not_critical_but_raises_score() {
        let thresholds = QualityThresholds::default();
        let mut row = base_row();
        row.geom_area = thresholds.large_area_threshold + 1.0;
        let result = confidence(&row, &thresholds);
        assert!(!result.critical);
        assert!(result.score >= thresholds.large_geometry_confidence_high);
        assert!(!result.is_problematic(&thresholds));
    }

    #[test]
    fn very_complex_geometry_gets_larger_discount_than_complex() {
        let thresholds = QualityThresholds::default();
        let mut complex = base_row();
        complex.is_valid = false; // force a high base score to observe the discount
        complex.num_points = (thresholds.complex_geometry_point_threshold + 1) as i64;
        let mut very_complex = base_row();
        very_complex.is_valid = false;
        very_complex.num_points = (thresholds.very_complex_geometry_point_threshold + 1) as i64;

        let complex_score = confidence(&complex, &thresholds).score;
        let very_complex_score = confidence(&very_complex, &thresholds).score;
        assert!(very_complex_score < complex_score);
    }

    #[test]
    fn degenerate_non_point_geometry_is_critical() {
        let thresholds = QualityThresholds::default();
        let mut row = base_row();
        row.geom_type = "LINESTRING".to_string();
        row.num_points = 1;
        let result = confidence(&row, &thresholds);
        assert!(result.critical);
    }
}
