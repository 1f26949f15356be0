//! Identity comparison of a dimension against a geometry's native slots.

use crate::dimension::Dimension;
use crate::geometry::Geometry;

/// Compares dimensions, by id, against the native X/Y/Z/T slots of a geometry.
///
/// Every query answers `false` (never an error) when the slot does not exist,
/// so geometries with fewer than four dimensions are handled uniformly.
pub struct DimensionMatcher<'g> {
    geometry: &'g Geometry,
}

impl<'g> DimensionMatcher<'g> {
    /// Creates a matcher over a geometry.
    #[must_use]
    pub fn new(geometry: &'g Geometry) -> Self {
        Self { geometry }
    }

    fn slot_matches(&self, slot: usize, dim: &Dimension) -> bool {
        self.geometry
            .dimension(slot)
            .is_some_and(|native| native.id() == dim.id())
    }

    /// True if `dim` is the geometry's native X dimension.
    #[must_use]
    pub fn is_x_dimension(&self, dim: &Dimension) -> bool {
        self.slot_matches(0, dim)
    }

    /// True if `dim` is the geometry's native Y dimension.
    #[must_use]
    pub fn is_y_dimension(&self, dim: &Dimension) -> bool {
        self.slot_matches(1, dim)
    }

    /// True if `dim` is the geometry's native Z dimension.
    #[must_use]
    pub fn is_z_dimension(&self, dim: &Dimension) -> bool {
        self.slot_matches(2, dim)
    }

    /// True if `dim` is the geometry's native T dimension.
    #[must_use]
    pub fn is_t_dimension(&self, dim: &Dimension) -> bool {
        self.slot_matches(3, dim)
    }

    /// Structural slot (0..4) `dim` occupies, if any.
    #[must_use]
    pub fn native_slot(&self, dim: &Dimension) -> Option<usize> {
        (0..4).find(|&slot| self.slot_matches(slot, dim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::DimensionDescription;
    use crate::geometry::GeometryDescription;

    fn geometry(ids: &[&str]) -> Geometry {
        Geometry::from_description(&GeometryDescription::new(
            ids.iter()
                .map(|id| DimensionDescription::new(*id, 0.0, 1.0, 2))
                .collect(),
        ))
        .unwrap()
    }

    #[test]
    fn test_matches_native_slots() {
        let geom = geometry(&["q1", "q2", "q3", "u1"]);
        let matcher = DimensionMatcher::new(&geom);
        let q3 = geom.dimension_by_id("q3").unwrap();
        assert!(!matcher.is_x_dimension(q3));
        assert!(!matcher.is_y_dimension(q3));
        assert!(matcher.is_z_dimension(q3));
        assert!(!matcher.is_t_dimension(q3));
        assert_eq!(matcher.native_slot(q3), Some(2));
    }

    #[test]
    fn test_missing_slot_is_false_not_error() {
        let geom = geometry(&["q1", "q2"]);
        let matcher = DimensionMatcher::new(&geom);
        let q1 = geom.dimension_by_id("q1").unwrap();
        assert!(matcher.is_x_dimension(q1));
        assert!(!matcher.is_z_dimension(q1));
        assert!(!matcher.is_t_dimension(q1));
    }

    #[test]
    fn test_foreign_dimension_has_no_slot() {
        let geom = geometry(&["q1", "q2", "q3", "u1"]);
        let other = geometry(&["h", "k"]);
        let matcher = DimensionMatcher::new(&geom);
        let h = other.dimension_by_id("h").unwrap();
        assert_eq!(matcher.native_slot(h), None);
    }
}
