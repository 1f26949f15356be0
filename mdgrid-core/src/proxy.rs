//! Axis-role proxies: address an image under an arbitrary relabeling of
//! which native dimension is "X/Y/Z/T".
//!
//! A visualization client picks four dimensions for its structural roles;
//! the proxies reorder the client's `(x, y, z, t)` arguments into the native
//! slots those dimensions actually occupy. The permutation is computed once
//! at binding time, so the hot-path accessor never branches on errors.

use crate::dimension::{AxisRole, Dimension};
use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::image::{GridImage, ImageCell};
use crate::matcher::DimensionMatcher;
use std::sync::{Arc, Weak};

/// The bound role-to-native-slot permutation.
///
/// `perm[native_slot]` is the index of the client argument feeding that slot:
/// `native(args[perm[0]], .., args[perm[3]]) == client(args[0], .., args[3])`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointMapper {
    perm: [usize; 4],
}

impl PointMapper {
    /// Reorders client role-ordered arguments into native slot order.
    #[inline]
    #[must_use]
    pub fn map(&self, args: [usize; 4]) -> [usize; 4] {
        [
            args[self.perm[0]],
            args[self.perm[1]],
            args[self.perm[2]],
            args[self.perm[3]],
        ]
    }

    /// The underlying permutation, indexed by native slot.
    #[must_use]
    pub fn permutation(&self) -> [usize; 4] {
        self.perm
    }
}

/// Non-owning view of a geometry under a client's axis-role assignment.
///
/// Holds a weak reference to the geometry plus the four role dimension ids;
/// the geometry must outlive every resolution call. Construction never
/// validates the ids: a role dimension foreign to the geometry surfaces as
/// [`Error::UnknownDimension`] at first resolution.
#[derive(Debug, Clone)]
pub struct GeometryProxy {
    geometry: Weak<Geometry>,
    role_ids: [String; 4],
}

impl GeometryProxy {
    /// Builds a proxy from the native geometry and the client's four role
    /// dimensions, in X/Y/Z/T order.
    #[must_use]
    pub fn new(
        geometry: &Arc<Geometry>,
        x: &Dimension,
        y: &Dimension,
        z: &Dimension,
        t: &Dimension,
    ) -> Self {
        Self::from_ids(geometry, [x.id(), y.id(), z.id(), t.id()])
    }

    /// Builds a proxy from role dimension ids, in X/Y/Z/T order.
    #[must_use]
    pub fn from_ids<S: AsRef<str>>(geometry: &Arc<Geometry>, ids: [S; 4]) -> Self {
        Self {
            geometry: Arc::downgrade(geometry),
            role_ids: ids.map(|s| s.as_ref().to_string()),
        }
    }

    /// The dimension id assigned to a role.
    #[must_use]
    pub fn role_id(&self, role: AxisRole) -> &str {
        &self.role_ids[role.index()]
    }

    fn upgrade(&self) -> Result<Arc<Geometry>> {
        self.geometry.upgrade().ok_or(Error::GeometryDropped)
    }

    /// Resolves a role to the native dimension it names.
    ///
    /// # Errors
    /// Returns [`Error::UnknownDimension`] if the role's id names no native
    /// dimension, or [`Error::GeometryDropped`] if the geometry is gone.
    pub fn resolve(&self, role: AxisRole) -> Result<Dimension> {
        let geometry = self.upgrade()?;
        let id = self.role_id(role);
        geometry
            .dimension_by_id(id)
            .cloned()
            .ok_or_else(|| Error::UnknownDimension(id.to_string()))
    }

    /// The native dimension serving the client's X role.
    ///
    /// # Errors
    /// See [`resolve`](Self::resolve).
    pub fn x_dimension(&self) -> Result<Dimension> {
        self.resolve(AxisRole::X)
    }

    /// The native dimension serving the client's Y role.
    ///
    /// # Errors
    /// See [`resolve`](Self::resolve).
    pub fn y_dimension(&self) -> Result<Dimension> {
        self.resolve(AxisRole::Y)
    }

    /// The native dimension serving the client's Z role.
    ///
    /// # Errors
    /// See [`resolve`](Self::resolve).
    pub fn z_dimension(&self) -> Result<Dimension> {
        self.resolve(AxisRole::Z)
    }

    /// The native dimension serving the client's T role.
    ///
    /// # Errors
    /// See [`resolve`](Self::resolve).
    pub fn t_dimension(&self) -> Result<Dimension> {
        self.resolve(AxisRole::T)
    }

    /// Binds the role-to-native-slot permutation.
    ///
    /// Each role dimension must occupy exactly one of the four structural
    /// slots and every slot must be claimed exactly once; there are 24 such
    /// assignments. All failures are raised here, once, so the mapper itself
    /// is branch-free.
    ///
    /// # Errors
    /// Returns [`Error::UnknownDimension`] for a role id the geometry does
    /// not carry, and [`Error::CannotBind`] for assignments that are not a
    /// slot permutation.
    pub fn point_mapper(&self) -> Result<PointMapper> {
        let geometry = self.upgrade()?;
        let matcher = DimensionMatcher::new(&geometry);

        let mut perm = [usize::MAX; 4];
        for (role_index, id) in self.role_ids.iter().enumerate() {
            let dim = geometry
                .dimension_by_id(id)
                .ok_or_else(|| Error::UnknownDimension(id.clone()))?;
            let slot = matcher.native_slot(dim).ok_or_else(|| {
                Error::CannotBind(format!("dimension {id} occupies no structural slot"))
            })?;
            if perm[slot] != usize::MAX {
                return Err(Error::CannotBind(format!(
                    "two roles claim native slot {slot}"
                )));
            }
            perm[slot] = role_index;
        }
        Ok(PointMapper { perm })
    }
}

/// An image addressed through a client's axis-role assignment.
///
/// Composes an image with a [`GeometryProxy`]; the permutation is bound at
/// construction and [`point`](Self::point) is a straight permuted lookup.
pub struct ImageProxy<I: GridImage> {
    image: Arc<I>,
    geometry: GeometryProxy,
    mapper: PointMapper,
}

impl<I: GridImage> ImageProxy<I> {
    /// Binds an image to a role assignment.
    ///
    /// # Errors
    /// Returns the binding failures of [`GeometryProxy::point_mapper`].
    pub fn new(image: Arc<I>, geometry: GeometryProxy) -> Result<Self> {
        let mapper = geometry.point_mapper()?;
        Ok(Self {
            image,
            geometry,
            mapper,
        })
    }

    /// Cell at the client-ordered index `(x, y, z, t)`.
    #[inline]
    #[must_use]
    pub fn point(&self, x: usize, y: usize, z: usize, t: usize) -> ImageCell {
        self.image.point4(self.mapper.map([x, y, z, t]))
    }

    /// The role-aware geometry view.
    #[must_use]
    pub fn geometry(&self) -> &GeometryProxy {
        &self.geometry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::DimensionDescription;
    use crate::geometry::GeometryDescription;
    use crate::image::MdImage;

    fn geometry_4d() -> Arc<Geometry> {
        Arc::new(
            Geometry::from_description(&GeometryDescription::new(vec![
                DimensionDescription::new("q1", 0.0, 1.0, 3),
                DimensionDescription::new("q2", 0.0, 1.0, 4),
                DimensionDescription::new("q3", 0.0, 1.0, 5),
                DimensionDescription::new("u1", 0.0, 1.0, 2),
            ]))
            .unwrap(),
        )
    }

    fn counting_image(geometry: &Arc<Geometry>) -> Arc<MdImage> {
        let cells = (0..geometry.extent())
            .map(|i| crate::image::ImageCell::new(i as f64, 0.0, 0))
            .collect();
        Arc::new(MdImage::from_parts(Arc::clone(geometry), cells).unwrap())
    }

    #[test]
    fn test_reversed_assignment_maps_point() {
        let geometry = geometry_4d();
        let image = counting_image(&geometry);
        // Client X <-> native q3, Y <-> q2, Z <-> q1, T <-> u1.
        let proxy = GeometryProxy::from_ids(&geometry, ["q3", "q2", "q1", "u1"]);
        let mapper = proxy.point_mapper().unwrap();
        assert_eq!(mapper.permutation(), [2, 1, 0, 3]);

        let view = ImageProxy::new(Arc::clone(&image), proxy).unwrap();
        for (i, j, k, t) in [(0, 0, 0, 0), (2, 3, 4, 1), (1, 0, 2, 1)] {
            assert_eq!(view.point(i, j, k, t), image.point4([k, j, i, t]));
        }
    }

    #[test]
    fn test_role_accessors_return_intended_dimensions() {
        let geometry = geometry_4d();
        let proxy = GeometryProxy::from_ids(&geometry, ["q2", "u1", "q1", "q3"]);
        assert_eq!(proxy.x_dimension().unwrap().id(), "q2");
        assert_eq!(proxy.y_dimension().unwrap().id(), "u1");
        assert_eq!(proxy.z_dimension().unwrap().id(), "q1");
        assert_eq!(proxy.t_dimension().unwrap().id(), "q3");
    }

    #[test]
    fn test_foreign_role_fails_at_resolution_not_construction() {
        let geometry = geometry_4d();
        // Construction accepts anything.
        let proxy = GeometryProxy::from_ids(&geometry, ["q1", "q2", "q3", "dE"]);
        assert_eq!(proxy.x_dimension().unwrap().id(), "q1");
        let err = proxy.t_dimension().unwrap_err();
        assert!(matches!(err, Error::UnknownDimension(id) if id == "dE"));
        assert!(matches!(
            proxy.point_mapper(),
            Err(Error::UnknownDimension(_))
        ));
    }

    #[test]
    fn test_duplicate_roles_cannot_bind() {
        let geometry = geometry_4d();
        let proxy = GeometryProxy::from_ids(&geometry, ["q1", "q1", "q3", "u1"]);
        assert!(matches!(proxy.point_mapper(), Err(Error::CannotBind(_))));
    }

    #[test]
    fn test_short_geometry_cannot_bind() {
        let geometry = Arc::new(
            Geometry::from_description(&GeometryDescription::new(vec![
                DimensionDescription::new("q1", 0.0, 1.0, 3),
                DimensionDescription::new("q2", 0.0, 1.0, 4),
            ]))
            .unwrap(),
        );
        let proxy = GeometryProxy::from_ids(&geometry, ["q1", "q2", "q1", "q2"]);
        assert!(matches!(proxy.point_mapper(), Err(Error::CannotBind(_))));
    }

    #[test]
    fn test_dropped_geometry_surfaces() {
        let geometry = geometry_4d();
        let proxy = GeometryProxy::from_ids(&geometry, ["q1", "q2", "q3", "u1"]);
        drop(geometry);
        assert!(matches!(proxy.x_dimension(), Err(Error::GeometryDropped)));
        assert!(matches!(proxy.point_mapper(), Err(Error::GeometryDropped)));
    }
}
