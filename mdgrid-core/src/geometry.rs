//! Geometry: an ordered, bounded set of binned dimensions with a stride table.

use crate::dimension::{Dimension, DimensionDescription};
use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of dimensions a geometry may carry.
pub const MAX_DIMS: usize = 11;

/// Ordered collection of axis descriptions defining a geometry.
///
/// Descriptions are the unit of reshape: a geometry is rebuilt wholesale
/// from a description, never mutated piecewise.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeometryDescription {
    /// Per-axis descriptions, in native order.
    pub dimensions: Vec<DimensionDescription>,
}

impl GeometryDescription {
    /// Creates a description from axis descriptions in native order.
    #[must_use]
    pub fn new(dimensions: Vec<DimensionDescription>) -> Self {
        Self { dimensions }
    }

    /// Appends an axis description.
    #[must_use]
    pub fn with_dimension(mut self, dim: DimensionDescription) -> Self {
        self.dimensions.push(dim);
        self
    }

    /// Number of axes described.
    #[must_use]
    pub fn n_dims(&self) -> usize {
        self.dimensions.len()
    }
}

/// Ordered set of [`Dimension`]s with per-axis strides and a total extent.
///
/// The stride table satisfies `stride[0] = 1` and
/// `stride[k] = bins[0] * .. * bins[k-1]`, so the flat index of
/// `(i0, .., iN-1)` is `sum(ik * stride[k])`: row-major with dimension 0
/// fastest. Geometries are immutable; reshape builds a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    dims: Vec<Dimension>,
    strides: Vec<usize>,
    extent: usize,
}

impl Geometry {
    /// Builds a geometry from a description.
    ///
    /// # Errors
    /// Returns an error if the description is empty, exceeds [`MAX_DIMS`],
    /// repeats a dimension id, or contains a zero-bin dimension.
    pub fn from_description(desc: &GeometryDescription) -> Result<Self> {
        if desc.dimensions.is_empty() {
            return Err(Error::EmptyGeometry);
        }
        if desc.dimensions.len() > MAX_DIMS {
            return Err(Error::TooManyDimensions {
                requested: desc.dimensions.len(),
                max: MAX_DIMS,
            });
        }
        for (i, d) in desc.dimensions.iter().enumerate() {
            if d.n_bins == 0 {
                return Err(Error::ZeroBins(d.id.clone()));
            }
            if desc.dimensions[..i].iter().any(|prev| prev.id == d.id) {
                return Err(Error::DuplicateDimension(d.id.clone()));
            }
        }

        let dims: Vec<Dimension> = desc
            .dimensions
            .iter()
            .map(Dimension::from_description)
            .collect();

        let mut strides = Vec::with_capacity(dims.len());
        let mut extent = 1usize;
        for dim in &dims {
            strides.push(extent);
            extent *= dim.n_bins();
        }

        Ok(Self {
            dims,
            strides,
            extent,
        })
    }

    /// Number of dimensions.
    #[inline]
    #[must_use]
    pub fn n_dims(&self) -> usize {
        self.dims.len()
    }

    /// Total extent: product of all bin counts.
    #[inline]
    #[must_use]
    pub fn extent(&self) -> usize {
        self.extent
    }

    /// Dimensions in native order.
    #[must_use]
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dims
    }

    /// Dimension at a native slot, if it exists.
    #[must_use]
    pub fn dimension(&self, slot: usize) -> Option<&Dimension> {
        self.dims.get(slot)
    }

    /// Looks a dimension up by id.
    #[must_use]
    pub fn dimension_by_id(&self, id: &str) -> Option<&Dimension> {
        self.dims.iter().find(|d| d.id() == id)
    }

    /// Native slot occupied by the dimension with the given id.
    #[must_use]
    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.dims.iter().position(|d| d.id() == id)
    }

    /// Elements per unit step along a native slot.
    #[must_use]
    pub fn stride(&self, slot: usize) -> Option<usize> {
        self.strides.get(slot).copied()
    }

    /// The full stride table.
    #[must_use]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Native X dimension (structural slot 0), if present.
    #[must_use]
    pub fn x_dimension(&self) -> Option<&Dimension> {
        self.dims.first()
    }

    /// Native Y dimension (structural slot 1), if present.
    #[must_use]
    pub fn y_dimension(&self) -> Option<&Dimension> {
        self.dims.get(1)
    }

    /// Native Z dimension (structural slot 2), if present.
    #[must_use]
    pub fn z_dimension(&self) -> Option<&Dimension> {
        self.dims.get(2)
    }

    /// Native T dimension (structural slot 3), if present.
    #[must_use]
    pub fn t_dimension(&self) -> Option<&Dimension> {
        self.dims.get(3)
    }

    /// Flat index of a full native index vector.
    ///
    /// Entries beyond the dimension count are ignored; missing entries
    /// address bin 0 of their dimension.
    #[must_use]
    pub fn flat_index(&self, indices: &[usize]) -> usize {
        indices
            .iter()
            .zip(self.strides.iter())
            .map(|(&i, &s)| i * s)
            .sum()
    }
}
