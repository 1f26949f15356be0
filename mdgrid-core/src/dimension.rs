//! Dimension types: one labeled, bounded, binned axis of a geometry.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Structural role a dimension plays for a visualization client.
///
/// Roles label the four argument slots of the 4-point accessors; they are
/// independent of a dimension's native position in its geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AxisRole {
    /// First structural slot.
    X,
    /// Second structural slot.
    Y,
    /// Third structural slot.
    Z,
    /// Fourth structural slot.
    T,
}

impl AxisRole {
    /// All four roles, in argument order.
    pub const ALL: [AxisRole; 4] = [AxisRole::X, AxisRole::Y, AxisRole::Z, AxisRole::T];

    /// Returns the argument-slot index of this role.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            AxisRole::X => 0,
            AxisRole::Y => 1,
            AxisRole::Z => 2,
            AxisRole::T => 3,
        }
    }
}

/// Description of a single axis: id, numeric range, bin count.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DimensionDescription {
    /// Axis identifier, unique within a geometry.
    pub id: String,
    /// Lower bound of the axis range.
    pub min: f64,
    /// Upper bound of the axis range.
    pub max: f64,
    /// Number of bins along the axis.
    pub n_bins: usize,
}

impl DimensionDescription {
    /// Creates a new axis description.
    pub fn new(id: impl Into<String>, min: f64, max: f64, n_bins: usize) -> Self {
        Self {
            id: id.into(),
            min,
            max,
            n_bins,
        }
    }
}

/// One labeled, bounded, binned axis.
///
/// The axis-point table holds one physical coordinate per bin (bin centers),
/// precomputed at construction so point extraction never recomputes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    id: String,
    min: f64,
    max: f64,
    n_bins: usize,
    axis_points: Vec<f64>,
}

impl Dimension {
    /// Builds a dimension from its description.
    #[must_use]
    pub fn from_description(desc: &DimensionDescription) -> Self {
        let step = if desc.n_bins == 0 {
            0.0
        } else {
            (desc.max - desc.min) / desc.n_bins as f64
        };
        let axis_points = (0..desc.n_bins)
            .map(|i| desc.min + (i as f64 + 0.5) * step)
            .collect();
        Self {
            id: desc.id.clone(),
            min: desc.min,
            max: desc.max,
            n_bins: desc.n_bins,
            axis_points,
        }
    }

    /// Returns the axis identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the lower bound of the axis range.
    #[inline]
    #[must_use]
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Returns the upper bound of the axis range.
    #[inline]
    #[must_use]
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Returns the number of bins.
    #[inline]
    #[must_use]
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Returns the width of one bin.
    #[must_use]
    pub fn bin_width(&self) -> f64 {
        if self.n_bins == 0 {
            0.0
        } else {
            (self.max - self.min) / self.n_bins as f64
        }
    }

    /// Returns the physical coordinate of a bin from the axis-point table.
    ///
    /// Indices past the last bin clamp to it, matching the clamp-to-edge
    /// selection contract.
    #[must_use]
    pub fn coordinate(&self, index: usize) -> f64 {
        match self.axis_points.get(index) {
            Some(&c) => c,
            None => self.axis_points.last().copied().unwrap_or(self.min),
        }
    }

    /// Returns the full axis-point table.
    #[must_use]
    pub fn axis_points(&self) -> &[f64] {
        &self.axis_points
    }

    /// Clamps a bin index into `[0, n_bins - 1]`.
    #[inline]
    #[must_use]
    pub fn clamp_index(&self, index: usize) -> usize {
        index.min(self.n_bins.saturating_sub(1))
    }
}
