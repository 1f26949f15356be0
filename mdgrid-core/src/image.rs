//! Dense N-D rebinned image: flat cell array plus selection/slicing.

use crate::error::{Error, Result};
use crate::geometry::{Geometry, GeometryDescription};
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use std::mem::size_of;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One element of the flat cell array.
///
/// Aggregates the rebinned signal, its error, and the number of raw pixels
/// that contributed to the cell. A cell's chunk location in the pixel stream
/// is derived from the pixel counts (see `PixelStore`), never stored here.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageCell {
    /// Rebinned signal.
    pub signal: f64,
    /// Error on the signal.
    pub error: f64,
    /// Number of contributing pixels.
    pub npix: u64,
}

impl ImageCell {
    /// Creates a cell.
    #[inline]
    #[must_use]
    pub fn new(signal: f64, error: f64, npix: u64) -> Self {
        Self {
            signal,
            error,
            npix,
        }
    }
}

/// One entry of a `get_point_data` result block.
///
/// `coord[k]` is the physical coordinate of enumerated dimension `k`
/// (axis-point table lookup); slots past the enumerated count are 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePoint {
    /// Physical coordinates of the enumerated dimensions.
    pub coord: [f64; 3],
    /// Aggregate cell payload.
    pub cell: ImageCell,
}

/// 4-argument cell access, the seam the axis-role proxies compose over.
pub trait GridImage {
    /// Returns the cell at the native index `(i, j, k, t)`.
    ///
    /// Argument slots beyond the geometry's dimension count must be 0.
    fn point4(&self, index: [usize; 4]) -> ImageCell;

    /// Returns the native geometry.
    fn grid_geometry(&self) -> &Arc<Geometry>;
}

/// Dense N-D rebinned array with its cached geometry.
///
/// Invariant: once allocated, the cell array length equals the geometry's
/// extent. A violation is an internal-consistency failure
/// ([`Error::ImageGeometryMismatch`]) and is checked on every reshape and
/// fallible construction.
#[derive(Debug)]
pub struct MdImage {
    geometry: Arc<Geometry>,
    cells: Vec<ImageCell>,
    allocated: bool,
}

impl MdImage {
    /// Builds and allocates an image from a geometry description.
    ///
    /// # Errors
    /// Returns an error if the description is invalid or the sized array
    /// disagrees with the geometry extent.
    pub fn new(description: &GeometryDescription) -> Result<Self> {
        let geometry = Arc::new(Geometry::from_description(description)?);
        let mut image = Self {
            geometry,
            cells: Vec::new(),
            allocated: false,
        };
        image.allocate()?;
        Ok(image)
    }

    /// Builds an image over existing parts, enforcing the size invariant.
    ///
    /// # Errors
    /// Returns [`Error::ImageGeometryMismatch`] if the cell array length is
    /// not the geometry extent. The check runs before any cell is touched.
    pub fn from_parts(geometry: Arc<Geometry>, cells: Vec<ImageCell>) -> Result<Self> {
        if cells.len() != geometry.extent() {
            return Err(Error::ImageGeometryMismatch {
                cells: cells.len(),
                extent: geometry.extent(),
            });
        }
        Ok(Self {
            geometry,
            cells,
            allocated: true,
        })
    }

    /// Reshapes the image to a new geometry description.
    ///
    /// Existing storage large enough for the new extent is zeroed in place;
    /// smaller storage is freed and reallocated, then zeroed. Any pixel-chunk
    /// table built over the old contents must be recomputed afterwards.
    ///
    /// # Errors
    /// Returns an error if the description is invalid or the sized array
    /// disagrees with the new geometry extent.
    pub fn reshape(&mut self, description: &GeometryDescription) -> Result<()> {
        self.geometry = Arc::new(Geometry::from_description(description)?);
        self.allocate()
    }

    fn allocate(&mut self) -> Result<()> {
        let needed = self.geometry.extent();
        if self.cells.capacity() >= needed {
            self.cells.clear();
            self.cells.resize(needed, ImageCell::default());
        } else {
            self.cells = Vec::new();
            self.cells.resize(needed, ImageCell::default());
        }
        self.allocated = true;
        self.check_consistency()
    }

    /// Verifies the array-length/extent invariant.
    ///
    /// # Errors
    /// Returns [`Error::ImageGeometryMismatch`] on violation.
    pub fn check_consistency(&self) -> Result<()> {
        if self.allocated && self.cells.len() != self.geometry.extent() {
            return Err(Error::ImageGeometryMismatch {
                cells: self.cells.len(),
                extent: self.geometry.extent(),
            });
        }
        Ok(())
    }

    /// Returns the shared geometry.
    #[must_use]
    pub fn geometry(&self) -> &Arc<Geometry> {
        &self.geometry
    }

    /// Number of cells.
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.cells.len()
    }

    /// Direct read access to the cell array.
    ///
    /// # Errors
    /// Returns [`Error::NotAllocated`] if storage does not exist yet.
    pub fn cells(&self) -> Result<&[ImageCell]> {
        if self.allocated {
            Ok(&self.cells)
        } else {
            Err(Error::NotAllocated)
        }
    }

    /// Direct write access to the cell array.
    ///
    /// # Errors
    /// Returns [`Error::NotAllocated`] if storage does not exist yet.
    pub fn cells_mut(&mut self) -> Result<&mut [ImageCell]> {
        if self.allocated {
            Ok(&mut self.cells)
        } else {
            Err(Error::NotAllocated)
        }
    }

    /// Extracts a sub-block of points for a partial index selection.
    ///
    /// `selection` fixes the highest-indexed dimensions: its last entry fixes
    /// dimension N-1, the one before it N-2, and so on. Each fixed entry is
    /// clamped to `[0, bins - 1]`, silently, so interactive slicing tolerates
    /// stale indices. Uncovered dimensions at index 3 and above sit at bin 0.
    /// The lowest `min(3, N - s)` dimensions are enumerated in full, dimension
    /// 0 fastest, and `out` receives one [`ImagePoint`] per enumerated cell
    /// carrying the axis coordinates of the enumerated dimensions.
    ///
    /// # Errors
    /// Returns [`Error::SelectionTooLong`] if `selection` has more entries
    /// than the geometry has dimensions, and [`Error::NotAllocated`] if the
    /// cell array does not exist.
    pub fn get_point_data(&self, selection: &[usize], out: &mut Vec<ImagePoint>) -> Result<()> {
        let n = self.geometry.n_dims();
        let s = selection.len();
        if s > n {
            return Err(Error::SelectionTooLong {
                selection: s,
                dims: n,
            });
        }
        if !self.allocated {
            return Err(Error::NotAllocated);
        }
        self.check_consistency()?;

        let dims = self.geometry.dimensions();
        let strides = self.geometry.strides();

        // Fixed part: selection entries applied from dimension N-1 downward.
        let mut base = 0usize;
        for i in 0..s {
            let dim_idx = n - 1 - i;
            let clamped = dims[dim_idx].clamp_index(selection[s - 1 - i]);
            base += clamped * strides[dim_idx];
        }

        // Enumerated part: the lowest min(3, N-s) dimensions in full.
        let n_free = n - s;
        let n_enum = n_free.min(3);
        let mut counts = [1usize; 3];
        for k in 0..n_enum {
            counts[k] = dims[k].n_bins();
        }
        let total: usize = counts[..n_enum].iter().product();

        out.clear();
        out.reserve(total);

        let mut idx = [0usize; 3];
        for _ in 0..total {
            let mut flat = base;
            let mut coord = [0.0f64; 3];
            for k in 0..n_enum {
                flat += idx[k] * strides[k];
                coord[k] = dims[k].coordinate(idx[k]);
            }
            out.push(ImagePoint {
                coord,
                cell: self.cells[flat],
            });

            // Odometer increment, dimension 0 fastest.
            for k in 0..n_enum {
                idx[k] += 1;
                if idx[k] < counts[k] {
                    break;
                }
                idx[k] = 0;
            }
        }
        Ok(())
    }

    /// Memory footprint of the cell storage in bytes.
    #[must_use]
    pub fn memory_footprint(&self) -> usize {
        self.cells.capacity() * size_of::<ImageCell>()
    }

    /// Copies the signal channel into an N-D array shaped by the bin counts.
    ///
    /// Axis order matches the geometry's native order, dimension 0 fastest
    /// (column-major layout).
    ///
    /// # Errors
    /// Returns [`Error::NotAllocated`] if storage does not exist, or the
    /// consistency error if the array fell out of sync with its geometry.
    pub fn signal_array(&self) -> Result<ArrayD<f64>> {
        let cells = self.cells()?;
        self.check_consistency()?;
        let shape: Vec<usize> = self
            .geometry
            .dimensions()
            .iter()
            .map(crate::dimension::Dimension::n_bins)
            .collect();
        let signals: Vec<f64> = cells.iter().map(|c| c.signal).collect();
        ArrayD::from_shape_vec(IxDyn(&shape).f(), signals).map_err(|_| {
            Error::ImageGeometryMismatch {
                cells: self.cells.len(),
                extent: self.geometry.extent(),
            }
        })
    }
}

impl GridImage for MdImage {
    #[inline]
    fn point4(&self, index: [usize; 4]) -> ImageCell {
        let flat = self.geometry.flat_index(&index);
        self.cells[flat]
    }

    fn grid_geometry(&self) -> &Arc<Geometry> {
        &self.geometry
    }
}
