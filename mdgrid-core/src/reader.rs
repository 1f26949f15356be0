//! The pixel-reader collaborator trait.
//!
//! The core never parses source bytes itself: everything that touches a
//! concrete data source sits behind [`PixelReader`], with one implementation
//! per source format (see the `mdgrid-io` crate).

use crate::error::Result;
use crate::geometry::GeometryDescription;
use crate::image::MdImage;
use crate::pixels::PixelRecordDescription;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Basis of the dataset's coordinate system: axis ids and their units.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BasisDescription {
    /// Axis ids in native order.
    pub ids: Vec<String>,
    /// Unit label per axis, matching `ids`.
    pub units: Vec<String>,
}

/// Outcome of one bounded subset read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsetRead {
    /// Index into the selected-cell list of the next unread cell.
    ///
    /// Equals the list length once the selection is exhausted; callers loop,
    /// feeding it back in as the starting cell, until then.
    pub next_cell: usize,
    /// Number of whole pixel records written into the buffer.
    pub pixels_read: usize,
}

impl SubsetRead {
    /// True once every selected cell has been read.
    #[must_use]
    pub fn is_done(&self, selected_cells: &[usize]) -> bool {
        self.next_cell >= selected_cells.len()
    }
}

/// Capability set of a pixel data source.
///
/// Implementations must honor the whole-cell contract of
/// [`read_pix_subset`](PixelReader::read_pix_subset): a cell's pixels are
/// written entirely or not at all, never split across buffers.
pub trait PixelReader {
    /// Total number of pixels in the dataset.
    fn n_pix(&self) -> u64;

    /// Reads the coordinate-basis description.
    ///
    /// # Errors
    /// Returns an error if the source cannot supply a basis.
    fn read_basis(&self) -> Result<BasisDescription>;

    /// Reads the geometry description the image should be shaped to.
    ///
    /// # Errors
    /// Returns an error if the source cannot supply a geometry.
    fn read_geometry_description(&self) -> Result<GeometryDescription>;

    /// Reads the per-point record description (column names, record size).
    ///
    /// # Errors
    /// Returns an error if the source cannot supply a point description.
    fn read_point_description(&self) -> Result<PixelRecordDescription>;

    /// Populates the image cells (signal, error, pixel count) from the source.
    ///
    /// # Errors
    /// Returns an error if the source does not cover the image extent.
    fn read_image_data(&self, image: &mut MdImage) -> Result<()>;

    /// Reads pixel records for `selected_cells[starting_cell..]` into `buf`,
    /// stopping before the first cell that would not fit whole.
    ///
    /// # Errors
    /// Returns an error if the source fails or the starting cell is past the
    /// selection.
    fn read_pix_subset(
        &self,
        image: &MdImage,
        selected_cells: &[usize],
        starting_cell: usize,
        buf: &mut [u8],
    ) -> Result<SubsetRead>;
}
