//! In-memory pixel reader for tests and embedders.

use crate::{Error, Result};
use mdgrid_core::reader::{BasisDescription, PixelReader, SubsetRead};
use mdgrid_core::{GeometryDescription, MdImage, PixelRecordDescription};

/// A [`PixelReader`] over data held in memory.
///
/// Cells are appended in flat-index order; each carries its aggregate
/// signal/error and the raw bytes of its pixel records. Useful as a test
/// double and for embedders whose data already lives in memory.
#[derive(Debug)]
pub struct MemoryReader {
    basis: BasisDescription,
    geometry: GeometryDescription,
    points: PixelRecordDescription,
    cell_signal: Vec<f64>,
    cell_error: Vec<f64>,
    cell_npix: Vec<u64>,
    records: Vec<u8>,
    record_offsets: Vec<u64>,
}

impl MemoryReader {
    /// Creates an empty reader for a geometry and record description.
    #[must_use]
    pub fn new(geometry: GeometryDescription, points: PixelRecordDescription) -> Self {
        let basis = BasisDescription {
            ids: geometry.dimensions.iter().map(|d| d.id.clone()).collect(),
            units: geometry.dimensions.iter().map(|_| String::new()).collect(),
        };
        Self {
            basis,
            geometry,
            points,
            cell_signal: Vec::new(),
            cell_error: Vec::new(),
            cell_npix: Vec::new(),
            records: Vec::new(),
            record_offsets: Vec::new(),
        }
    }

    /// Sets the basis description.
    #[must_use]
    pub fn with_basis(mut self, basis: BasisDescription) -> Self {
        self.basis = basis;
        self
    }

    /// Appends the next cell in flat-index order.
    ///
    /// `records` holds the cell's serialized pixels; its length must be an
    /// exact multiple of the record size.
    ///
    /// # Errors
    /// Returns an error if `records` is not a whole number of records.
    pub fn push_cell(&mut self, signal: f64, error: f64, records: &[u8]) -> Result<()> {
        let record = self.points.record_size();
        if record == 0 || records.len() % record != 0 {
            return Err(Error::InvalidFormat(format!(
                "cell byte length {} is not a multiple of the record size {record}",
                records.len()
            )));
        }
        self.cell_signal.push(signal);
        self.cell_error.push(error);
        self.cell_npix.push((records.len() / record) as u64);
        self.record_offsets
            .push((self.records.len() / record) as u64);
        self.records.extend_from_slice(records);
        Ok(())
    }

    /// Number of cells appended.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cell_npix.len()
    }

    fn cell_records(&self, cell: usize) -> &[u8] {
        let record = self.points.record_size();
        let start = self.record_offsets[cell] as usize * record;
        let len = self.cell_npix[cell] as usize * record;
        &self.records[start..start + len]
    }
}

impl PixelReader for MemoryReader {
    fn n_pix(&self) -> u64 {
        self.cell_npix.iter().sum()
    }

    fn read_basis(&self) -> mdgrid_core::Result<BasisDescription> {
        Ok(self.basis.clone())
    }

    fn read_geometry_description(&self) -> mdgrid_core::Result<GeometryDescription> {
        Ok(self.geometry.clone())
    }

    fn read_point_description(&self) -> mdgrid_core::Result<PixelRecordDescription> {
        Ok(self.points.clone())
    }

    fn read_image_data(&self, image: &mut MdImage) -> mdgrid_core::Result<()> {
        let cells = image.cells_mut()?;
        if cells.len() != self.cell_npix.len() {
            return Err(mdgrid_core::Error::ReadError(format!(
                "source holds {} cells, image expects {}",
                self.cell_npix.len(),
                cells.len()
            )));
        }
        for (i, cell) in cells.iter_mut().enumerate() {
            cell.signal = self.cell_signal[i];
            cell.error = self.cell_error[i];
            cell.npix = self.cell_npix[i];
        }
        Ok(())
    }

    fn read_pix_subset(
        &self,
        _image: &MdImage,
        selected_cells: &[usize],
        starting_cell: usize,
        buf: &mut [u8],
    ) -> mdgrid_core::Result<SubsetRead> {
        let record = self.points.record_size();
        let capacity = if record == 0 { 0 } else { buf.len() / record };

        let mut written = 0usize;
        let mut cursor = starting_cell;
        while cursor < selected_cells.len() {
            let cell = selected_cells[cursor];
            let Some(&npix) = self.cell_npix.get(cell) else {
                return Err(mdgrid_core::Error::ReadError(format!(
                    "selected cell {cell} is outside the source"
                )));
            };
            let npix = npix as usize;
            if written + npix > capacity {
                break;
            }
            let dst = &mut buf[written * record..(written + npix) * record];
            dst.copy_from_slice(self.cell_records(cell));
            written += npix;
            cursor += 1;
        }
        Ok(SubsetRead {
            next_cell: cursor,
            pixels_read: written,
        })
    }
}
