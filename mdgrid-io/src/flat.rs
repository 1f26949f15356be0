//! Memory-mapped reader over a flat little-endian pixel-record stream.

use crate::record::{error_of, signal_of};
use crate::{Error, Result};
use mdgrid_core::reader::{BasisDescription, PixelReader, SubsetRead};
use mdgrid_core::{GeometryDescription, MdImage, PixelRecordDescription};
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::path::Path;

/// A [`PixelReader`] over a memory-mapped file of pixel records.
///
/// The file layout is supplied by the caller: the geometry and record
/// descriptions plus the per-cell record counts, in flat-index order. This
/// reader only checks that the mapped bytes agree with the declared layout;
/// it defines no format of its own.
#[derive(Debug)]
pub struct FlatReader {
    mmap: Mmap,
    basis: BasisDescription,
    geometry: GeometryDescription,
    points: PixelRecordDescription,
    counts: Vec<u64>,
    offsets: Vec<u64>,
    total_pixels: u64,
}

impl FlatReader {
    /// Maps a record file and validates it against the declared layout.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or mapped, if its length
    /// is not a whole number of records, if the record total disagrees with
    /// `counts`, or if `counts` does not cover the geometry extent.
    pub fn open<P: AsRef<Path>>(
        path: P,
        geometry: GeometryDescription,
        points: PixelRecordDescription,
        counts: Vec<u64>,
    ) -> Result<Self> {
        let record = points.record_size();
        if record == 0 {
            return Err(Error::InvalidFormat(
                "point description has no columns".to_string(),
            ));
        }

        let extent: usize = geometry.dimensions.iter().map(|d| d.n_bins).product();
        if counts.len() != extent {
            return Err(Error::InvalidFormat(format!(
                "{} cell counts declared for a geometry extent of {extent}",
                counts.len()
            )));
        }

        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified
        // concurrently. This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() % record != 0 {
            return Err(Error::InvalidFormat(format!(
                "file length {} is not a multiple of the record size {record}",
                mmap.len()
            )));
        }
        let total_pixels: u64 = counts.iter().sum();
        if (mmap.len() / record) as u64 != total_pixels {
            return Err(Error::InvalidFormat(format!(
                "file holds {} records but counts declare {total_pixels}",
                mmap.len() / record
            )));
        }

        let mut offsets = Vec::with_capacity(counts.len());
        let mut offset = 0u64;
        for &n in &counts {
            offsets.push(offset);
            offset += n;
        }

        let basis = BasisDescription {
            ids: geometry.dimensions.iter().map(|d| d.id.clone()).collect(),
            units: geometry.dimensions.iter().map(|_| String::new()).collect(),
        };

        Ok(Self {
            mmap,
            basis,
            geometry,
            points,
            counts,
            offsets,
            total_pixels,
        })
    }

    /// Sets the basis description.
    #[must_use]
    pub fn with_basis(mut self, basis: BasisDescription) -> Self {
        self.basis = basis;
        self
    }

    /// Mapped file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.mmap.len()
    }

    fn cell_bytes(&self, cell: usize) -> &[u8] {
        let record = self.points.record_size();
        let start = self.offsets[cell] as usize * record;
        let len = self.counts[cell] as usize * record;
        &self.mmap[start..start + len]
    }
}

impl PixelReader for FlatReader {
    fn n_pix(&self) -> u64 {
        self.total_pixels
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

    /// Rebins the record stream into the image: per cell, signal and error
    /// columns are summed and the pixel count recorded.
    fn read_image_data(&self, image: &mut MdImage) -> mdgrid_core::Result<()> {
        let cells = image.cells_mut()?;
        if cells.len() != self.counts.len() {
            return Err(mdgrid_core::Error::ReadError(format!(
                "source holds {} cells, image expects {}",
                self.counts.len(),
                cells.len()
            )));
        }

        let record = self.points.record_size();
        let sums: Vec<(f64, f64)> = (0..self.counts.len())
            .into_par_iter()
            .map(|cell| {
                let mut signal = 0.0f64;
                let mut error = 0.0f64;
                for rec in self.cell_bytes(cell).chunks_exact(record) {
                    signal += f64::from(signal_of(&self.points, rec));
                    error += f64::from(error_of(&self.points, rec));
                }
                (signal, error)
            })
            .collect();

        for (i, cell) in cells.iter_mut().enumerate() {
            cell.signal = sums[i].0;
            cell.error = sums[i].1;
            cell.npix = self.counts[i];
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
        let capacity = buf.len() / record;

        // Take whole cells until the next one would not fit.
        let mut taken = Vec::new();
        let mut written = 0usize;
        let mut cursor = starting_cell;
        while cursor < selected_cells.len() {
            let cell = selected_cells[cursor];
            if cell >= self.counts.len() {
                return Err(mdgrid_core::Error::ReadError(format!(
                    "selected cell {cell} is outside the source"
                )));
            }
            let npix = self.counts[cell] as usize;
            if written + npix > capacity {
                break;
            }
            if npix > 0 {
                taken.push(self.cell_bytes(cell));
            }
            written += npix;
            cursor += 1;
        }

        // Gather: carve disjoint destination slices, then copy in parallel.
        let mut jobs = Vec::with_capacity(taken.len());
        let mut rest: &mut [u8] = buf;
        for src in taken {
            let (dst, tail) = std::mem::take(&mut rest).split_at_mut(src.len());
            jobs.push((dst, src));
            rest = tail;
        }
        jobs.into_par_iter()
            .for_each(|(dst, src)| dst.copy_from_slice(src));

        Ok(SubsetRead {
            next_cell: cursor,
            pixels_read: written,
        })
    }
}
