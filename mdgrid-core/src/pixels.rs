//! Sparse pixel-chunk index and bounded streaming over a reader.
//!
//! The image's cells carry per-cell pixel counts; this module derives the
//! chunk-offset table (where each cell's pixels start in the global stream)
//! and drives bounded, resumable reads through a [`PixelReader`].

use crate::error::{Error, Result};
use crate::image::MdImage;
use crate::reader::{PixelReader, SubsetRead};
use std::mem::size_of;
use sysinfo::System;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Description of one serialized pixel record: its columns and their widths.
///
/// Dimension and signal columns serialize as `f32`, index columns as `u32`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelRecordDescription {
    /// One column per dataset dimension, in native order.
    pub dim_columns: Vec<String>,
    /// Signal-carrying columns (signal, error).
    pub signal_columns: Vec<String>,
    /// Integer index columns (run index, detector index, ...).
    pub index_columns: Vec<String>,
}

impl PixelRecordDescription {
    /// Creates a description from explicit column lists.
    #[must_use]
    pub fn new(
        dim_columns: Vec<String>,
        signal_columns: Vec<String>,
        index_columns: Vec<String>,
    ) -> Self {
        Self {
            dim_columns,
            signal_columns,
            index_columns,
        }
    }

    /// Default description for a geometry: one column per dimension id plus
    /// signal/error and run/detector indices.
    #[must_use]
    pub fn for_dimension_ids<S: AsRef<str>>(ids: &[S]) -> Self {
        Self {
            dim_columns: ids.iter().map(|s| s.as_ref().to_string()).collect(),
            signal_columns: vec!["signal".to_string(), "error".to_string()],
            index_columns: vec!["run_index".to_string(), "detector_index".to_string()],
        }
    }

    /// True if a dimension column with this id is declared.
    #[must_use]
    pub fn has_dimension_column(&self, id: &str) -> bool {
        self.dim_columns.iter().any(|c| c == id)
    }

    /// Serialized size of one pixel record in bytes.
    #[must_use]
    pub fn record_size(&self) -> usize {
        (self.dim_columns.len() + self.signal_columns.len()) * size_of::<f32>()
            + self.index_columns.len() * size_of::<u32>()
    }
}

/// Policy for sizing the streaming buffer from a memory budget.
#[derive(Clone, Debug)]
pub struct BufferPolicy {
    /// Fraction of available system memory to target (0.0 < fraction <= 1.0).
    pub memory_fraction: f64,
    /// Explicit budget override (bytes). If set, `memory_fraction` is ignored.
    pub memory_budget_bytes: Option<usize>,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self {
            memory_fraction: 0.25,
            memory_budget_bytes: None,
        }
    }
}

impl BufferPolicy {
    /// Set the fraction of available system memory to target.
    #[must_use]
    pub fn with_memory_fraction(mut self, fraction: f64) -> Self {
        self.memory_fraction = fraction;
        self
    }

    /// Set an explicit memory budget in bytes.
    #[must_use]
    pub fn with_memory_budget_bytes(mut self, bytes: usize) -> Self {
        self.memory_budget_bytes = Some(bytes);
        self
    }

    /// Resolve the target budget in bytes.
    ///
    /// # Errors
    /// Returns an error if the memory fraction is invalid or system memory
    /// cannot be queried.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
    pub fn resolve_budget_bytes(&self) -> Result<usize> {
        if let Some(bytes) = self.memory_budget_bytes {
            return Ok(bytes);
        }
        if !(0.0 < self.memory_fraction && self.memory_fraction <= 1.0) {
            return Err(Error::Config(
                "memory_fraction must be in (0.0, 1.0]".to_string(),
            ));
        }
        let mut system = System::new();
        system.refresh_memory();
        let available = system.available_memory();
        if available == 0 {
            return Err(Error::Config(
                "available system memory reported as 0".to_string(),
            ));
        }
        let budget = (available as f64 * self.memory_fraction).floor() as u64;
        Ok(usize::try_from(budget).unwrap_or(usize::MAX))
    }

    /// Number of pixel records the resolved budget accommodates.
    ///
    /// # Errors
    /// Returns an error if the budget cannot be resolved or the record size
    /// is zero.
    pub fn resolve_budget_pixels(&self, record_size: usize) -> Result<usize> {
        if record_size == 0 {
            return Err(Error::Config("record size is zero".to_string()));
        }
        Ok(self.resolve_budget_bytes()? / record_size)
    }
}

/// Pixel-chunk offset table plus a reusable bounded read buffer.
///
/// Ordering contract (caller-enforced): [`init_chunk_offsets`] must run only
/// once the image's per-cell pixel counts are final, and must be rerun
/// whenever the image is repopulated.
///
/// [`init_chunk_offsets`]: PixelStore::init_chunk_offsets
pub struct PixelStore {
    description: PixelRecordDescription,
    reader: Option<Box<dyn PixelReader>>,
    total_pixels: Option<u64>,
    chunk_offsets: Vec<u64>,
    buffer: Vec<u8>,
}

impl PixelStore {
    /// Creates a store for the given record description.
    #[must_use]
    pub fn new(description: PixelRecordDescription) -> Self {
        Self {
            description,
            reader: None,
            total_pixels: None,
            chunk_offsets: Vec::new(),
            buffer: Vec::new(),
        }
    }

    /// Returns the record description.
    #[must_use]
    pub fn description(&self) -> &PixelRecordDescription {
        &self.description
    }

    /// Serialized size of one pixel record in bytes.
    #[must_use]
    pub fn record_size(&self) -> usize {
        self.description.record_size()
    }

    /// Attaches a reader after validating the column contract.
    ///
    /// Every dimension id the image geometry exposes must appear among the
    /// declared dimension columns; the check runs before any I/O.
    ///
    /// # Errors
    /// Returns [`Error::MissingColumn`] naming the first geometry dimension
    /// with no matching column.
    pub fn initialize(&mut self, image: &MdImage, reader: Box<dyn PixelReader>) -> Result<()> {
        for dim in image.geometry().dimensions() {
            if !self.description.has_dimension_column(dim.id()) {
                return Err(Error::MissingColumn(dim.id().to_string()));
            }
        }
        self.total_pixels = Some(reader.n_pix());
        self.reader = Some(reader);
        Ok(())
    }

    /// Total pixels in the dataset, known once a reader is attached.
    #[must_use]
    pub fn total_pixels(&self) -> Option<u64> {
        self.total_pixels
    }

    /// Computes the chunk-offset table from the image's pixel counts.
    ///
    /// Strict left-to-right prefix sum: `offset[0] = 0`,
    /// `offset[i] = offset[i-1] + npix[i-1]`.
    ///
    /// # Errors
    /// Returns [`Error::NotAllocated`] if the image has no cells.
    pub fn init_chunk_offsets(&mut self, image: &MdImage) -> Result<()> {
        let cells = image.cells()?;
        self.chunk_offsets.clear();
        self.chunk_offsets.reserve(cells.len());
        let mut offset = 0u64;
        for cell in cells {
            self.chunk_offsets.push(offset);
            offset += cell.npix;
        }
        Ok(())
    }

    /// The chunk-offset table (empty until computed).
    #[must_use]
    pub fn chunk_offsets(&self) -> &[u64] {
        &self.chunk_offsets
    }

    /// Offset of a cell's first pixel within the global stream.
    #[must_use]
    pub fn chunk_location(&self, cell: usize) -> Option<u64> {
        self.chunk_offsets.get(cell).copied()
    }

    /// Sizes the reusable buffer for `requested_pixels` records and returns it.
    ///
    /// The byte length is `min(requested, total_dataset_pixels)` records,
    /// further capped at the platform allocation ceiling, and always an exact
    /// multiple of the record size. Growing reallocates; shrinking is a no-op
    /// and the larger buffer is retained.
    pub fn alloc_buffer(&mut self, requested_pixels: usize) -> &mut [u8] {
        let record = self.record_size().max(1);
        let ceiling = (isize::MAX as usize) / record;
        let mut records = requested_pixels.min(ceiling);
        if let Some(total) = self.total_pixels {
            records = records.min(usize::try_from(total).unwrap_or(usize::MAX));
        }
        let bytes = records * record;
        if bytes > self.buffer.len() {
            self.buffer.resize(bytes, 0);
        }
        &mut self.buffer[..]
    }

    /// Current buffer length in bytes.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Forwards a bounded subset read to the configured reader.
    ///
    /// Pure pass-through: the reader fills `buf` with whole cells starting at
    /// `selected_cells[starting_cell]` and reports the next unread cell.
    /// Callers loop, feeding the returned cursor back in, until it reaches
    /// the selection length.
    ///
    /// # Errors
    /// Returns [`Error::NoReader`] if no reader is configured, or the
    /// reader's own failure.
    pub fn read_pix_subset(
        &self,
        image: &MdImage,
        selected_cells: &[usize],
        starting_cell: usize,
        buf: &mut [u8],
    ) -> Result<SubsetRead> {
        let reader = self.reader.as_ref().ok_or(Error::NoReader)?;
        reader.read_pix_subset(image, selected_cells, starting_cell, buf)
    }

    /// Streams an entire selection through the store's own buffer.
    ///
    /// Sizes the buffer for `requested_pixels`, then drives the cursor loop,
    /// invoking `f` once per filled buffer with the bytes of the whole
    /// records read. Returns the total pixel count streamed.
    ///
    /// # Errors
    /// Returns [`Error::NoReader`] without a reader, the reader's failure, or
    /// [`Error::ReadError`] if a single cell exceeds the buffer.
    pub fn for_each_subset<F>(
        &mut self,
        image: &MdImage,
        selected_cells: &[usize],
        requested_pixels: usize,
        mut f: F,
    ) -> Result<usize>
    where
        F: FnMut(&[u8]),
    {
        self.alloc_buffer(requested_pixels.max(1));
        let record = self.record_size();
        let reader = self.reader.as_ref().ok_or(Error::NoReader)?;

        let mut cursor = 0usize;
        let mut total = 0usize;
        while cursor < selected_cells.len() {
            let read = reader.read_pix_subset(image, selected_cells, cursor, &mut self.buffer)?;
            if read.pixels_read == 0 && read.next_cell == cursor {
                return Err(Error::ReadError(format!(
                    "cell {} does not fit the {}-byte buffer",
                    selected_cells[cursor],
                    self.buffer.len()
                )));
            }
            total += read.pixels_read;
            f(&self.buffer[..read.pixels_read * record]);
            cursor = read.next_cell;
        }
        Ok(total)
    }

    /// Memory footprint of the buffer and chunk table in bytes.
    #[must_use]
    pub fn memory_footprint(&self) -> usize {
        self.buffer.capacity() + self.chunk_offsets.capacity() * size_of::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::DimensionDescription;
    use crate::geometry::{Geometry, GeometryDescription};
    use crate::image::ImageCell;
    use crate::reader::BasisDescription;
    use std::sync::Arc;

    fn image_with_npix(npix: &[u64]) -> MdImage {
        let desc = GeometryDescription::new(vec![DimensionDescription::new(
            "q1",
            0.0,
            1.0,
            npix.len(),
        )]);
        let geometry = Arc::new(Geometry::from_description(&desc).unwrap());
        let cells = npix.iter().map(|&n| ImageCell::new(0.0, 0.0, n)).collect();
        MdImage::from_parts(geometry, cells).unwrap()
    }

    /// Reader that serves `record_size`-byte records counting up per cell.
    struct StubReader {
        npix: Vec<u64>,
        record_size: usize,
    }

    impl PixelReader for StubReader {
        fn n_pix(&self) -> u64 {
            self.npix.iter().sum()
        }

        fn read_basis(&self) -> crate::Result<BasisDescription> {
            Ok(BasisDescription::default())
        }

        fn read_geometry_description(&self) -> crate::Result<GeometryDescription> {
            Ok(GeometryDescription::default())
        }

        fn read_point_description(&self) -> crate::Result<PixelRecordDescription> {
            Ok(PixelRecordDescription::for_dimension_ids(&["q1"]))
        }

        fn read_image_data(&self, _image: &mut MdImage) -> crate::Result<()> {
            Ok(())
        }

        fn read_pix_subset(
            &self,
            _image: &MdImage,
            selected_cells: &[usize],
            starting_cell: usize,
            buf: &mut [u8],
        ) -> crate::Result<SubsetRead> {
            let capacity = buf.len() / self.record_size;
            let mut written = 0usize;
            let mut cell = starting_cell;
            while cell < selected_cells.len() {
                let n = usize::try_from(self.npix[selected_cells[cell]]).unwrap();
                if written + n > capacity {
                    break;
                }
                for _ in 0..n {
                    let start = written * self.record_size;
                    buf[start..start + self.record_size].fill(selected_cells[cell] as u8);
                    written += 1;
                }
                cell += 1;
            }
            Ok(SubsetRead {
                next_cell: cell,
                pixels_read: written,
            })
        }
    }

    #[test]
    fn test_chunk_offsets_prefix_sum() {
        let image = image_with_npix(&[3, 0, 5, 2]);
        let mut store = PixelStore::new(PixelRecordDescription::for_dimension_ids(&["q1"]));
        store.init_chunk_offsets(&image).unwrap();
        assert_eq!(store.chunk_offsets(), &[0, 3, 3, 8]);
        assert_eq!(store.chunk_location(3), Some(8));
        assert_eq!(store.chunk_location(4), None);
    }

    #[test]
    fn test_record_size_from_columns() {
        let desc = PixelRecordDescription::for_dimension_ids(&["q1", "q2", "q3", "en"]);
        // 4 dims + signal + error as f32, 2 index columns as u32.
        assert_eq!(desc.record_size(), 6 * 4 + 2 * 4);
        assert!(desc.has_dimension_column("en"));
        assert!(!desc.has_dimension_column("u1"));
    }

    #[test]
    fn test_initialize_rejects_missing_column() {
        let image = image_with_npix(&[1, 1]);
        let mut store = PixelStore::new(PixelRecordDescription::for_dimension_ids(&["q2"]));
        let reader = StubReader {
            npix: vec![1, 1],
            record_size: store.record_size(),
        };
        let err = store.initialize(&image, Box::new(reader)).unwrap_err();
        assert!(matches!(err, Error::MissingColumn(id) if id == "q1"));
    }

    #[test]
    fn test_buffer_whole_records_grow_only() {
        let image = image_with_npix(&[10, 10, 10]);
        let mut store = PixelStore::new(PixelRecordDescription::for_dimension_ids(&["q1"]));
        let record = store.record_size();
        let reader = StubReader {
            npix: vec![10, 10, 10],
            record_size: record,
        };
        store.initialize(&image, Box::new(reader)).unwrap();

        let buf = store.alloc_buffer(7);
        assert_eq!(buf.len(), 7 * record);
        assert_eq!(buf.len() % record, 0);

        // Requests past the dataset total are capped.
        store.alloc_buffer(1_000_000);
        assert_eq!(store.buffer_size(), 30 * record);

        // Shrinking is a no-op: the larger buffer is retained.
        let buf = store.alloc_buffer(2);
        assert_eq!(buf.len(), 30 * record);

        assert!(store.buffer_size() / record <= (isize::MAX as usize) / record);
    }

    #[test]
    fn test_read_without_reader_fails() {
        let image = image_with_npix(&[1]);
        let store = PixelStore::new(PixelRecordDescription::for_dimension_ids(&["q1"]));
        let mut buf = vec![0u8; 64];
        let err = store
            .read_pix_subset(&image, &[0], 0, &mut buf)
            .unwrap_err();
        assert!(matches!(err, Error::NoReader));
    }

    #[test]
    fn test_for_each_subset_whole_cells() {
        let npix = vec![3u64, 0, 5, 2, 4];
        let image = image_with_npix(&npix);
        let mut store = PixelStore::new(PixelRecordDescription::for_dimension_ids(&["q1"]));
        let record = store.record_size();
        let reader = StubReader {
            npix: npix.clone(),
            record_size: record,
        };
        store.initialize(&image, Box::new(reader)).unwrap();

        // Buffer of 5 pixels forces multiple passes over the 14-pixel selection.
        let mut chunks = Vec::new();
        let total = store
            .for_each_subset(&image, &[0, 1, 2, 3, 4], 5, |bytes| {
                assert_eq!(bytes.len() % record, 0);
                chunks.push(bytes.len() / record);
            })
            .unwrap();
        assert_eq!(total, 14);
        assert_eq!(chunks.iter().sum::<usize>(), 14);
        // Cells are never split across buffers: 3+0, then 5, then 2, then 4.
        assert_eq!(chunks, vec![3, 5, 2, 4]);
    }

    #[test]
    fn test_for_each_subset_oversized_cell_errors() {
        let npix = vec![9u64];
        let image = image_with_npix(&npix);
        let mut store = PixelStore::new(PixelRecordDescription::for_dimension_ids(&["q1"]));
        let reader = StubReader {
            npix,
            record_size: store.record_size(),
        };
        store.initialize(&image, Box::new(reader)).unwrap();
        let err = store
            .for_each_subset(&image, &[0], 4, |_| {})
            .unwrap_err();
        assert!(matches!(err, Error::ReadError(_)));
    }

    #[test]
    fn test_buffer_policy_explicit_budget() {
        let policy = BufferPolicy::default().with_memory_budget_bytes(1024);
        assert_eq!(policy.resolve_budget_bytes().unwrap(), 1024);
        assert_eq!(policy.resolve_budget_pixels(32).unwrap(), 32);
    }

    #[test]
    fn test_buffer_policy_rejects_bad_fraction() {
        let policy = BufferPolicy::default().with_memory_fraction(0.0);
        assert!(matches!(
            policy.resolve_budget_bytes(),
            Err(Error::Config(_))
        ));
    }
}
