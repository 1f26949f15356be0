//! End-to-end pipeline: populate an image, build the chunk table, stream a
//! selection through a buffer smaller than its pixel volume.

use mdgrid_io::record::{coordinate_of, encode_record};
use mdgrid_io::{FlatReader, MemoryReader};
use mdgrid_core::{
    BufferPolicy, DimensionDescription, GeometryDescription, MdImage, PixelReader,
    PixelRecordDescription, PixelStore,
};
use std::collections::HashMap;
use std::io::Write;

fn geometry_2d() -> GeometryDescription {
    GeometryDescription::new(vec![
        DimensionDescription::new("q1", 0.0, 4.0, 4),
        DimensionDescription::new("q2", 0.0, 3.0, 3),
    ])
}

/// Pixel counts per flat cell index, chosen to straddle buffer boundaries.
const NPIX: [u64; 12] = [3, 0, 5, 2, 1, 0, 0, 4, 2, 6, 1, 3];

fn build_memory_reader() -> MemoryReader {
    let points = PixelRecordDescription::for_dimension_ids(&["q1", "q2"]);
    let record = points.record_size();
    let mut reader = MemoryReader::new(geometry_2d(), points.clone());
    for (cell, &n) in NPIX.iter().enumerate() {
        let mut bytes = Vec::with_capacity(n as usize * record);
        for p in 0..n {
            bytes.extend_from_slice(&encode_record(
                &points,
                &[cell as f32, p as f32],
                1.0,
                0.1,
                &[],
            ));
        }
        reader
            .push_cell(f64::from(u32::try_from(n).unwrap()), 0.0, &bytes)
            .unwrap();
    }
    reader
}

#[test]
fn streams_selection_through_small_buffer_exactly_once() {
    let reader = build_memory_reader();
    let points = reader.read_point_description().unwrap();
    let record = points.record_size();

    let mut image = MdImage::new(&reader.read_geometry_description().unwrap()).unwrap();
    reader.read_image_data(&mut image).unwrap();

    let mut store = PixelStore::new(points.clone());
    store.initialize(&image, Box::new(reader)).unwrap();
    store.init_chunk_offsets(&image).unwrap();

    // Chunk table is the prefix sum of the per-cell counts.
    let mut expected_offset = 0u64;
    for (cell, &n) in NPIX.iter().enumerate() {
        assert_eq!(store.chunk_location(cell), Some(expected_offset));
        expected_offset += n;
    }

    let selection: Vec<usize> = vec![2, 3, 7, 9, 11];
    let selected_pixels: u64 = selection.iter().map(|&c| NPIX[c]).sum();

    // A 6-pixel buffer cannot hold the 20-pixel selection in one pass.
    let mut seen: HashMap<u32, u64> = HashMap::new();
    let mut passes = 0usize;
    let total = store
        .for_each_subset(&image, &selection, 6, |bytes| {
            passes += 1;
            assert_eq!(bytes.len() % record, 0);
            for rec in bytes.chunks_exact(record) {
                let cell = coordinate_of(&points, rec, 0) as u32;
                *seen.entry(cell).or_default() += 1;
            }
        })
        .unwrap();

    assert_eq!(total as u64, selected_pixels);
    assert!(passes > 1);
    for &cell in &selection {
        assert_eq!(
            seen.get(&u32::try_from(cell).unwrap()).copied().unwrap_or(0),
            NPIX[cell],
            "cell {cell}"
        );
    }
}

#[test]
fn flat_reader_drives_the_same_pipeline() {
    let points = PixelRecordDescription::for_dimension_ids(&["q1", "q2"]);
    let record = points.record_size();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    for (cell, &n) in NPIX.iter().enumerate() {
        for p in 0..n {
            file.write_all(&encode_record(&points, &[cell as f32, p as f32], 2.0, 0.2, &[]))
                .unwrap();
        }
    }
    file.flush().unwrap();

    let reader = FlatReader::open(
        file.path(),
        geometry_2d(),
        points.clone(),
        NPIX.to_vec(),
    )
    .unwrap();
    assert_eq!(reader.n_pix(), NPIX.iter().sum::<u64>());
    assert_eq!(reader.read_basis().unwrap().ids, vec!["q1", "q2"]);

    let mut image = MdImage::new(&reader.read_geometry_description().unwrap()).unwrap();
    reader.read_image_data(&mut image).unwrap();
    let cells = image.cells().unwrap();
    assert_eq!(cells[9].npix, 6);
    assert!((cells[9].signal - 12.0).abs() < 1e-9);

    let mut store = PixelStore::new(points.clone());
    store.initialize(&image, Box::new(reader)).unwrap();
    store.init_chunk_offsets(&image).unwrap();

    // Size the streaming request from an explicit memory budget.
    let budget = BufferPolicy::default().with_memory_budget_bytes(8 * record);
    let request = budget.resolve_budget_pixels(record).unwrap();
    assert_eq!(request, 8);

    let selection: Vec<usize> = (0..NPIX.len()).collect();
    let mut streamed = 0u64;
    let total = store
        .for_each_subset(&image, &selection, request, |bytes| {
            streamed += (bytes.len() / record) as u64;
        })
        .unwrap();
    assert_eq!(total as u64, NPIX.iter().sum::<u64>());
    assert_eq!(streamed, NPIX.iter().sum::<u64>());
}
