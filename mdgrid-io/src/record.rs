//! Byte-level helpers for serialized pixel records.
//!
//! A record is little-endian: one `f32` per dimension column, `f32` signal,
//! `f32` error, then one `u32` per index column.

use mdgrid_core::PixelRecordDescription;

/// Encodes one pixel record.
///
/// Missing trailing coordinates or indices are zero-filled; extras are
/// ignored, so callers can share fixtures across descriptions.
#[must_use]
pub fn encode_record(
    points: &PixelRecordDescription,
    coords: &[f32],
    signal: f32,
    error: f32,
    indices: &[u32],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(points.record_size());
    for i in 0..points.dim_columns.len() {
        out.extend_from_slice(&coords.get(i).copied().unwrap_or(0.0).to_le_bytes());
    }
    let mut signals = [signal, error].into_iter();
    for _ in 0..points.signal_columns.len() {
        out.extend_from_slice(&signals.next().unwrap_or(0.0).to_le_bytes());
    }
    for i in 0..points.index_columns.len() {
        out.extend_from_slice(&indices.get(i).copied().unwrap_or(0).to_le_bytes());
    }
    out
}

fn f32_at(bytes: &[u8], offset: usize) -> f32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    f32::from_le_bytes(raw)
}

/// Signal column of one serialized record.
#[must_use]
pub fn signal_of(points: &PixelRecordDescription, record: &[u8]) -> f32 {
    f32_at(record, points.dim_columns.len() * 4)
}

/// Error column of one serialized record.
#[must_use]
pub fn error_of(points: &PixelRecordDescription, record: &[u8]) -> f32 {
    f32_at(record, points.dim_columns.len() * 4 + 4)
}

/// Coordinate column `dim` of one serialized record.
#[must_use]
pub fn coordinate_of(points: &PixelRecordDescription, record: &[u8], dim: usize) -> f32 {
    debug_assert!(dim < points.dim_columns.len());
    f32_at(record, dim * 4)
}
