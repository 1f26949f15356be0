//! mdgrid-io: Pixel-stream readers for mdgrid.
//!
//! Concrete implementations of the `mdgrid-core` `PixelReader` trait: an
//! in-memory reader for tests and embedders, and a memory-mapped reader
//! over flat record files via memmap2.
//!

mod error;
pub mod flat;
pub mod memory;
pub mod record;

pub use error::{Error, Result};
pub use flat::FlatReader;
pub use memory::MemoryReader;
