//! mdgrid-core: Dense N-D rebinned image with a sparse pixel-event stream.
//!
//! This crate provides the indexing layer for instrument-acquired datasets
//! represented as a rebinned N-D grid (the image) paired with a sparse
//! stream of raw contributing events (the pixels), plus the axis-role
//! permutation layer that lets a consumer address the grid under any
//! relabeling of which dimension is X/Y/Z/T.
//!

pub mod dimension;
pub mod error;
pub mod geometry;
pub mod image;
pub mod matcher;
pub mod pixels;
pub mod proxy;
pub mod reader;

pub use dimension::{AxisRole, Dimension, DimensionDescription};
pub use error::{Error, Result};
pub use geometry::{Geometry, GeometryDescription, MAX_DIMS};
pub use image::{GridImage, ImageCell, ImagePoint, MdImage};
pub use matcher::DimensionMatcher;
pub use pixels::{BufferPolicy, PixelRecordDescription, PixelStore};
pub use proxy::{GeometryProxy, ImageProxy, PointMapper};
pub use reader::{BasisDescription, PixelReader, SubsetRead};
