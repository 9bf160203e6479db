//! Image acquisition.
//!
//! This module provides source image loading from disk or HTTP, rotation,
//! and saving the acquired image for inspection.

pub mod source;

pub use source::{load_source_image, save_source_image};
