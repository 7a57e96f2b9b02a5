//! A multidimensional chunked array store with groups, dimensions and attributes, in the Zarr V2 on-disk layout.
//!
//! A [`Dataset`](dataset::Dataset) is a hierarchy of [groups](group::Group) holding
//! [arrays](array::MDArray), [dimensions](dimension::Dimension) and [attributes](attribute::Attribute).
//! Arrays are chunked, and chunks are encoded by a pipeline of filters and a compressor.
//! Arrays reference shared dimensions, so growing a dimension grows every array along it.
//!
//! ## Getting Started
//! - [`dataset::Dataset`] opens or creates a dataset in a [store](storage::store).
//! - [`group::Group`] creates and opens the nodes of the hierarchy.
//! - [`array::MDArray`] reads and writes strided windows of an array, possibly through a transposed or sliced view.
//!
//! ## Example
//! ```rust
//! # use std::sync::Arc;
//! use mdstore::array::{ArrayCreateOptions, ExtendedDataType, NumericDataType};
//! use mdstore::dataset::{Dataset, OpenOptions};
//! use mdstore::dimension::DimensionCreateOptions;
//! use mdstore::storage::store::MemoryStore;
//!
//! let dataset = Dataset::create(Arc::new(MemoryStore::new()), &OpenOptions::default())?;
//! let root = dataset.root_group();
//! let y = root.create_dimension("y", 2, &DimensionCreateOptions::default())?;
//! let x = root.create_dimension("x", 3, &DimensionCreateOptions::default())?;
//! let array = root.create_md_array(
//!     "temperature",
//!     &[y, x],
//!     ExtendedDataType::numeric(NumericDataType::Float32),
//!     &ArrayCreateOptions::default(),
//! )?;
//! array.write_elements(&[0, 0], &[2, 3], None, &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])?;
//!
//! let transposed = array.transpose(&[1, 0])?;
//! assert_eq!(
//!     transposed.read_elements::<f32>(&[0, 0], &[3, 2], None)?,
//!     vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - Compressors: `blosc`, `bz2`, `gzip` (zlib and gzip), `zstd`.
//!  - Filters: `crc32c`.
//!
//! ## Licence
//! `mdstore` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod array;
pub mod attribute;
pub mod config;
pub mod dataset;
pub mod dimension;
pub mod error;
pub mod group;
pub mod metadata;
pub mod node;
pub mod plugin;
pub mod storage;
