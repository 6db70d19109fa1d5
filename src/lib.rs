//! Cosecha: segmented crop-yield regression in pure Rust.
//!
//! Cosecha fuses climate, soil, and yield tables into one training frame,
//! partitions it by crop, trains an independent random forest per segment,
//! and serves predictions back out of a filesystem artifact registry. Each
//! persisted artifact carries the exact feature-column schema its model was
//! fitted against, so serving-time rows always line up with training-time
//! columns.
//!
//! # Quick Start
//!
//! ```
//! use cosecha::prelude::*;
//!
//! // A tiny single-crop table: yield tracks annual rainfall.
//! let rows = Table::new(vec![
//!     ("Annual".to_string(), Column::Numeric(vec![600.0, 900.0, 1200.0, 1500.0])),
//!     ("Yield".to_string(), Column::Numeric(vec![6.0, 9.0, 12.0, 15.0])),
//! ]).unwrap();
//! let segment = Segment { key: "Rice".to_string(), rows };
//!
//! let config = TrainingConfig::default()
//!     .with_n_estimators(10)
//!     .with_min_samples(4);
//! let artifact = train_segment(&segment, &config).unwrap();
//! assert_eq!(artifact.segment, "Rice");
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: Core Vector and Matrix types
//! - [`frame`]: Mixed-type tables with key joins
//! - [`fusion`]: Five-table dataset fusion
//! - [`partition`]: Per-crop segment partitioning
//! - [`encoding`]: Indicator encoding and frozen column schemas
//! - [`tree`]: CART regression trees and random forests
//! - [`metrics`]: Regression evaluation metrics
//! - [`model_selection`]: Train/test splitting
//! - [`training`]: Per-segment training and the pipeline driver
//! - [`registry`]: Filesystem artifact registry
//! - [`serving`]: Prediction service

pub mod encoding;
pub mod error;
pub mod frame;
pub mod fusion;
pub mod metrics;
pub mod model_selection;
pub mod partition;
pub mod prelude;
pub mod primitives;
pub mod registry;
pub mod serving;
pub mod training;
pub mod tree;

pub use error::{CosechaError, Result};
