//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use cosecha::prelude::*;
//! ```

pub use crate::encoding::{ColumnKind, ColumnSchema, FieldValue, IndicatorEncoder, RowValues};
pub use crate::error::{CosechaError, Result};
pub use crate::frame::{Column, Table};
pub use crate::fusion::{fuse, SourceTables};
pub use crate::metrics::{mae, mse, r_squared, rmse};
pub use crate::model_selection::train_test_split;
pub use crate::partition::{partition, Segment};
pub use crate::primitives::{Matrix, Vector};
pub use crate::registry::{normalize_key, ArtifactRegistry};
pub use crate::serving::{Prediction, PredictionRequest, PredictionService};
pub use crate::training::{
    run_training, train_segment, EvalMetrics, ModelArtifact, TrainingConfig, TrainingSummary,
};
pub use crate::tree::{DecisionTreeRegressor, RandomForestRegressor};
