//! Per-segment model training and the pipeline driver.
//!
//! Each admitted segment gets its own encoder, train/test split, and random
//! forest; the fitted model, its frozen column schema, and its held-out
//! metrics travel together as one [`ModelArtifact`]. Segments train in
//! parallel, and one segment failing never aborts the rest.

use crate::encoding::{ColumnSchema, IndicatorEncoder};
use crate::error::{CosechaError, Result};
use crate::fusion;
use crate::metrics::{mse, r_squared};
use crate::model_selection::train_test_split;
use crate::partition::Segment;
use crate::registry::ArtifactRegistry;
use crate::tree::RandomForestRegressor;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Hyperparameters for the segmented training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Trees per forest.
    pub n_estimators: usize,
    /// Maximum tree depth; `None` grows trees until pure.
    pub max_depth: Option<usize>,
    /// Fraction of each segment held out for evaluation.
    pub test_size: f32,
    /// Seed for splits and bootstrap sampling.
    pub random_state: u64,
    /// Minimum rows a segment needs to be trained at all.
    pub min_samples: usize,
    /// Columns expanded into indicators.
    pub categorical: Vec<String>,
    /// Columns excluded from the feature set.
    pub dropped: Vec<String>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            test_size: 0.2,
            random_state: 42,
            min_samples: 150,
            categorical: vec![fusion::SEASON.to_string()],
            dropped: vec![fusion::DISTRICT.to_string(), fusion::CROP.to_string()],
        }
    }
}

impl TrainingConfig {
    /// Sets the number of trees per forest.
    #[must_use]
    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    /// Sets the maximum tree depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Sets the held-out fraction.
    #[must_use]
    pub fn with_test_size(mut self, test_size: f32) -> Self {
        self.test_size = test_size;
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    /// Sets the minimum rows a segment needs to be trained.
    #[must_use]
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }
}

/// Held-out evaluation metrics for one segment's model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvalMetrics {
    /// Mean squared error on the held-out rows.
    pub mse: f32,
    /// R² on the held-out rows.
    pub r2: f32,
}

/// Everything the serving path needs for one segment.
///
/// The schema is the one the model was fitted against; the two are never
/// separated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// The segment key this model covers.
    pub segment: String,
    /// The frozen feature-column layout.
    pub schema: ColumnSchema,
    /// The fitted forest.
    pub model: RandomForestRegressor,
    /// Held-out evaluation metrics.
    pub metrics: EvalMetrics,
    /// Rows the segment had before encoding.
    pub n_samples: usize,
}

/// Per-segment outcome row of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentReport {
    /// Segment key.
    pub segment: String,
    /// Rows available for this segment.
    pub n_samples: usize,
    /// Held-out MSE, when training succeeded.
    pub mse: Option<f32>,
    /// Held-out R², when training succeeded.
    pub r2: Option<f32>,
    /// Where the artifact was persisted.
    pub artifact_path: Option<PathBuf>,
    /// Why training failed, when it did.
    pub error: Option<String>,
}

/// Summary of a whole training run, one report per admitted segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Per-segment outcomes, in segment-key order.
    pub reports: Vec<SegmentReport>,
}

impl TrainingSummary {
    /// Returns how many segments trained successfully.
    #[must_use]
    pub fn n_trained(&self) -> usize {
        self.reports.iter().filter(|r| r.error.is_none()).count()
    }

    /// Returns how many segments failed.
    #[must_use]
    pub fn n_failed(&self) -> usize {
        self.reports.len() - self.n_trained()
    }

    /// Serializes the summary as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CosechaError::Serialization(e.to_string()))
    }
}

/// Trains one segment end to end: encode, split, fit, evaluate.
///
/// # Errors
///
/// Returns [`CosechaError::Training`] naming the segment if encoding, the
/// split, or the fit fails.
pub fn train_segment(segment: &Segment, config: &TrainingConfig) -> Result<ModelArtifact> {
    let categorical: Vec<&str> = config.categorical.iter().map(String::as_str).collect();
    let dropped: Vec<&str> = config.dropped.iter().map(String::as_str).collect();

    let mut encoder = IndicatorEncoder::new(fusion::LABEL)
        .with_categorical(&categorical)
        .with_dropped(&dropped);
    let (x, y) = encoder
        .fit_transform(&segment.rows)
        .map_err(|e| CosechaError::training(&segment.key, e.to_string()))?;
    let schema = encoder
        .schema()
        .cloned()
        .ok_or_else(|| CosechaError::training(&segment.key, "Encoder produced no schema"))?;

    let (x_train, x_test, y_train, y_test) =
        train_test_split(&x, &y, config.test_size, Some(config.random_state))
            .map_err(|e| CosechaError::training(&segment.key, e.to_string()))?;

    let mut model = RandomForestRegressor::new(config.n_estimators)
        .with_random_state(config.random_state);
    if let Some(max_depth) = config.max_depth {
        model = model.with_max_depth(max_depth);
    }
    model
        .fit(&x_train, &y_train)
        .map_err(|e| CosechaError::training(&segment.key, e.to_string()))?;

    let predictions = model
        .predict(&x_test)
        .map_err(|e| CosechaError::training(&segment.key, e.to_string()))?;
    let metrics = EvalMetrics {
        mse: mse(&predictions, &y_test),
        r2: r_squared(&predictions, &y_test),
    };

    if let Some(importances) = model.feature_importances() {
        let mut ranked: Vec<(&str, f32)> = schema
            .names()
            .into_iter()
            .zip(importances)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        let top: Vec<String> = ranked
            .iter()
            .take(3)
            .map(|(name, weight)| format!("{name}={weight:.3}"))
            .collect();
        log::debug!("Top features for '{}': {}", segment.key, top.join(", "));
    }

    log::info!(
        "Trained segment '{}': {} samples, mse={:.4}, r2={:.4}",
        segment.key,
        segment.n_samples(),
        metrics.mse,
        metrics.r2
    );

    Ok(ModelArtifact {
        segment: segment.key.clone(),
        schema,
        model,
        metrics,
        n_samples: segment.n_samples(),
    })
}

/// Trains every admitted segment in parallel and persists each artifact.
///
/// A failing segment is reported and logged but does not stop the others.
/// Reports come back in segment-key order regardless of completion order.
///
/// # Errors
///
/// Returns an error only if no segment was given.
pub fn run_training(
    segments: &[Segment],
    config: &TrainingConfig,
    registry: &ArtifactRegistry,
) -> Result<TrainingSummary> {
    if segments.is_empty() {
        return Err("No segments to train".into());
    }

    let reports: Vec<SegmentReport> = segments
        .par_iter()
        .map(|segment| match train_segment(segment, config) {
            Ok(artifact) => {
                let (mse, r2) = (artifact.metrics.mse, artifact.metrics.r2);
                match registry.save(&artifact) {
                    Ok(path) => SegmentReport {
                        segment: segment.key.clone(),
                        n_samples: segment.n_samples(),
                        mse: Some(mse),
                        r2: Some(r2),
                        artifact_path: Some(path),
                        error: None,
                    },
                    Err(e) => {
                        log::error!("Failed to persist artifact for '{}': {e}", segment.key);
                        SegmentReport {
                            segment: segment.key.clone(),
                            n_samples: segment.n_samples(),
                            mse: Some(mse),
                            r2: Some(r2),
                            artifact_path: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            }
            Err(e) => {
                log::error!("{e}");
                SegmentReport {
                    segment: segment.key.clone(),
                    n_samples: segment.n_samples(),
                    mse: None,
                    r2: None,
                    artifact_path: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    log::info!(
        "Training run finished: {} trained, {} failed",
        reports.iter().filter(|r| r.error.is_none()).count(),
        reports.iter().filter(|r| r.error.is_some()).count()
    );

    Ok(TrainingSummary { reports })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Column, Table};

    fn synthetic_segment(key: &str, n: usize) -> Segment {
        // Yield tracks Annual rainfall with a season offset, so the forest
        // has real structure to learn.
        let seasons = ["Kharif", "Rabi"];
        let mut season = Vec::with_capacity(n);
        let mut annual = Vec::with_capacity(n);
        let mut yields = Vec::with_capacity(n);
        for i in 0..n {
            let s = seasons[i % 2];
            let rain = 600.0 + (i as f32 % 40.0) * 25.0;
            season.push(Some(s.to_string()));
            annual.push(rain);
            yields.push(rain / 100.0 + if s == "Kharif" { 2.0 } else { 0.0 });
        }
        let rows = Table::new(vec![
            ("Season".to_string(), Column::Text(season)),
            ("Annual".to_string(), Column::Numeric(annual)),
            ("Yield".to_string(), Column::Numeric(yields)),
        ])
        .expect("valid table");
        Segment {
            key: key.to_string(),
            rows,
        }
    }

    fn fast_config() -> TrainingConfig {
        TrainingConfig::default()
            .with_n_estimators(10)
            .with_max_depth(6)
            .with_min_samples(20)
    }

    #[test]
    fn train_segment_produces_a_complete_artifact() {
        let segment = synthetic_segment("Rice", 200);
        let artifact = train_segment(&segment, &fast_config()).expect("train");
        assert_eq!(artifact.segment, "Rice");
        assert_eq!(artifact.n_samples, 200);
        assert_eq!(
            artifact.schema.names(),
            vec!["Season_Kharif", "Season_Rabi", "Annual"]
        );
        // Yield is a clean function of the features, so the fit is strong.
        assert!(artifact.metrics.r2 > 0.8);
    }

    #[test]
    fn training_is_reproducible() {
        let segment = synthetic_segment("Wheat", 100);
        let config = fast_config();
        let a = train_segment(&segment, &config).expect("train");
        let b = train_segment(&segment, &config).expect("train");
        assert_eq!(a.metrics.mse, b.metrics.mse);
        assert_eq!(a.metrics.r2, b.metrics.r2);
    }

    #[test]
    fn training_error_names_the_segment() {
        // Undeclared text column makes encoding fail.
        let rows = Table::new(vec![
            (
                "Notes".to_string(),
                Column::Text(vec![Some("a".to_string()), Some("b".to_string())]),
            ),
            ("Yield".to_string(), Column::Numeric(vec![1.0, 2.0])),
        ])
        .expect("valid table");
        let segment = Segment {
            key: "Barley".to_string(),
            rows,
        };
        let mut config = fast_config();
        config.categorical.clear();
        let err = train_segment(&segment, &config).unwrap_err();
        assert!(err.to_string().contains("Barley"));
    }

    #[test]
    fn run_training_isolates_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = ArtifactRegistry::new(dir.path()).expect("registry");

        let bad_rows = Table::new(vec![
            ("Annual".to_string(), Column::Numeric(vec![f32::NAN; 30])),
            ("Yield".to_string(), Column::Numeric(vec![1.0; 30])),
        ])
        .expect("valid table");
        let segments = vec![
            synthetic_segment("Maize", 100),
            Segment {
                key: "Millet".to_string(),
                rows: bad_rows,
            },
        ];

        let summary = run_training(&segments, &fast_config(), &registry).expect("run");
        assert_eq!(summary.n_trained(), 1);
        assert_eq!(summary.n_failed(), 1);
        let maize = &summary.reports[0];
        assert_eq!(maize.segment, "Maize");
        assert!(maize.artifact_path.as_ref().expect("persisted").exists());
        let millet = &summary.reports[1];
        assert!(millet.error.is_some());
        assert!(millet.artifact_path.is_none());
    }

    #[test]
    fn summary_serializes_to_json() {
        let summary = TrainingSummary {
            reports: vec![SegmentReport {
                segment: "Rice".to_string(),
                n_samples: 200,
                mse: Some(0.5),
                r2: Some(0.9),
                artifact_path: Some(PathBuf::from("models/Rice.bin")),
                error: None,
            }],
        };
        let json = summary.to_json().expect("json");
        assert!(json.contains("\"Rice\""));
        assert!(json.contains("\"r2\": 0.9"));
    }
}
