//! Prediction service over the artifact registry.
//!
//! A request names its segment and supplies raw field values under their
//! source-table column names. The service fetches the segment's artifact,
//! rebuilds a feature row against the artifact's own frozen schema, and
//! returns the forest's prediction rounded to two decimals.

use crate::encoding::{FieldValue, RowValues};
use crate::error::{CosechaError, Result};
use crate::fusion;
use crate::registry::ArtifactRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One inference request.
///
/// Wire names match the source-table columns; every numeric field is
/// optional and defaults to 0.0 when absent.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionRequest {
    /// Segment key selecting the model.
    #[serde(rename = "Crop")]
    pub crop: String,
    #[serde(rename = "Season")]
    pub season: String,
    #[serde(rename = "Dist_Name")]
    pub district: String,
    #[serde(rename = "Year", default)]
    pub year: f32,
    #[serde(rename = "PreMonsoon_MAM_max", default)]
    pub pre_monsoon_mam_max: f32,
    #[serde(rename = "Monsoon_JJAS_max", default)]
    pub monsoon_jjas_max: f32,
    #[serde(rename = "PostMonsoon_OND_max", default)]
    pub post_monsoon_ond_max: f32,
    #[serde(rename = "Winter_JF_max", default)]
    pub winter_jf_max: f32,
    #[serde(rename = "Annual_MaxTemp", default)]
    pub annual_max_temp: f32,
    #[serde(rename = "PreMonsoon_MAM_min", default)]
    pub pre_monsoon_mam_min: f32,
    #[serde(rename = "Monsoon_JJAS_min", default)]
    pub monsoon_jjas_min: f32,
    #[serde(rename = "PostMonsoon_OND_min", default)]
    pub post_monsoon_ond_min: f32,
    #[serde(rename = "Winter_JF_min", default)]
    pub winter_jf_min: f32,
    #[serde(rename = "Annual_minTemp", default)]
    pub annual_min_temp: f32,
    #[serde(rename = "JJAS", default)]
    pub jjas: f32,
    #[serde(rename = "OND", default)]
    pub ond: f32,
    #[serde(rename = "JF", default)]
    pub jf: f32,
    #[serde(rename = "MAM", default)]
    pub mam: f32,
    #[serde(rename = "Annual", default)]
    pub annual: f32,
    #[serde(rename = "Soil_Acidic", default)]
    pub soil_acidic: f32,
    #[serde(rename = "Soil_Alkaline", default)]
    pub soil_alkaline: f32,
    #[serde(rename = "Soil_B", default)]
    pub soil_b: f32,
    #[serde(rename = "Soil_Ca", default)]
    pub soil_ca: f32,
    #[serde(rename = "Soil_Cu", default)]
    pub soil_cu: f32,
    #[serde(
        rename = "Soil_EC_conditions",
        alias = "Soil_EC* conditions (%)",
        default
    )]
    pub soil_ec_conditions: f32,
    #[serde(rename = "Soil_Fe", default)]
    pub soil_fe: f32,
    #[serde(rename = "Soil_K", default)]
    pub soil_k: f32,
    #[serde(rename = "Soil_Mg", default)]
    pub soil_mg: f32,
    #[serde(rename = "Soil_Mn", default)]
    pub soil_mn: f32,
    #[serde(rename = "Soil_Neutral", default)]
    pub soil_neutral: f32,
    #[serde(rename = "Soil_OC", default)]
    pub soil_oc: f32,
    #[serde(rename = "Soil_P", default)]
    pub soil_p: f32,
    #[serde(rename = "Soil_S", default)]
    pub soil_s: f32,
    #[serde(rename = "Soil_Zn", default)]
    pub soil_zn: f32,
    #[serde(rename = "Soil_samples", default)]
    pub soil_samples: f32,
}

impl PredictionRequest {
    /// Flattens the request into named field values keyed by the column
    /// names the training tables used. `Dist_Name` maps back to the
    /// canonical "Dist Name" and the soil EC field to its starred CSV
    /// header.
    #[must_use]
    pub fn to_row_values(&self) -> RowValues {
        let mut fields = RowValues::new();
        fields.insert(
            fusion::CROP.to_string(),
            FieldValue::Text(self.crop.clone()),
        );
        fields.insert(
            fusion::SEASON.to_string(),
            FieldValue::Text(self.season.clone()),
        );
        fields.insert(
            fusion::DISTRICT.to_string(),
            FieldValue::Text(self.district.clone()),
        );

        let numeric = [
            (fusion::YEAR, self.year),
            ("PreMonsoon_MAM_max", self.pre_monsoon_mam_max),
            ("Monsoon_JJAS_max", self.monsoon_jjas_max),
            ("PostMonsoon_OND_max", self.post_monsoon_ond_max),
            ("Winter_JF_max", self.winter_jf_max),
            ("Annual_MaxTemp", self.annual_max_temp),
            ("PreMonsoon_MAM_min", self.pre_monsoon_mam_min),
            ("Monsoon_JJAS_min", self.monsoon_jjas_min),
            ("PostMonsoon_OND_min", self.post_monsoon_ond_min),
            ("Winter_JF_min", self.winter_jf_min),
            ("Annual_minTemp", self.annual_min_temp),
            ("JJAS", self.jjas),
            ("OND", self.ond),
            ("JF", self.jf),
            ("MAM", self.mam),
            ("Annual", self.annual),
            ("Soil_Acidic", self.soil_acidic),
            ("Soil_Alkaline", self.soil_alkaline),
            ("Soil_B", self.soil_b),
            ("Soil_Ca", self.soil_ca),
            ("Soil_Cu", self.soil_cu),
            ("Soil_EC* conditions (%)", self.soil_ec_conditions),
            ("Soil_Fe", self.soil_fe),
            ("Soil_K", self.soil_k),
            ("Soil_Mg", self.soil_mg),
            ("Soil_Mn", self.soil_mn),
            ("Soil_Neutral", self.soil_neutral),
            ("Soil_OC", self.soil_oc),
            ("Soil_P", self.soil_p),
            ("Soil_S", self.soil_s),
            ("Soil_Zn", self.soil_zn),
            ("Soil_samples", self.soil_samples),
        ];
        for (name, value) in numeric {
            fields.insert(name.to_string(), FieldValue::Number(value));
        }
        fields
    }
}

/// A served prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// The segment the request named.
    pub crop: String,
    /// Predicted yield, rounded to two decimals.
    pub predicted_yield: f32,
}

/// Serves predictions from persisted per-segment artifacts.
#[derive(Debug)]
pub struct PredictionService {
    registry: Arc<ArtifactRegistry>,
}

impl PredictionService {
    /// Creates a service over a shared registry.
    #[must_use]
    pub fn new(registry: Arc<ArtifactRegistry>) -> Self {
        Self { registry }
    }

    /// Predicts the yield for one request.
    ///
    /// The request's crop selects the artifact; the artifact's schema
    /// dictates the feature row layout. Unknown seasons or missing fields
    /// encode as zeros rather than failing.
    ///
    /// # Errors
    ///
    /// Returns [`CosechaError::ArtifactNotFound`] if no model exists for
    /// the crop, or [`CosechaError::Inference`] if encoding or the model
    /// itself fails.
    pub fn predict(&self, request: &PredictionRequest) -> Result<Prediction> {
        let artifact = self.registry.get(&request.crop)?;

        let fields = request.to_row_values();
        let row = artifact
            .schema
            .encode_row(&fields)
            .map_err(CosechaError::inference)?;
        let predictions = artifact
            .model
            .predict(&row)
            .map_err(CosechaError::inference)?;
        let raw = predictions.as_slice().first().copied().ok_or_else(|| {
            CosechaError::inference("Model returned no prediction")
        })?;

        log::debug!("Served prediction for '{}': {raw:.4}", request.crop);
        Ok(Prediction {
            crop: request.crop.clone(),
            predicted_yield: round2(raw),
        })
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::Segment;
    use crate::training::{train_segment, TrainingConfig};
    use crate::frame::{Column, Table};

    fn request_json(crop: &str, season: &str) -> String {
        format!(
            r#"{{
                "Crop": "{crop}",
                "Season": "{season}",
                "Dist_Name": "Cuttack",
                "Year": 2023,
                "Annual": 1724.4,
                "Soil_EC* conditions (%)": 0.8
            }}"#
        )
    }

    fn trained_registry(dir: &std::path::Path) -> Arc<ArtifactRegistry> {
        let n = 60;
        let mut season = Vec::with_capacity(n);
        let mut annual = Vec::with_capacity(n);
        let mut yields = Vec::with_capacity(n);
        for i in 0..n {
            let s = if i % 2 == 0 { "Kharif" } else { "Rabi" };
            let rain = 600.0 + (i as f32) * 20.0;
            season.push(Some(s.to_string()));
            annual.push(rain);
            yields.push(rain / 100.0);
        }
        let rows = Table::new(vec![
            ("Season".to_string(), Column::Text(season)),
            ("Annual".to_string(), Column::Numeric(annual)),
            ("Yield".to_string(), Column::Numeric(yields)),
        ])
        .expect("valid table");
        let segment = Segment {
            key: "Rice".to_string(),
            rows,
        };
        let config = TrainingConfig::default()
            .with_n_estimators(10)
            .with_min_samples(10);
        let artifact = train_segment(&segment, &config).expect("train");

        let registry = Arc::new(ArtifactRegistry::new(dir).expect("registry"));
        registry.save(&artifact).expect("save");
        registry
    }

    #[test]
    fn request_deserializes_with_defaults_and_alias() {
        let request: PredictionRequest =
            serde_json::from_str(&request_json("Rice", "Kharif")).expect("parse");
        assert_eq!(request.crop, "Rice");
        assert_eq!(request.annual, 1724.4);
        assert_eq!(request.soil_ec_conditions, 0.8);
        // Unlisted numeric fields fall back to zero.
        assert_eq!(request.soil_zn, 0.0);
    }

    #[test]
    fn row_values_use_canonical_column_names() {
        let request: PredictionRequest =
            serde_json::from_str(&request_json("Rice", "Kharif")).expect("parse");
        let fields = request.to_row_values();
        assert!(matches!(
            fields.get("Dist Name"),
            Some(FieldValue::Text(d)) if d == "Cuttack"
        ));
        assert!(fields.contains_key("Soil_EC* conditions (%)"));
        assert!(!fields.contains_key("Dist_Name"));
    }

    #[test]
    fn predictions_come_back_rounded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = PredictionService::new(trained_registry(dir.path()));

        let request: PredictionRequest =
            serde_json::from_str(&request_json("Rice", "Kharif")).expect("parse");
        let prediction = service.predict(&request).expect("predict");
        assert_eq!(prediction.crop, "Rice");
        let scaled = prediction.predicted_yield * 100.0;
        assert!((scaled - scaled.round()).abs() < 1e-3);
        // Annual rainfall 1724.4 sits at the top of the training range.
        assert!(prediction.predicted_yield > 10.0);
    }

    #[test]
    fn unknown_crop_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = PredictionService::new(trained_registry(dir.path()));

        let request: PredictionRequest =
            serde_json::from_str(&request_json("Quinoa", "Kharif")).expect("parse");
        let err = service.predict(&request).unwrap_err();
        assert!(matches!(err, CosechaError::ArtifactNotFound { .. }));
    }

    #[test]
    fn unseen_season_still_predicts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = PredictionService::new(trained_registry(dir.path()));

        let request: PredictionRequest =
            serde_json::from_str(&request_json("Rice", "Summer")).expect("parse");
        // Season indicators all encode to zero; the model still runs.
        assert!(service.predict(&request).is_ok());
    }

    #[test]
    fn round2_truncates_to_cents() {
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(2.999), 3.0);
        assert_eq!(round2(-1.005), -1.0);
    }
}
