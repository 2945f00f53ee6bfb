//! Feature extraction for FIM model inference.
//!
//! Every model was trained on the same 22-column table: five demographic
//! columns followed by the admission motor items and then the admission
//! cognitive items, both in clinical order. Column names and order must match
//! the training data exactly; a mismatch changes predictions silently.

use crate::models::id::ModelId;
use crate::types::request::PredictionRequest;

/// Number of columns in the model input schema.
pub const FEATURE_COUNT: usize = 22;

/// Column names in model input order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    // Demographics (5)
    "gender",
    "age",
    "bmi",
    "care_level",
    "days_from_onset",
    // Motor items (12)
    "食事",
    "整容",
    "清拭",
    "更衣上半身",
    "更衣下半身",
    "トイレ動作",
    "排尿管理",
    "排便管理",
    "ベッド移乗",
    "トイレ移乗",
    "浴槽移乗",
    "歩行",
    // Cognitive items (5)
    "理解",
    "表出",
    "社会的交流",
    "問題解決",
    "記憶",
];

/// One request converted into the model input schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f32; FEATURE_COUNT],
}

impl FeatureVector {
    /// Values in schema order.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Value of a named column.
    pub fn get(&self, name: &str) -> Option<f32> {
        FEATURE_NAMES
            .iter()
            .position(|&n| n == name)
            .map(|i| self.values[i])
    }

    /// `(name, value)` pairs in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }
}

/// Feature extractor that transforms prediction requests into model input features.
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Build the feature vector for a request.
    ///
    /// Never fails: items absent from the request maps become 0.0 and item
    /// values outside 0..=7 are passed through unchanged.
    pub fn build(&self, request: &PredictionRequest) -> FeatureVector {
        let mut features = Vec::with_capacity(FEATURE_COUNT);

        features.push(f32::from(request.gender.code()));
        features.push(request.age as f32);
        features.push(request.bmi as f32);
        features.push(f32::from(request.care_level.code()));
        features.push(request.days_from_onset as f32);

        for item in ModelId::MOTOR_ITEMS {
            features.push(item_value(&request.motion_values, item));
        }
        for item in ModelId::COGNITIVE_ITEMS {
            features.push(item_value(&request.cognitive_values, item));
        }

        let mut values = [0.0; FEATURE_COUNT];
        values.copy_from_slice(&features);
        FeatureVector { values }
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in model input order.
    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn item_value(values: &std::collections::HashMap<String, f64>, item: ModelId) -> f32 {
    item.item_label()
        .and_then(|label| values.get(label))
        .copied()
        .unwrap_or(0.0) as f32
}
