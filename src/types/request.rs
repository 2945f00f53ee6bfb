//! Prediction request data structures

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Patient gender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Numeric code used by the models and the history table (male 0, female 1)
    pub fn code(self) -> u8 {
        match self {
            Gender::Male => 0,
            Gender::Female => 1,
        }
    }

    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            Gender::Male
        } else {
            Gender::Female
        }
    }
}

/// Whether the patient had a certified care level on admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CareLevel {
    Yes,
    No,
}

impl CareLevel {
    /// Numeric code used by the models and the history table (no 0, yes 1)
    pub fn code(self) -> u8 {
        match self {
            CareLevel::No => 0,
            CareLevel::Yes => 1,
        }
    }

    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            CareLevel::No
        } else {
            CareLevel::Yes
        }
    }
}

/// Admission-time patient record submitted for prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    pub gender: Gender,

    /// Age in years
    pub age: f64,

    /// Body-mass index on admission
    pub bmi: f64,

    pub care_level: CareLevel,

    /// Days from onset to ward admission
    pub days_from_onset: f64,

    /// Admission motor item scores keyed by clinical label (食事, 整容, ...)
    #[serde(default)]
    pub motion_values: HashMap<String, f64>,

    /// Admission cognitive item scores keyed by clinical label (理解, 表出, ...)
    #[serde(default)]
    pub cognitive_values: HashMap<String, f64>,
}

impl PredictionRequest {
    /// Create a request with demographics only; item maps start empty.
    pub fn new(
        gender: Gender,
        age: f64,
        bmi: f64,
        care_level: CareLevel,
        days_from_onset: f64,
    ) -> Self {
        Self {
            gender,
            age,
            bmi,
            care_level,
            days_from_onset,
            motion_values: HashMap::new(),
            cognitive_values: HashMap::new(),
        }
    }

    pub fn with_motion(mut self, label: &str, score: f64) -> Self {
        self.motion_values.insert(label.to_string(), score);
        self
    }

    pub fn with_cognitive(mut self, label: &str, score: f64) -> Self {
        self.cognitive_values.insert(label.to_string(), score);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserialization() {
        let json = r#"{
            "gender": "female",
            "age": 72,
            "bmi": 19.8,
            "careLevel": "yes",
            "daysFromOnset": 21,
            "motionValues": {"食事": 5, "歩行": 2},
            "cognitiveValues": {"記憶": 4}
        }"#;

        let request: PredictionRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.gender, Gender::Female);
        assert_eq!(request.care_level, CareLevel::Yes);
        assert_eq!(request.days_from_onset, 21.0);
        assert_eq!(request.motion_values.get("歩行"), Some(&2.0));
        assert_eq!(request.cognitive_values.len(), 1);
    }

    #[test]
    fn test_missing_item_maps_default_to_empty() {
        let json = r#"{"gender":"male","age":65,"bmi":23.5,"careLevel":"no","daysFromOnset":30}"#;
        let request: PredictionRequest = serde_json::from_str(json).unwrap();
        assert!(request.motion_values.is_empty());
        assert!(request.cognitive_values.is_empty());
    }

    #[test]
    fn test_unknown_gender_rejected() {
        let json = r#"{"gender":"other","age":65,"bmi":23.5,"careLevel":"no","daysFromOnset":30}"#;
        assert!(serde_json::from_str::<PredictionRequest>(json).is_err());
    }

    #[test]
    fn test_categorical_codes() {
        assert_eq!(Gender::Male.code(), 0);
        assert_eq!(Gender::Female.code(), 1);
        assert_eq!(CareLevel::Yes.code(), 1);
        assert_eq!(Gender::from_code(1), Gender::Female);
        assert_eq!(CareLevel::from_code(0), CareLevel::No);
    }
}
