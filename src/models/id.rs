//! Model identifiers and the clinical item catalogue.
//!
//! The identifier set is closed: three aggregate models plus one model per
//! FIM item (12 motor, 5 cognitive).

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifier of one pre-trained model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelId {
    // Aggregates
    Total,
    MotionTotal,
    CognitiveTotal,
    // Motor items
    Eat,
    Groom,
    Bath,
    DressUp,
    DressLow,
    Toile,
    Bladder,
    Bowel,
    TransBed,
    TransToile,
    TransBath,
    Gait,
    // Cognitive items
    Comp,
    Express,
    Social,
    Problem,
    Memory,
}

impl ModelId {
    /// Every identifier, aggregates first, then motor and cognitive items in
    /// clinical order.
    pub const ALL: [ModelId; 20] = [
        ModelId::Total,
        ModelId::MotionTotal,
        ModelId::CognitiveTotal,
        ModelId::Eat,
        ModelId::Groom,
        ModelId::Bath,
        ModelId::DressUp,
        ModelId::DressLow,
        ModelId::Toile,
        ModelId::Bladder,
        ModelId::Bowel,
        ModelId::TransBed,
        ModelId::TransToile,
        ModelId::TransBath,
        ModelId::Gait,
        ModelId::Comp,
        ModelId::Express,
        ModelId::Social,
        ModelId::Problem,
        ModelId::Memory,
    ];

    /// Motor items in clinical order.
    pub const MOTOR_ITEMS: [ModelId; 12] = [
        ModelId::Eat,
        ModelId::Groom,
        ModelId::Bath,
        ModelId::DressUp,
        ModelId::DressLow,
        ModelId::Toile,
        ModelId::Bladder,
        ModelId::Bowel,
        ModelId::TransBed,
        ModelId::TransToile,
        ModelId::TransBath,
        ModelId::Gait,
    ];

    /// Cognitive items in clinical order.
    pub const COGNITIVE_ITEMS: [ModelId; 5] = [
        ModelId::Comp,
        ModelId::Express,
        ModelId::Social,
        ModelId::Problem,
        ModelId::Memory,
    ];

    /// Stable key used in configuration, logs and readiness reports.
    pub fn key(self) -> &'static str {
        match self {
            ModelId::Total => "total",
            ModelId::MotionTotal => "motion_total",
            ModelId::CognitiveTotal => "cognitive_total",
            ModelId::Eat => "eat",
            ModelId::Groom => "groom",
            ModelId::Bath => "bath",
            ModelId::DressUp => "dress_up",
            ModelId::DressLow => "dress_low",
            ModelId::Toile => "toile",
            ModelId::Bladder => "bladder",
            ModelId::Bowel => "bowel",
            ModelId::TransBed => "trans_bed",
            ModelId::TransToile => "trans_toile",
            ModelId::TransBath => "trans_bath",
            ModelId::Gait => "gait",
            ModelId::Comp => "comp",
            ModelId::Express => "express",
            ModelId::Social => "social",
            ModelId::Problem => "problem",
            ModelId::Memory => "memory",
        }
    }

    /// Clinical label of an item. Doubles as the request map key and the
    /// feature column name. `None` for aggregates.
    pub fn item_label(self) -> Option<&'static str> {
        let label = match self {
            ModelId::Total | ModelId::MotionTotal | ModelId::CognitiveTotal => return None,
            ModelId::Eat => "食事",
            ModelId::Groom => "整容",
            ModelId::Bath => "清拭",
            ModelId::DressUp => "更衣上半身",
            ModelId::DressLow => "更衣下半身",
            ModelId::Toile => "トイレ動作",
            ModelId::Bladder => "排尿管理",
            ModelId::Bowel => "排便管理",
            ModelId::TransBed => "ベッド移乗",
            ModelId::TransToile => "トイレ移乗",
            ModelId::TransBath => "浴槽移乗",
            ModelId::Gait => "歩行",
            ModelId::Comp => "理解",
            ModelId::Express => "表出",
            ModelId::Social => "社会的交流",
            ModelId::Problem => "問題解決",
            ModelId::Memory => "記憶",
        };
        Some(label)
    }

    pub fn is_aggregate(self) -> bool {
        matches!(
            self,
            ModelId::Total | ModelId::MotionTotal | ModelId::CognitiveTotal
        )
    }

    /// Default serialized model file name, e.g. `rf_model_gait_FIM.onnx`.
    pub fn default_file_name(self) -> String {
        let stem = match self {
            ModelId::Total => "all",
            ModelId::MotionTotal => "motor",
            ModelId::CognitiveTotal => "cog",
            other => other.key(),
        };
        format!("rf_model_{}_FIM.onnx", stem)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ModelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelId::ALL
            .iter()
            .copied()
            .find(|id| id.key() == s)
            .ok_or_else(|| format!("unknown model identifier: {}", s))
    }
}

impl Serialize for ModelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identifier_partition() {
        let aggregates = ModelId::ALL.iter().filter(|id| id.is_aggregate()).count();
        assert_eq!(aggregates, 3);
        assert_eq!(ModelId::MOTOR_ITEMS.len() + ModelId::COGNITIVE_ITEMS.len(), 17);

        let keys: HashSet<_> = ModelId::ALL.iter().map(|id| id.key()).collect();
        assert_eq!(keys.len(), 20);
    }

    #[test]
    fn test_key_round_trip() {
        for id in ModelId::ALL {
            assert_eq!(id.key().parse::<ModelId>().unwrap(), id);
        }
        assert!("stairs".parse::<ModelId>().is_err());
    }

    #[test]
    fn test_default_file_names() {
        assert_eq!(ModelId::Total.default_file_name(), "rf_model_all_FIM.onnx");
        assert_eq!(ModelId::MotionTotal.default_file_name(), "rf_model_motor_FIM.onnx");
        assert_eq!(ModelId::CognitiveTotal.default_file_name(), "rf_model_cog_FIM.onnx");
        assert_eq!(ModelId::DressUp.default_file_name(), "rf_model_dress_up_FIM.onnx");
    }

    #[test]
    fn test_item_labels() {
        assert!(ModelId::Total.item_label().is_none());
        assert_eq!(ModelId::Gait.item_label(), Some("歩行"));
    }
}
