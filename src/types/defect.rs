//! Defect classes and per-class probability vectors

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of defect classes the classifier distinguishes.
pub const NUM_CLASSES: usize = 6;

/// Surface defect class, in the order the CNN was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefectClass {
    #[serde(rename = "crazing")]
    Crazing,
    #[serde(rename = "inclusion")]
    Inclusion,
    #[serde(rename = "patches")]
    Patches,
    #[serde(rename = "pitted_surface")]
    PittedSurface,
    #[serde(rename = "rolled-in_scale")]
    RolledInScale,
    #[serde(rename = "scratches")]
    Scratches,
}

impl DefectClass {
    /// All classes in model output order.
    pub const ALL: [DefectClass; NUM_CLASSES] = [
        DefectClass::Crazing,
        DefectClass::Inclusion,
        DefectClass::Patches,
        DefectClass::PittedSurface,
        DefectClass::RolledInScale,
        DefectClass::Scratches,
    ];

    /// Wire label of the class
    pub fn label(&self) -> &'static str {
        match self {
            DefectClass::Crazing => "crazing",
            DefectClass::Inclusion => "inclusion",
            DefectClass::Patches => "patches",
            DefectClass::PittedSurface => "pitted_surface",
            DefectClass::RolledInScale => "rolled-in_scale",
            DefectClass::Scratches => "scratches",
        }
    }

    /// Position of the class in the model output vector
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.label() == label)
    }

    /// All labels in model output order.
    pub fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.label()).collect()
    }
}

impl fmt::Display for DefectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Probability for each of the six defect classes.
///
/// Serialized as a JSON object keyed by class label, in class order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassProbabilities([f64; NUM_CLASSES]);

impl ClassProbabilities {
    pub fn new(values: [f64; NUM_CLASSES]) -> Self {
        Self(values)
    }

    /// Build a probability vector from raw model outputs.
    ///
    /// Rows that already form a distribution are kept as-is; anything else is
    /// treated as logits and passed through a softmax.
    pub fn from_model_output(row: &[f32]) -> Option<Self> {
        if row.len() != NUM_CLASSES || row.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let mut values = [0.0f64; NUM_CLASSES];
        for (dst, &src) in values.iter_mut().zip(row) {
            *dst = src as f64;
        }

        let sum: f64 = values.iter().sum();
        let is_distribution = values.iter().all(|&v| v >= 0.0) && (sum - 1.0).abs() <= 1e-3;
        if is_distribution {
            return Some(Self(values));
        }

        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        for v in values.iter_mut() {
            *v = (*v - max).exp();
        }
        let total: f64 = values.iter().sum();
        for v in values.iter_mut() {
            *v /= total;
        }
        Some(Self(values))
    }

    pub fn values(&self) -> &[f64; NUM_CLASSES] {
        &self.0
    }

    pub fn get(&self, class: DefectClass) -> f64 {
        self.0[class.index()]
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Class with the highest probability; ties go to the lowest class index.
    pub fn argmax(&self) -> DefectClass {
        let mut best = 0;
        for (i, &p) in self.0.iter().enumerate().skip(1) {
            if p > self.0[best] {
                best = i;
            }
        }
        DefectClass::ALL[best]
    }

    pub fn max(&self) -> f64 {
        self.0[self.argmax().index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (DefectClass, f64)> + '_ {
        DefectClass::ALL.iter().copied().zip(self.0.iter().copied())
    }
}

impl Serialize for ClassProbabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(NUM_CLASSES))?;
        for (class, prob) in self.iter() {
            map.serialize_entry(class.label(), &prob)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ClassProbabilities {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ProbVisitor;

        impl<'de> Visitor<'de> for ProbVisitor {
            type Value = ClassProbabilities;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from defect class label to probability")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut values = [None; NUM_CLASSES];
                while let Some((label, prob)) = access.next_entry::<String, f64>()? {
                    let class = DefectClass::from_label(&label).ok_or_else(|| {
                        de::Error::custom(format!("unknown defect class `{}`", label))
                    })?;
                    values[class.index()] = Some(prob);
                }

                let mut out = [0.0; NUM_CLASSES];
                for (i, v) in values.iter().enumerate() {
                    out[i] = v.ok_or_else(|| de::Error::missing_field(DefectClass::ALL[i].label()))?;
                }
                Ok(ClassProbabilities(out))
            }
        }

        deserializer.deserialize_map(ProbVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_order_matches_training() {
        assert_eq!(
            DefectClass::labels(),
            vec![
                "crazing",
                "inclusion",
                "patches",
                "pitted_surface",
                "rolled-in_scale",
                "scratches"
            ]
        );
        assert_eq!(DefectClass::RolledInScale.index(), 4);
        assert_eq!(DefectClass::from_label("scratches"), Some(DefectClass::Scratches));
        assert_eq!(DefectClass::from_label("dent"), None);
    }

    #[test]
    fn test_argmax_ties_pick_lowest_index() {
        let probs = ClassProbabilities::new([0.1, 0.35, 0.05, 0.35, 0.1, 0.05]);
        assert_eq!(probs.argmax(), DefectClass::Inclusion);
        assert!((probs.max() - 0.35).abs() < 1e-12);
    }

    #[test]
    fn test_from_model_output_keeps_distribution() {
        let row = [0.5f32, 0.1, 0.1, 0.1, 0.1, 0.1];
        let probs = ClassProbabilities::from_model_output(&row).unwrap();
        assert!((probs.get(DefectClass::Crazing) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_from_model_output_applies_softmax_to_logits() {
        let row = [2.0f32, -1.0, 0.5, 0.0, 3.0, 1.0];
        let probs = ClassProbabilities::from_model_output(&row).unwrap();
        assert!((probs.sum() - 1.0).abs() < 1e-9);
        assert_eq!(probs.argmax(), DefectClass::RolledInScale);
        assert!(ClassProbabilities::from_model_output(&[0.5, 0.5]).is_none());
    }

    #[test]
    fn test_serializes_as_labelled_map() {
        let probs = ClassProbabilities::new([0.5, 0.1, 0.1, 0.1, 0.1, 0.1]);
        let json = serde_json::to_value(probs).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), NUM_CLASSES);
        assert_eq!(obj["rolled-in_scale"], 0.1);

        let back: ClassProbabilities = serde_json::from_value(json).unwrap();
        assert_eq!(back, probs);
    }

    #[test]
    fn test_deserialize_rejects_missing_label() {
        let json = serde_json::json!({ "crazing": 1.0 });
        assert!(serde_json::from_value::<ClassProbabilities>(json).is_err());
    }
}
