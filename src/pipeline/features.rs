use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _, ser::SerializeSeq};

use super::concavity::Valley;
use crate::config::FeatureConfig;

/// Hand descriptor: finger estimate plus paired, normalized depth and angle
/// per accepted valley. Flat form is `[fingers, depths.., angles..]`.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector {
    finger_count: u32,
    depths: Vec<f64>,
    angles: Vec<f64>,
}

impl FeatureVector {
    /// Returns `None` when depths and angles differ in length.
    pub fn new(finger_count: u32, depths: Vec<f64>, angles: Vec<f64>) -> Option<Self> {
        (depths.len() == angles.len()).then_some(Self {
            finger_count,
            depths,
            angles,
        })
    }

    pub fn finger_count(&self) -> u32 {
        self.finger_count
    }

    pub fn depths(&self) -> &[f64] {
        &self.depths
    }

    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    pub fn flat_len(&self) -> usize {
        1 + self.depths.len() + self.angles.len()
    }

    pub fn to_flat(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.flat_len());
        flat.push(self.finger_count as f64);
        flat.extend_from_slice(&self.depths);
        flat.extend_from_slice(&self.angles);
        flat
    }

    pub fn from_flat(flat: &[f64]) -> Option<Self> {
        let (&head, rest) = flat.split_first()?;
        if !head.is_finite() || head < 0.0 || head.fract() != 0.0 || head > u32::MAX as f64 {
            return None;
        }
        if rest.len() % 2 != 0 || rest.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let (depths, angles) = rest.split_at(rest.len() / 2);
        Self::new(head as u32, depths.to_vec(), angles.to_vec())
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.flat_len()))?;
        seq.serialize_element(&self.finger_count)?;
        for value in self.depths.iter().chain(&self.angles) {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for FeatureVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let flat = Vec::<f64>::deserialize(deserializer)?;
        Self::from_flat(&flat)
            .ok_or_else(|| D::Error::custom(format!("malformed sample vector {flat:?}")))
    }
}

#[derive(Clone, Debug)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// No valleys means no visible finger gaps and is reported as zero
    /// fingers, not one.
    pub fn build(&self, valleys: &[Valley]) -> FeatureVector {
        let finger_count = if valleys.is_empty() {
            0
        } else {
            valleys.len() as u32 + 1
        };

        FeatureVector {
            finger_count,
            depths: valleys
                .iter()
                .map(|v| round2(v.depth / self.config.depth_scale))
                .collect(),
            angles: valleys.iter().map(|v| round2(v.angle / FRAC_PI_2)).collect(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
