use crate::{config::MatcherConfig, pipeline::FeatureVector, store::GestureStore};

#[derive(Clone, Debug, PartialEq)]
pub enum MatchOutcome {
    /// No feature vector this frame, so nothing to compare.
    NoDecision,
    NoMatch,
    Matched {
        label: String,
        distance: f64,
        confidence: f32,
    },
}

impl MatchOutcome {
    pub fn label(&self) -> Option<&str> {
        match self {
            MatchOutcome::Matched { label, .. } => Some(label),
            _ => None,
        }
    }
}

/// Nearest-enough lookup against the stored samples.
///
/// Labels are scanned in store order and the first sample closer than the
/// threshold wins, even if a later label holds a closer sample.
#[derive(Clone, Debug)]
pub struct Matcher {
    config: MatcherConfig,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    pub fn match_vector(&self, live: Option<&FeatureVector>, store: &GestureStore) -> MatchOutcome {
        let Some(live) = live else {
            return MatchOutcome::NoDecision;
        };
        let live = live.to_flat();

        for (label, samples) in store.all() {
            for sample in samples {
                let distance = padded_distance(&live, &sample.to_flat());
                if distance < self.config.threshold {
                    let confidence = (1.0 - distance / self.config.threshold) as f32;
                    return MatchOutcome::Matched {
                        label: label.to_string(),
                        distance,
                        confidence,
                    };
                }
            }
        }

        MatchOutcome::NoMatch
    }
}

/// Euclidean distance after padding the shorter vector with trailing zeros.
pub fn padded_distance(a: &[f64], b: &[f64]) -> f64 {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let d = a.get(i).copied().unwrap_or(0.0) - b.get(i).copied().unwrap_or(0.0);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(flat: &[f64]) -> FeatureVector {
        FeatureVector::from_flat(flat).unwrap()
    }

    fn matcher(threshold: f64) -> Matcher {
        Matcher::new(MatcherConfig { threshold })
    }

    #[test]
    fn pads_shorter_vector_with_zeros() {
        assert_eq!(padded_distance(&[3.0], &[3.0, 0.0, 0.0]), 0.0);
        assert_eq!(padded_distance(&[0.0], &[0.0, 3.0, 4.0]), 5.0);
    }

    #[test]
    fn empty_store_is_no_match() {
        let store = GestureStore::new("unused.json");
        assert_eq!(
            matcher(0.5).match_vector(Some(&vector(&[0.0])), &store),
            MatchOutcome::NoMatch
        );
    }

    #[test]
    fn missing_vector_is_no_decision() {
        let mut store = GestureStore::new("unused.json");
        store.put("fist", vec![vector(&[0.0])]);
        assert_eq!(matcher(0.5).match_vector(None, &store), MatchOutcome::NoDecision);
    }

    #[test]
    fn distance_must_be_strictly_below_threshold() {
        let mut store = GestureStore::new("unused.json");
        store.put("two", vec![vector(&[2.0, 0.5, 0.5])]);
        let live = vector(&[2.0, 0.5, 1.0]);
        assert_eq!(matcher(0.5).match_vector(Some(&live), &store), MatchOutcome::NoMatch);
        assert_eq!(
            matcher(0.6).match_vector(Some(&live), &store).label(),
            Some("two")
        );
    }

    #[test]
    fn first_label_in_store_order_wins() {
        let mut store = GestureStore::new("unused.json");
        store.put("fist", vec![vector(&[2.0, 0.3, 0.3])]);
        store.put("peace", vec![vector(&[2.0, 0.5, 0.5])]);
        let live = vector(&[2.0, 0.45, 0.45]);

        match matcher(0.5).match_vector(Some(&live), &store) {
            MatchOutcome::Matched { label, distance, .. } => {
                assert_eq!(label, "fist");
                assert!(distance > padded_distance(&live.to_flat(), &[2.0, 0.5, 0.5]));
            }
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn exact_match_has_full_confidence() {
        let mut store = GestureStore::new("unused.json");
        store.put("wave", vec![vector(&[2.0, 0.1, 0.2])]);
        match matcher(1e-9).match_vector(Some(&vector(&[2.0, 0.1, 0.2])), &store) {
            MatchOutcome::Matched {
                distance,
                confidence,
                ..
            } => {
                assert_eq!(distance, 0.0);
                assert_eq!(confidence, 1.0);
            }
            other => panic!("expected a match, got {other:?}"),
        }
    }
}
