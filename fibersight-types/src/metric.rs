//! Metric keys and point-in-time metric states.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::Timestamp;

/// The kind of metric a key describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Summary,
    Frequency,
}

impl MetricType {
    /// Whether a single state of this type yields one plotted line per
    /// bucket, quantile or occurrence rather than a single scalar.
    pub fn is_multi_series(&self) -> bool {
        matches!(
            self,
            MetricType::Histogram | MetricType::Summary | MetricType::Frequency
        )
    }
}

/// Identity and description of one metric offered by the telemetry source.
///
/// `id` is the stable identity used for subscription matching; the
/// remaining fields are descriptive only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MetricKey {
    pub id: String,
    pub name: String,
    /// Ordered `(key, value)` label pairs.
    #[cfg_attr(feature = "serde", serde(default))]
    pub labels: Vec<(String, String)>,
    pub metric_type: MetricType,
}

impl MetricKey {
    /// Create a key without labels.
    pub fn new(id: impl Into<String>, name: impl Into<String>, metric_type: MetricType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            labels: Vec::new(),
            metric_type,
        }
    }

    /// Append a label, keeping insertion order.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    /// Look up a label value by key.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// One histogram bucket: the number of samples at or below `boundary`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bucket {
    pub boundary: f64,
    pub count: u64,
}

/// One summary quantile and its estimate, if the source has one yet.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quantile {
    pub quantile: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: Option<f64>,
}

/// The value carried by a [`MetricState`], shaped by its metric type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "camelCase"))]
pub enum MetricValue {
    Counter {
        count: f64,
    },
    Gauge {
        value: f64,
    },
    Histogram {
        buckets: Vec<Bucket>,
        count: u64,
        min: f64,
        max: f64,
        sum: f64,
    },
    Summary {
        quantiles: Vec<Quantile>,
        #[cfg_attr(feature = "serde", serde(default))]
        error: f64,
        count: u64,
        min: f64,
        max: f64,
        sum: f64,
    },
    Frequency {
        /// Occurrence counts keyed by occurrence name. Non-numeric entries
        /// in the source payload are dropped while decoding.
        #[cfg_attr(feature = "serde", serde(deserialize_with = "lenient::occurrences"))]
        occurrences: BTreeMap<String, u64>,
    },
}

impl MetricValue {
    /// The metric type this value belongs to.
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricValue::Counter { .. } => MetricType::Counter,
            MetricValue::Gauge { .. } => MetricType::Gauge,
            MetricValue::Histogram { .. } => MetricType::Histogram,
            MetricValue::Summary { .. } => MetricType::Summary,
            MetricValue::Frequency { .. } => MetricType::Frequency,
        }
    }

    /// The scalar reading for counters and gauges.
    pub fn scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Counter { count } => Some(*count),
            MetricValue::Gauge { value } => Some(*value),
            _ => None,
        }
    }
}

/// A point-in-time reading of one metric, produced fresh on every poll.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MetricState {
    /// Same as `key.id`.
    pub id: String,
    pub key: MetricKey,
    pub value: MetricValue,
    /// When the underlying metric last changed at the source.
    pub last_change: Timestamp,
    /// When this state was retrieved from the source.
    pub retrieved_at: Timestamp,
}

impl MetricState {
    /// Create a state whose change and retrieval times are both `at`.
    pub fn new(key: MetricKey, value: MetricValue, at: Timestamp) -> Self {
        Self {
            id: key.id.clone(),
            key,
            value,
            last_change: at,
            retrieved_at: at,
        }
    }

    /// Override the last-change time.
    pub fn changed_at(mut self, at: Timestamp) -> Self {
        self.last_change = at;
        self
    }
}

#[cfg(feature = "serde")]
mod lenient {
    use alloc::collections::BTreeMap;
    use alloc::string::String;

    use serde::de::IgnoredAny;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Occurrence {
        Count(u64),
        Fractional(f64),
        Other(IgnoredAny),
    }

    pub fn occurrences<'de, D>(deserializer: D) -> Result<BTreeMap<String, u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, Occurrence>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .filter_map(|(name, occurrence)| match occurrence {
                Occurrence::Count(count) => Some((name, count)),
                Occurrence::Fractional(count) if count.is_finite() && count >= 0.0 => {
                    Some((name, count as u64))
                }
                Occurrence::Fractional(_) | Occurrence::Other(_) => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn key_labels_keep_order() {
        let key = MetricKey::new("k1", "latency", MetricType::Histogram)
            .with_label("service", "api")
            .with_label("region", "eu");

        assert_eq!(key.labels[0].0, "service");
        assert_eq!(key.labels[1].0, "region");
        assert_eq!(key.label("region"), Some("eu"));
        assert_eq!(key.label("missing"), None);
    }

    #[test]
    fn state_id_follows_key() {
        let key = MetricKey::new("gauge-1", "queue_depth", MetricType::Gauge);
        let state = MetricState::new(key, MetricValue::Gauge { value: 3.0 }, Timestamp(10));
        assert_eq!(state.id, "gauge-1");
        assert_eq!(state.last_change, state.retrieved_at);

        let state = state.changed_at(Timestamp(5));
        assert_eq!(state.last_change, Timestamp(5));
        assert_eq!(state.retrieved_at, Timestamp(10));
    }

    #[test]
    fn value_reports_its_type() {
        let histogram = MetricValue::Histogram {
            buckets: vec![Bucket {
                boundary: 1.0,
                count: 2,
            }],
            count: 2,
            min: 0.1,
            max: 0.9,
            sum: 1.0,
        };
        assert_eq!(histogram.metric_type(), MetricType::Histogram);
        assert!(histogram.metric_type().is_multi_series());
        assert_eq!(histogram.scalar(), None);

        let counter = MetricValue::Counter { count: 7.0 };
        assert_eq!(counter.metric_type(), MetricType::Counter);
        assert!(!counter.metric_type().is_multi_series());
        assert_eq!(counter.scalar(), Some(7.0));
    }

    #[cfg(feature = "serde")]
    mod json {
        use super::*;

        #[test]
        fn decodes_gauge_state() {
            let json = r#"{
                "id": "g",
                "key": {"id": "g", "name": "depth", "labels": [["q", "orders"]], "metricType": "gauge"},
                "value": {"type": "gauge", "value": 42.0},
                "lastChange": 100,
                "retrievedAt": 200
            }"#;
            let state: MetricState = serde_json::from_str(json).unwrap();
            assert_eq!(state.key.metric_type, MetricType::Gauge);
            assert_eq!(state.key.label("q"), Some("orders"));
            assert_eq!(state.value, MetricValue::Gauge { value: 42.0 });
            assert_eq!(state.retrieved_at, Timestamp(200));
        }

        #[test]
        fn frequency_drops_non_numeric_occurrences() {
            let json = r#"{"type": "frequency", "occurrences": {"a": 3, "b": "oops", "c": null, "d": 2.0}}"#;
            let value: MetricValue = serde_json::from_str(json).unwrap();
            let MetricValue::Frequency { occurrences } = value else {
                panic!("expected frequency");
            };
            assert_eq!(occurrences.len(), 2);
            assert_eq!(occurrences.get("a"), Some(&3));
            assert_eq!(occurrences.get("d"), Some(&2));
        }

        #[test]
        fn summary_quantile_value_is_optional() {
            let json = r#"{"type": "summary", "quantiles": [{"quantile": 0.5}, {"quantile": 0.99, "value": 12.5}],
                           "count": 4, "min": 1.0, "max": 20.0, "sum": 30.0}"#;
            let value: MetricValue = serde_json::from_str(json).unwrap();
            let MetricValue::Summary { quantiles, error, .. } = value else {
                panic!("expected summary");
            };
            assert_eq!(quantiles[0].value, None);
            assert_eq!(quantiles[1].value, Some(12.5));
            assert_eq!(error, 0.0);
        }
    }
}
