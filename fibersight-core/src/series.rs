//! Bounded time series and the entries derived from metric states.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use fibersight_types::{MetricState, MetricValue, Timestamp};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Default capacity of a time series.
pub const DEFAULT_MAX_ENTRIES: usize = 20;

/// Identity of one plotted line.
///
/// Scalar metrics map to a single series keyed by the metric id alone.
/// Histograms, summaries and frequencies produce one series per bucket,
/// quantile or occurrence, distinguished by `sub_key`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesKey {
    pub metric_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_key: Option<String>,
}

impl TimeSeriesKey {
    pub fn new(metric_id: impl Into<String>) -> Self {
        Self {
            metric_id: metric_id.into(),
            sub_key: None,
        }
    }

    pub fn with_sub_key(metric_id: impl Into<String>, sub_key: impl Into<String>) -> Self {
        Self {
            metric_id: metric_id.into(),
            sub_key: Some(sub_key.into()),
        }
    }
}

impl fmt::Display for TimeSeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_key {
            Some(sub) => write!(f, "{}/{}", self.metric_id, sub),
            None => write!(f, "{}", self.metric_id),
        }
    }
}

/// One sample on one line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesEntry {
    pub series: TimeSeriesKey,
    pub when: Timestamp,
    pub value: f64,
}

impl TimeSeriesEntry {
    pub fn new(series: TimeSeriesKey, when: Timestamp, value: f64) -> Self {
        Self {
            series,
            when,
            value,
        }
    }
}

/// A capacity-bounded, time-ordered sequence of samples for one line.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    key: TimeSeriesKey,
    entries: VecDeque<TimeSeriesEntry>,
    max_entries: usize,
}

impl TimeSeries {
    /// Create an empty series. A capacity of zero is treated as one.
    pub fn new(key: TimeSeriesKey, max_entries: usize) -> Self {
        Self {
            key,
            entries: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn key(&self) -> &TimeSeriesKey {
        &self.key
    }

    /// Insert an entry in timestamp order, evicting the oldest entries
    /// while over capacity.
    ///
    /// Entries for a different series are ignored. Equal timestamps keep
    /// insertion order. Returns whether the entry was accepted.
    pub fn record(&mut self, entry: TimeSeriesEntry) -> bool {
        if entry.series != self.key {
            return false;
        }

        let at = self.entries.partition_point(|e| e.when <= entry.when);
        self.entries.insert(at, entry);

        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
        true
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> &VecDeque<TimeSeriesEntry> {
        &self.entries
    }

    pub fn last(&self) -> Option<&TimeSeriesEntry> {
        self.entries.back()
    }

    /// Change the capacity. Entries beyond a smaller capacity are evicted
    /// on the next `record`.
    pub fn update_max_entries(&mut self, max_entries: usize) {
        self.max_entries = max_entries.max(1);
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Snapshot of every series a panel tracks, oldest entry first per line.
///
/// Serializes as `{"series": [{"key": {..}, "entries": [..]}, ..]}` so that
/// keys keep their structure instead of being flattened into strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphData {
    pub series: BTreeMap<TimeSeriesKey, Vec<TimeSeriesEntry>>,
}

impl GraphData {
    pub fn get(&self, key: &TimeSeriesKey) -> Option<&[TimeSeriesEntry]> {
        self.series.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl Serialize for GraphData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Line<'a> {
            key: &'a TimeSeriesKey,
            entries: &'a [TimeSeriesEntry],
        }

        let lines: Vec<Line<'_>> = self
            .series
            .iter()
            .map(|(key, entries)| Line { key, entries })
            .collect();

        let mut state = serializer.serialize_struct("GraphData", 1)?;
        state.serialize_field("series", &lines)?;
        state.end()
    }
}

impl<'a> FromIterator<&'a TimeSeries> for GraphData {
    fn from_iter<I: IntoIterator<Item = &'a TimeSeries>>(iter: I) -> Self {
        let series = iter
            .into_iter()
            .map(|ts| (ts.key.clone(), ts.entries.iter().cloned().collect()))
            .collect();
        GraphData { series }
    }
}

/// Derive the samples one metric state contributes to its plotted lines.
///
/// Counters and gauges yield one entry. Histograms yield one per bucket
/// (`le=<boundary>`, bucket count), summaries one per quantile with an
/// estimate (`q=<quantile>`), frequencies one per occurrence name. All
/// entries are stamped with the state's retrieval time.
pub fn entries_from_state(state: &MetricState) -> Vec<TimeSeriesEntry> {
    let when = state.retrieved_at;
    let id = state.id.as_str();

    match &state.value {
        MetricValue::Counter { count } => {
            vec![TimeSeriesEntry::new(TimeSeriesKey::new(id), when, *count)]
        }
        MetricValue::Gauge { value } => {
            vec![TimeSeriesEntry::new(TimeSeriesKey::new(id), when, *value)]
        }
        MetricValue::Histogram { buckets, .. } => buckets
            .iter()
            .map(|bucket| {
                TimeSeriesEntry::new(
                    TimeSeriesKey::with_sub_key(id, format!("le={}", bucket.boundary)),
                    when,
                    bucket.count as f64,
                )
            })
            .collect(),
        MetricValue::Summary { quantiles, .. } => quantiles
            .iter()
            .filter_map(|q| {
                q.value.map(|value| {
                    TimeSeriesEntry::new(
                        TimeSeriesKey::with_sub_key(id, format!("q={}", q.quantile)),
                        when,
                        value,
                    )
                })
            })
            .collect(),
        MetricValue::Frequency { occurrences } => occurrences
            .iter()
            .map(|(name, count)| {
                TimeSeriesEntry::new(
                    TimeSeriesKey::with_sub_key(id, name.clone()),
                    when,
                    *count as f64,
                )
            })
            .collect(),
    }
}
