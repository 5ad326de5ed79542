//! # fibersight-types
//!
//! Core data model for fibersight. These are the values a telemetry source
//! hands to the subscription pipeline: metric keys, point-in-time metric
//! states, and fiber trace information.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: the types work without any serialization framework
//! - **Optional serialization**: enable the `serde` feature for the JSON wire shape
//! - **Immutable values**: states and fiber infos are produced per poll and never mutated
//!
//! ## Features
//!
//! - `std` (default): Standard library support (wall-clock timestamps)
//! - `serde`: JSON serialization via serde
//!
//! ## Example
//!
//! ```rust
//! use fibersight_types::{MetricKey, MetricState, MetricType, MetricValue, Timestamp};
//!
//! let key = MetricKey::new("requests", "http_requests_total", MetricType::Counter)
//!     .with_label("method", "GET");
//!
//! let state = MetricState::new(
//!     key,
//!     MetricValue::Counter { count: 1500.0 },
//!     Timestamp::from_millis(1_700_000_000_000),
//! );
//!
//! assert_eq!(state.id, "requests");
//! assert_eq!(state.value.metric_type(), MetricType::Counter);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod fiber;
mod metric;
mod timestamp;

pub use fiber::*;
pub use metric::*;
pub use timestamp::*;
