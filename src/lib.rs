//! # fibersight
//!
//! Command-line front end for the fibersight pipeline. It plots metrics from
//! a telemetry source as JSON lines of [`GraphData`] snapshots, or streams
//! fiber trace batches.
//!
//! ## Usage
//!
//! ```bash
//! # List what the source offers
//! fibersight --endpoint http://localhost:8080 --list-keys
//!
//! # Stream one panel's series
//! fibersight -m requests -m latency --max-entries 50
//!
//! # Stream live fibers under fiber 12
//! fibersight --fibers --active-only --root 12
//! ```
//!
//! Settings come from defaults, then an optional TOML file (`--config`),
//! then `FIBERSIGHT_*` environment variables, then flags.
//!
//! [`GraphData`]: fibersight_core::GraphData

pub mod cli;
pub mod settings;
pub mod telemetry;

pub use cli::Cli;
