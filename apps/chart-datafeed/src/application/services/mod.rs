//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `Datafeed`: Implements the widget contract on top of the host port
//! - `HistoryLoader`: Fetch-and-normalize pass shared by requests and polls
//! - `PulseUpdater`: Interval poller over the subscription registry

mod datafeed;
mod error;
mod history;
mod pulse;

pub use datafeed::Datafeed;
pub use error::DatafeedError;
pub use history::HistoryLoader;
pub use pulse::{FetchOutcome, InFlightCounter, InFlightGuard, PulseConfig, PulseUpdater, Tick};
