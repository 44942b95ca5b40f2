//! Port Interfaces
//!
//! Defines the interfaces (ports) at the edges of the adapter following
//! the Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `HostPort`: The host application's configuration, symbol and bar source
//!
//! ## Driver Ports (Inbound)
//!
//! - `ChartDatafeed`: The callback-shaped contract the charting widget calls

mod datafeed_port;
mod host_port;

pub use datafeed_port::{
    ChartDatafeed, ConfigurationCallback, ErrorCallback, HistoryCallback, SymbolResolvedCallback,
};
pub use host_port::{BarsRequest, HostError, HostPort};

#[cfg(test)]
pub use host_port::MockHostPort;
