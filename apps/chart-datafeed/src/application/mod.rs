//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with the widget and the host.

/// Port interfaces for the charting widget and the host.
pub mod ports;

/// Application services for history, subscriptions and polling.
pub mod services;
