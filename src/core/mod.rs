//! Bridge core: configuration, construction and lifecycle.
//!
//! Internal modules:
//! - [`config`]: [`BridgeConfig`] with sentinel helpers;
//! - [`builder`]: [`BridgeBuilder`] wiring contexts, hub and timers;
//! - [`bridge`]: the [`Bridge`] facade and its shutdown path.

mod bridge;
mod builder;
mod config;

pub use bridge::Bridge;
pub use builder::BridgeBuilder;
pub use config::BridgeConfig;
