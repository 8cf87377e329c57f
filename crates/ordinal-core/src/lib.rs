//! ordinal-core: configuration shared by the ordinal crates.

pub mod config;
pub mod duration;

pub use config::{
    ConfigError, HealthSection, OrdinalConfig, ReadinessSection, RetrySection, StoreSection,
    TimingSection,
};
pub use duration::parse_duration;
