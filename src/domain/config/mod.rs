//! Configuration domain module
//!
//! Plain, validated value objects handed to the monitoring core. Loading them from the
//! environment is the job of `crate::config`.

pub mod alert_config;
pub mod monitor_config;
pub mod volume_filter_config;

pub use alert_config::{AlertConfigError, RsiAlertConfig};
pub use monitor_config::MonitorConfig;
pub use volume_filter_config::VolumeFilterConfig;
