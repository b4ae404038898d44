//! storeprobe library
//!
//! Synthetic guest-checkout monitoring: the checkout flow definition, the run
//! driver with its thresholds, the Prometheus exporter, the scripted storefront
//! used for rehearsals and the command line front end.

pub mod app_settings;
pub mod checkout;
pub mod cli;
pub mod harness;
pub mod metrics;
pub mod storefront;

pub use app_settings::Config;
pub use checkout::guest_checkout;
pub use harness::{RunDriver, RunSummary, Thresholds};
