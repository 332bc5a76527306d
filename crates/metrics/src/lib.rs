//! Metric definitions for the wisp transport core.
//!
//! Names are recorded through the `metrics` crate facade. Nothing is exported
//! unless the host installs a recorder; consumers only record when built with
//! their `metrics` feature.
//!
//! ```rust,ignore
//! use wisp_metrics::{counter, transport};
//!
//! counter!(transport::PACKAGES_SENT_TOTAL, "kind" => "direct").increment(1);
//! ```

mod definitions;

pub use definitions::*;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
