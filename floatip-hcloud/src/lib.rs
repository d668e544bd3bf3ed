//! Hetzner Cloud client for the floatip controller.
//!
//! Only the handful of endpoints the reconciler needs are covered: server and
//! floating IP listings, and the floating IP assign action.

mod client;
mod schema;

pub use client::{HcloudClient, DEFAULT_ENDPOINT};
