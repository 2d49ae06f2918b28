//! Adapters Layer
//!
//! Pool builders and property sources plugged into the domain ports.

pub mod outbound;
