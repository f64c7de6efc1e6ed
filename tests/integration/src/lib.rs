//! Integration test utilities for the gateway client
//!
//! This crate provides a scripted in-process gateway for end-to-end
//! session tests, plus payload fixtures.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
