//! # TD Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Board and catalog fixtures
//! - Recording collaborator doubles
//! - Gesture drivers for placement and relocation
//! - Determinism harness
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod strategies;

/// Re-export proptest for convenience.
pub use proptest;
