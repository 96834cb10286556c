//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the pipeline:
//! - Math types and operations
//! - Arena collections and handles
//! - Pipelined copy-on-write state
//! - Time measurement
//! - Phase profiling
//! - Logging utilities

pub mod math;
pub mod collections;
pub mod cycler;
pub mod time;
pub mod profiling;
pub mod logging;
