//! Backend test support utilities
//!
//! Unified logging initialization and unique fixture data for unit and
//! integration tests.

pub mod logging;
pub mod unique_helpers;
