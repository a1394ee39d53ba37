//! Engine-wide logging and fail-fast reporting.
#![forbid(unsafe_code)]

pub mod logging;
pub mod observability;
