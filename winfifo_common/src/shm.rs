//! Shared memory layout parameters.
//!
//! - `consts`: capacity limits, cache line size, header magic and the wait
//!   marker sentinel.

pub mod consts;
