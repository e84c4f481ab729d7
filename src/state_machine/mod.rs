//! State machines driving the application lifecycle.

pub mod session_sm;
