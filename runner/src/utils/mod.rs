//! Utility functions for the application

pub mod faults;
pub mod retry;
