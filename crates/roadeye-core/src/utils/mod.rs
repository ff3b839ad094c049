//! Utility functions for display formatting.

pub mod format;

pub use format::{format_date, format_date_time, format_distance, format_relative_time, truncate_text};
