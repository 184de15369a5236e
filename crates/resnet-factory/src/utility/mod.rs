//! # Misc Utilities

pub mod record;
