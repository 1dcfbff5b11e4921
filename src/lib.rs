//! webpbin - WebP conversion from the command line
//!
//! This library crate exposes the configuration layer for integration testing.

pub mod config;
