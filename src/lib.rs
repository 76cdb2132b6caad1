//! Kano wand to desktop input bridge.
//!
//! `domain` holds the pure gesture pipeline, `infrastructure` the BLE
//! session, OS input and logging plumbing.

pub mod domain;
pub mod infrastructure;
