//! `atelier-measurements` — garment measurement sheets.
//!
//! A measurement is a named map of body dimensions (in centimeters) taken for
//! one client and one garment type. Each (client, garment) pair keeps a
//! history; the record flagged `is_last` is the one a new order starts from.

pub mod measurement;

pub use measurement::{Measurement, NewMeasurement, STANDARD_DIMENSIONS};
