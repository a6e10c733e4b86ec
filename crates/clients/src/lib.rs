//! `atelier-clients` — the workshop's customer records.

pub mod client;

pub use client::{Client, NewClient};
