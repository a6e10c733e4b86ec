//! `atelier-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod garment;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use garment::GarmentType;
pub use id::{ClientId, MeasurementId, OrderId, TenantId};
