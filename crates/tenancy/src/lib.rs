//! `atelier-tenancy` — tenant records and tenant resolution rules.
//!
//! A tenant is one workshop. Every client, measurement and order belongs to
//! exactly one tenant, and the data layer refuses to operate until a tenant
//! is resolved. This crate holds the pure parts: the record itself and the
//! host-name rule that derives the subdomain to resolve.

pub mod subdomain;
pub mod tenant;

pub use subdomain::subdomain_from_host;
pub use tenant::{Tenant, TenantContext, TenantSettings};
