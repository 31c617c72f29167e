//! # chauffeur-portal
//!
//! Session, auth and tenant-resolution core for the chauffeur-booking
//! portal, plus a small HTTP shell that serves tenant branding by host.
//!
//! Data-fetching screens (bookings, pricing, fees, vehicles) are callers of
//! [`api::ApiClient`]; everything they rely on for identity lives here:
//! persisted tokens (`storage`), the session container (`session`), the
//! refresh-aware request client (`api`), role-gated section guards
//! (`guard`), login/logout (`auth`) and domain-to-brand resolution
//! (`tenant`).

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod nav;
pub mod portal;
pub mod routes;
pub mod session;
pub mod storage;
pub mod tenant;

#[cfg(test)]
pub(crate) mod test_helpers;
