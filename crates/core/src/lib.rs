//! Maison Core - Shared types library.
//!
//! This crate provides common types used across all Maison components:
//! - `client` - Storefront client services (session, cart, favorites)
//! - the UI and admin layers built on top of them
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. This keeps
//! it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
