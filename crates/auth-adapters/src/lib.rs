//! # auth-adapters
//!
//! Implementations of the `IdentityProvider` port: a REST client for the
//! hosted identity toolkit, and an in-process provider for development and
//! tests.

pub mod rest;
pub mod static_provider;

pub use rest::RestIdentityProvider;
pub use static_provider::StaticIdentityProvider;
