//! Backend gateway for an identity-provider management console.
//!
//! The gateway exposes two endpoints to the browser:
//! - an allowlisted proxy onto the identity provider's REST API, which
//!   attaches a service-account bearer token the browser never sees;
//! - a favicon fetcher that looks up icons for OAuth2 application origins
//!   without letting callers reach cloud metadata services.

pub mod api;
pub mod config;
pub mod error;
pub mod favicon;
pub mod fetch;
pub mod proxy;
pub mod security;
pub mod token;
