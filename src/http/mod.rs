//! HTTP transport layer for the inspection server
//!
//! Provides the route handlers mounted by [`crate::build_app`].

pub mod handlers;
