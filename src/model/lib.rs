//! Core data model for the Omnio object storage engine

#[macro_use]
extern crate tracing;

pub mod catalog;
pub mod hash;
pub mod mime;
pub mod object;
pub mod schema;
pub mod text;
