//! Core primitives shared across the record pipeline.
#![deny(missing_docs)]

pub mod pooling;
