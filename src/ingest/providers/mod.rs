// src/ingest/providers/mod.rs
pub mod phivolcs;
pub mod usgs;

pub use phivolcs::PhivolcsProvider;
pub use usgs::{BoundingBox, UsgsProvider};
