//! Export EGA study and dataset metadata as schema.org `Dataset` JSON-LD for
//! harvesting by researchdata.se.

pub mod app;
pub mod config;
pub mod domain;
pub mod ega;
pub mod error;
pub mod organisation;
pub mod output;
pub mod render;
pub mod store;
pub mod transform;
