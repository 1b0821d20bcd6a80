//! Polygon.io REST provider (aggregates endpoints).

pub mod provider;
pub mod response;

pub use provider::PolygonProvider;
