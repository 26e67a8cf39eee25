//! HTTP API handlers for vmix-mx

pub mod health;
pub mod mix;

pub use health::health_routes;
pub use mix::mix_routes;
