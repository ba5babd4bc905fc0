//! HTTP API handlers for churn-api

pub mod batch;
pub mod health;
pub mod predict;

pub use batch::batch_routes;
pub use health::health_routes;
pub use predict::predict_routes;
