pub mod auth;
pub mod cache;
pub mod forecast;
pub mod ingest;
pub mod model;
pub mod nominatim;
pub mod predictor;
pub mod rate_limit;
pub mod solcast;
pub mod trainer;
