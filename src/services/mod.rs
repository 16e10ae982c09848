pub mod accuracy;
pub mod clustering;
pub mod geocode_cache;
pub mod geocoding;
pub mod image;
pub mod job_store;
pub mod orchestrator;
pub mod predictor;
pub mod providers;
pub mod sweeper;
