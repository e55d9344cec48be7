pub mod app;
pub mod backup;
pub mod clock;
pub mod config;
pub mod duration;
pub mod exchange;
pub mod ingest;
pub mod live;
pub mod market_data;
pub mod models;
pub mod scheduler;
pub mod storage;
