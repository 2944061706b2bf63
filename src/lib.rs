pub mod config;
pub mod db;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod filename;
pub mod model;
pub mod pagination;
pub mod remote;
pub mod scrape;
