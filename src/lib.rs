pub mod artifact;
pub mod cleaner;
pub mod config;
pub mod constants;
pub mod dates;
pub mod db;
pub mod error;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod summary;
pub mod types;
pub mod verify;
