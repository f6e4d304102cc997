pub mod app;
pub mod archive;
pub mod config;
pub mod csv_io;
pub mod dates;
pub mod error;
pub mod logging;
pub mod messages;
pub mod nav;
pub mod puzzle;
pub mod resolver;
pub mod service;
pub mod stats;
pub mod storage;
