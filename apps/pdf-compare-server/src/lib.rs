//! PDF Compare Server Library
//!
//! Compares two PDF documents page by page and describes how their text
//! changed. The binary in main.rs serves this over HTTP.
//!
//! # Modules
//!
//! - `raster`: PDF pages to bitmaps and text (MuPDF)
//! - `diff`: Pixel difference engine
//! - `compare`: Page pairing and comparison orchestration
//! - `narrative`: Text change narrative
//! - `session`: Comparison sessions
//! - `export`: PDF report export
//! - `routes`: HTTP API

pub mod compare;
pub mod config;
pub mod diff;
pub mod error;
pub mod export;
pub mod narrative;
pub mod raster;
pub mod routes;
pub mod session;
pub mod state;
