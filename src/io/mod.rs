//! I/O module
//!
//! Handles ledger parsing, world loading and position output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, output serialization)
//! - `sync_reader` - Synchronous ledger reader with iterator interface
//! - `async_reader` - Asynchronous ledger reader with batch reading interface
//! - `world` - JSON world file describing pools, borrowers and engine config

pub mod async_reader;
pub mod csv_format;
pub mod sync_reader;
pub mod world;

pub use async_reader::AsyncReader;
pub use csv_format::{convert_csv_record, write_positions_csv, CsvRecord};
pub use sync_reader::SyncReader;
pub use world::{LoadedWorld, WorldFile};
