//! # CSV Storage Module
//!
//! Text backend for the collection manager. Each collection lives in its own
//! CSV file in the data directory and is rewritten whole on every change.
//!
//! ## Features
//!
//! - `library.csv` and `wishlist.csv` with a header row
//! - RFC 4180 quoting, so titles and notes may contain commas, quotes and newlines
//! - Columns located by header name; files from older versions still load
//! - Atomic writes through `<file>.tmp`, fsync and rename
//! - Malformed rows abort the load with the file and line number

pub mod codec;
pub mod connection;
pub mod csv_backend;
pub mod repository;

pub use codec::CsvRecord;
pub use connection::CsvConnection;
pub use csv_backend::CsvBackend;
pub use repository::CsvRepository;
