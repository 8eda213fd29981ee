//! Domain models
//!
//! Record shapes live in the `shared` crate so the CLI and any other
//! front end see the same types. This module adds the pieces that only the
//! storage core needs: validation rules and the `Record` abstraction.

pub mod record;
pub mod validation;

pub use record::{sort_records, title_key, Record};
pub use validation::ValidationError;
