//! Result reporting
//!
//! - **text**: the console report printed after every run
//! - **json**: machine-readable report written with `--json <FILE>`

pub mod json;
pub mod text;
