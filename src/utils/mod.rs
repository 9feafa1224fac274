//! Shared utilities.

pub mod script;

pub use script::{render_connect_script, write_connect_script, CONNECT_SCRIPT_NAME};
