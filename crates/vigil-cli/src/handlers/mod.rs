//! Command handlers.
//!
//! Handlers are thin: they parse terminal input, call into the engine or
//! the operation manager, and format the result.

pub mod check_config;
pub mod console;
pub mod decode;
pub mod run;
