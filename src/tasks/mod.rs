//! Background Tasks Module
//!
//! Tasks that run detached from the caller.
//!
//! # Tasks
//! - Clear on exit: Deletes a cache key when the host's exit signal fires

mod clear_on_exit;

pub use clear_on_exit::spawn_clear_on_exit;
