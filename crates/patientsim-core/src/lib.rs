//! patientsim core: types, session store, persona catalog, and config.
//!
//! - **types**: turns, transcripts, session ids, request/response shapes
//! - **session**: the idle-expiring transcript cache
//! - **persona**: patient templates new sessions are bootstrapped from
//! - **error**: the four-kind error taxonomy of a doctor turn

pub mod config;
pub mod error;
pub mod persona;
pub mod session;
pub mod types;
pub mod utils;

pub use error::{ChatError, ErrorKind};
