//! Patientsim Chat: the conversation orchestrator.
//!
//! [`ChatService`] turns one doctor message into one patient reply: it resolves
//! or bootstraps the session transcript, bounds it, calls the completion
//! provider, and writes the result back only on success.

pub mod service;

pub use service::ChatService;
