//! call-notify — call-completion webhook to staff notification email.

pub mod config;
pub mod error;
pub mod llm;
pub mod notify;
pub mod pipeline;
pub mod timefmt;
pub mod webhook;
