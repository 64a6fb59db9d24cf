//! Call processing pipeline.
//!
//! Every end-of-call event flows through:
//! 1. `extractor::extract()` — transcript, start time, phone, recording
//! 2. `CallSummarizer::summarize()` — LLM classification into a `CallSummary`
//! 3. `RecipientRouter::route()` — LLM routing against the team roster
//! 4. `Notifier::send()` — HTML report by email
//!
//! `CallProcessor` runs the stages in order. Each call is independent.

pub mod extractor;
pub mod policy;
pub mod processor;
pub mod roster;
pub mod router;
pub mod summarizer;
pub mod types;

pub use policy::ClassificationPolicy;
pub use processor::{CallProcessor, FailureHook, TracingFailureHook};
pub use roster::{Roster, TeamMember};
pub use router::RecipientRouter;
pub use summarizer::CallSummarizer;
