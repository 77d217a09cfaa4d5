//! LLM Provider implementations for crewloop.
//!
//! All providers implement the `crewloop_core::Provider` trait.

pub mod deadline;
pub mod openai_compat;

pub use deadline::DeadlineProvider;
pub use openai_compat::OpenAiCompatProvider;
