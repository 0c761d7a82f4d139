//! Multi-stage inference cascade for clinical consultation transcripts.
//!
//! A transcript goes through a cheap red-flag triage and a fact extraction
//! (concurrently), a cost-aware model choice, and a final analysis on the
//! chosen model.  The output is a structured note: warnings, suggestions and
//! a SOAP note.  See [`pipeline`] for the orchestrator.

pub mod cascade;
pub mod config;
pub mod knowledge;
pub mod llm;
pub mod pipeline;
pub mod recovery;
