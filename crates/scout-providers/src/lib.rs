//! scout-providers: model adapters for scout
//!
//! This crate provides implementations of the `LanguageModel` trait. The
//! Gemini adapter translates ReAct transcripts into structured
//! `generateContent` requests and re-encodes the replies as ReAct text.

pub mod context_windows;
pub mod gemini;

pub use context_windows::known_context_window;
pub use gemini::GeminiProvider;
