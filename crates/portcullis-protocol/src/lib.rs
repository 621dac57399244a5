//! Wire-format types for the three downstream-compatible surfaces
//! (Anthropic Messages, OpenAI Chat Completions, Gemini `generateContent`)
//! plus the SSE framing shared by all of them.
//!
//! This crate only knows about bytes-on-the-wire; it has no notion of
//! credentials, providers, or dispatch. `portcullis-translate` builds the
//! internal normalized form on top of these types.

pub mod claude;
pub mod gemini;
pub mod models;
pub mod openai;
pub mod sse;
