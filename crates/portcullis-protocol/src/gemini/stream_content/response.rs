use crate::gemini::generate_content::response::GenerateContentResponse;

/// `:streamGenerateContent` emits a JSON stream of the same response shape
/// non-streaming `:generateContent` returns once, one element per chunk.
pub type StreamGenerateContentResponse = GenerateContentResponse;
