pub use crate::gemini::count_tokens::types::*;
pub use crate::gemini::count_tokens::{
    CountTokensPath, CountTokensRequest, CountTokensRequestBody, CountTokensResponse,
};
pub use crate::gemini::generate_content::types::*;
pub use crate::gemini::generate_content::{
    GenerateContentPath, GenerateContentRequest, GenerateContentRequestBody,
    GenerateContentResponse,
};
pub use crate::gemini::stream_content::{
    StreamGenerateContentRequest, StreamGenerateContentResponse,
};
pub use crate::gemini::get_model::types::Model;
