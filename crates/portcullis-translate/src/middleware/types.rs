use serde::{Deserialize, Serialize};

use portcullis_protocol::claude::count_tokens::request::CountTokensRequest as ClaudeCountTokensRequest;
use portcullis_protocol::claude::count_tokens::response::CountTokensResponse as ClaudeCountTokensResponse;
use portcullis_protocol::claude::create_message::request::CreateMessageRequest as ClaudeCreateMessageRequest;
use portcullis_protocol::claude::create_message::response::CreateMessageResponse as ClaudeCreateMessageResponse;
use portcullis_protocol::claude::create_message::stream::BetaStreamEvent;
use portcullis_protocol::claude::get_model::request::GetModelRequest as ClaudeGetModelRequest;
use portcullis_protocol::claude::get_model::response::GetModelResponse as ClaudeGetModelResponse;
use portcullis_protocol::claude::list_models::request::ListModelsRequest as ClaudeListModelsRequest;
use portcullis_protocol::claude::list_models::response::ListModelsResponse as ClaudeListModelsResponse;
use portcullis_protocol::gemini::count_tokens::request::CountTokensRequest as GeminiCountTokensRequest;
use portcullis_protocol::gemini::count_tokens::response::CountTokensResponse as GeminiCountTokensResponse;
use portcullis_protocol::gemini::generate_content::request::GenerateContentRequest as GeminiGenerateContentRequest;
use portcullis_protocol::gemini::generate_content::response::GenerateContentResponse as GeminiGenerateContentResponse;
use portcullis_protocol::gemini::get_model::request::GetModelRequest as GeminiGetModelRequest;
use portcullis_protocol::gemini::get_model::response::GetModelResponse as GeminiGetModelResponse;
use portcullis_protocol::gemini::list_models::request::ListModelsRequest as GeminiListModelsRequest;
use portcullis_protocol::gemini::list_models::response::ListModelsResponse as GeminiListModelsResponse;
use portcullis_protocol::gemini::stream_content::request::StreamGenerateContentRequest as GeminiStreamGenerateContentRequest;
use portcullis_protocol::gemini::stream_content::response::StreamGenerateContentResponse;
use portcullis_protocol::openai::count_tokens::request::InputTokenCountRequest as OpenAICountTokensRequest;
use portcullis_protocol::openai::count_tokens::response::InputTokenCountResponse as OpenAICountTokensResponse;
use portcullis_protocol::openai::create_chat_completions::request::CreateChatCompletionRequest as OpenAIChatCompletionRequest;
use portcullis_protocol::openai::create_chat_completions::response::CreateChatCompletionResponse as OpenAIChatCompletionResponse;
use portcullis_protocol::openai::create_chat_completions::stream::CreateChatCompletionStreamResponse;
use portcullis_protocol::openai::create_response::request::CreateResponseRequest as OpenAIResponseRequest;
use portcullis_protocol::openai::create_response::response::Response as OpenAIResponse;
use portcullis_protocol::openai::create_response::stream::ResponseStreamEvent;
use portcullis_protocol::openai::get_model::request::GetModelRequest as OpenAIGetModelRequest;
use portcullis_protocol::openai::get_model::response::GetModelResponse as OpenAIGetModelResponse;
use portcullis_protocol::openai::list_models::request::ListModelsRequest as OpenAIListModelsRequest;
use portcullis_protocol::openai::list_models::response::ListModelsResponse as OpenAIListModelsResponse;
use portcullis_protocol::openai::cancel_response::request::CancelResponseRequest as OpenAICancelResponseRequest;
use portcullis_protocol::openai::cancel_response::response::CancelResponseResponse as OpenAICancelResponseResponse;
use portcullis_protocol::openai::compact_response::request::CompactResponseRequest as OpenAICompactResponseRequest;
use portcullis_protocol::openai::compact_response::response::CompactResponseResponse as OpenAICompactResponseResponse;
use portcullis_protocol::openai::delete_response::request::DeleteResponseRequest as OpenAIDeleteResponseRequest;
use portcullis_protocol::openai::delete_response::response::DeleteResponseResponse as OpenAIDeleteResponseResponse;
use portcullis_protocol::openai::get_response::request::GetResponseRequest as OpenAIGetResponseRequest;
use portcullis_protocol::openai::get_response::response::GetResponseResponse as OpenAIGetResponseResponse;
use portcullis_protocol::openai::list_input_items::request::ListInputItemsRequest as OpenAIListInputItemsRequest;
use portcullis_protocol::openai::list_input_items::response::ListInputItemsResponse as OpenAIListInputItemsResponse;
use portcullis_protocol::openai::trace_summarize::request::TraceSummarizeRequest as OpenAITraceSummarizeRequest;
use portcullis_protocol::openai::trace_summarize::response::TraceSummarizeResponse as OpenAITraceSummarizeResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Proto {
    #[serde(rename = "claude")]
    Claude,
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "openai_chat")]
    OpenAIChat,
    #[serde(rename = "openai_response")]
    OpenAIResponse,
    #[serde(rename = "gemini")]
    Gemini,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    ModelList,
    ModelGet,
    CountTokens,
    GenerateContent,
    StreamGenerateContent,
    ResponseGet,
    ResponseDelete,
    ResponseCancel,
    ResponseListInputItems,
    ResponseCompact,
    MemoryTraceSummarize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformContext {
    pub src: Proto,
    pub dst: Proto,
    pub src_op: Op,
    pub dst_op: Op,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamFormat {
    SseNamedEvent,
    SseDataOnly,
    JsonStream,
}

pub fn stream_format(proto: Proto) -> Option<StreamFormat> {
    match proto {
        Proto::Claude => Some(StreamFormat::SseNamedEvent),
        Proto::OpenAIChat => Some(StreamFormat::SseDataOnly),
        Proto::OpenAIResponse => Some(StreamFormat::SseNamedEvent),
        Proto::Gemini => Some(StreamFormat::JsonStream),
        Proto::OpenAI => None,
    }
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone)]
pub enum Request {
    ModelList(ModelListRequest),
    ModelGet(ModelGetRequest),
    CountTokens(CountTokensRequest),
    GenerateContent(GenerateContentRequest),
    ResponseGet(ResponseGetRequest),
    ResponseDelete(ResponseDeleteRequest),
    ResponseCancel(ResponseCancelRequest),
    ResponseListInputItems(ResponseListInputItemsRequest),
    ResponseCompact(ResponseCompactRequest),
    MemoryTraceSummarize(MemoryTraceSummarizeRequest),
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone)]
pub enum Response {
    ModelList(ModelListResponse),
    ModelGet(ModelGetResponse),
    CountTokens(CountTokensResponse),
    GenerateContent(GenerateContentResponse),
    ResponseGet(ResponseGetResponse),
    ResponseDelete(ResponseDeleteResponse),
    ResponseCancel(ResponseCancelResponse),
    ResponseListInputItems(ResponseListInputItemsResponse),
    ResponseCompact(ResponseCompactResponse),
    MemoryTraceSummarize(MemoryTraceSummarizeResponse),
}

#[derive(Debug, Clone)]
pub enum ModelListRequest {
    Claude(ClaudeListModelsRequest),
    OpenAI(OpenAIListModelsRequest),
    Gemini(GeminiListModelsRequest),
}

#[derive(Debug, Clone)]
pub enum ModelListResponse {
    Claude(ClaudeListModelsResponse),
    OpenAI(OpenAIListModelsResponse),
    Gemini(GeminiListModelsResponse),
}

#[derive(Debug, Clone)]
pub enum ModelGetRequest {
    Claude(ClaudeGetModelRequest),
    OpenAI(OpenAIGetModelRequest),
    Gemini(GeminiGetModelRequest),
}

#[derive(Debug, Clone)]
pub enum ModelGetResponse {
    Claude(ClaudeGetModelResponse),
    OpenAI(OpenAIGetModelResponse),
    Gemini(GeminiGetModelResponse),
}

#[derive(Debug, Clone)]
pub enum CountTokensRequest {
    Claude(ClaudeCountTokensRequest),
    OpenAI(OpenAICountTokensRequest),
    Gemini(GeminiCountTokensRequest),
}

#[derive(Debug, Clone)]
pub enum CountTokensResponse {
    Claude(ClaudeCountTokensResponse),
    OpenAI(OpenAICountTokensResponse),
    Gemini(GeminiCountTokensResponse),
}

#[derive(Debug, Clone)]
pub enum GenerateContentRequest {
    Claude(ClaudeCreateMessageRequest),
    OpenAIChat(OpenAIChatCompletionRequest),
    OpenAIResponse(OpenAIResponseRequest),
    Gemini(GeminiGenerateContentRequest),
    GeminiStream(GeminiStreamGenerateContentRequest),
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone)]
pub enum GenerateContentResponse {
    Claude(ClaudeCreateMessageResponse),
    OpenAIChat(OpenAIChatCompletionResponse),
    OpenAIResponse(OpenAIResponse),
    Gemini(GeminiGenerateContentResponse),
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Claude(BetaStreamEvent),
    OpenAIChat(CreateChatCompletionStreamResponse),
    OpenAIResponse(ResponseStreamEvent),
    Gemini(StreamGenerateContentResponse),
}

/// Response-API-only operations. OpenAI is currently the sole caller of
/// these, but the wrapper still carries a proto tag so the engine can
/// reject a mismatched downstream protocol the same way it does for the
/// other operations.
#[derive(Debug, Clone)]
pub enum ResponseGetRequest {
    OpenAI(OpenAIGetResponseRequest),
}

#[derive(Debug, Clone)]
pub enum ResponseGetResponse {
    OpenAI(OpenAIGetResponseResponse),
}

#[derive(Debug, Clone)]
pub enum ResponseDeleteRequest {
    OpenAI(OpenAIDeleteResponseRequest),
}

#[derive(Debug, Clone)]
pub enum ResponseDeleteResponse {
    OpenAI(OpenAIDeleteResponseResponse),
}

#[derive(Debug, Clone)]
pub enum ResponseCancelRequest {
    OpenAI(OpenAICancelResponseRequest),
}

#[derive(Debug, Clone)]
pub enum ResponseCancelResponse {
    OpenAI(OpenAICancelResponseResponse),
}

#[derive(Debug, Clone)]
pub enum ResponseListInputItemsRequest {
    OpenAI(OpenAIListInputItemsRequest),
}

#[derive(Debug, Clone)]
pub enum ResponseListInputItemsResponse {
    OpenAI(OpenAIListInputItemsResponse),
}

#[derive(Debug, Clone)]
pub enum ResponseCompactRequest {
    OpenAI(OpenAICompactResponseRequest),
}

#[derive(Debug, Clone)]
pub enum ResponseCompactResponse {
    OpenAI(OpenAICompactResponseResponse),
}

#[derive(Debug, Clone)]
pub enum MemoryTraceSummarizeRequest {
    OpenAI(OpenAITraceSummarizeRequest),
}

#[derive(Debug, Clone)]
pub enum MemoryTraceSummarizeResponse {
    OpenAI(OpenAITraceSummarizeResponse),
}

#[derive(Debug, Clone)]
pub enum TransformError {
    OpMismatch,
    ProtoMismatch,
    StreamMismatch,
    UnsupportedPair {
        src: Proto,
        dst: Proto,
        src_op: Op,
        dst_op: Op,
    },
}
