use portcullis_protocol::gemini::count_tokens::request::CountTokensRequest as GeminiCountTokensRequest;
use portcullis_protocol::gemini::generate_content::request::{
    GenerateContentPath as GeminiGenerateContentPath,
    GenerateContentRequest as GeminiGenerateContentRequest,
    GenerateContentRequestBody as GeminiGenerateContentRequestBody,
};
use portcullis_protocol::openai::count_tokens::request::{
    InputTokenCountRequest as OpenAIInputTokenCountRequest,
    InputTokenCountRequestBody as OpenAIInputTokenCountRequestBody,
};

/// Convert a Gemini count-tokens request into OpenAI's input-tokens request shape by
/// routing the embedded content through the full generate-content -> response transform.
pub fn transform_request(request: GeminiCountTokensRequest) -> OpenAIInputTokenCountRequest {
    let model = request.path.model.clone();
    let body = match request.body.generate_content_request {
        Some(inner) => GeminiGenerateContentRequestBody {
            model: inner.model.or(Some(model.clone())),
            ..inner
        },
        None => GeminiGenerateContentRequestBody {
            contents: request.body.contents.unwrap_or_default(),
            model: Some(model.clone()),
            tools: None,
            tool_config: None,
            safety_settings: None,
            system_instruction: None,
            generation_config: None,
            cached_content: None,
        },
    };

    let wrapped = GeminiGenerateContentRequest {
        path: GeminiGenerateContentPath { model },
        body,
    };

    let response_req =
        crate::generate_content::gemini2openai_response::request::transform_request(wrapped);

    OpenAIInputTokenCountRequest {
        body: OpenAIInputTokenCountRequestBody {
            model: response_req.body.model,
            input: response_req.body.input,
            previous_response_id: None,
            tools: response_req.body.tools,
            text: response_req.body.text,
            reasoning: response_req.body.reasoning,
            truncation: response_req.body.truncation,
            instructions: response_req.body.instructions,
            conversation: response_req.body.conversation,
            tool_choice: response_req.body.tool_choice,
            parallel_tool_calls: response_req.body.parallel_tool_calls,
        },
    }
}
