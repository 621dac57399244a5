use portcullis_protocol::claude::count_tokens::request::{
    CountTokensHeaders as ClaudeCountTokensHeaders, CountTokensRequest as ClaudeCountTokensRequest,
    CountTokensRequestBody as ClaudeCountTokensRequestBody,
};
use portcullis_protocol::gemini::count_tokens::request::CountTokensRequest as GeminiCountTokensRequest;
use portcullis_protocol::gemini::generate_content::request::{
    GenerateContentPath as GeminiGenerateContentPath,
    GenerateContentRequest as GeminiGenerateContentRequest,
    GenerateContentRequestBody as GeminiGenerateContentRequestBody,
};

/// Convert a Gemini count-tokens request into Claude's count-tokens request shape by
/// routing the embedded content (either `contents` or `generateContentRequest`) through the
/// full generate-content -> create-message transform.
pub fn transform_request(request: GeminiCountTokensRequest) -> ClaudeCountTokensRequest {
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

    let claude_message = crate::generate_content::gemini2claude::request::transform_request(wrapped);

    ClaudeCountTokensRequest {
        headers: ClaudeCountTokensHeaders::default(),
        body: ClaudeCountTokensRequestBody {
            messages: claude_message.body.messages,
            model: claude_message.body.model,
            system: claude_message.body.system,
            tools: claude_message.body.tools,
            tool_choice: claude_message.body.tool_choice,
            thinking: claude_message.body.thinking,
            output_config: claude_message.body.output_config,
            output_format: claude_message.body.output_format,
            context_management: claude_message.body.context_management,
            mcp_servers: claude_message.body.mcp_servers,
        },
    }
}
