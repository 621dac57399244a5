use portcullis_protocol::claude::count_tokens::request::CountTokensRequest as ClaudeCountTokensRequest;
use portcullis_protocol::claude::count_tokens::types::Model as ClaudeModel;
use portcullis_protocol::claude::create_message::request::{
    CreateMessageHeaders, CreateMessageRequest, CreateMessageRequestBody,
};
use portcullis_protocol::gemini::count_tokens::request::{
    CountTokensPath as GeminiCountTokensPath, CountTokensRequest as GeminiCountTokensRequest,
    CountTokensRequestBody as GeminiCountTokensRequestBody,
};
use serde_json::Value as JsonValue;

const PROBE_MAX_TOKENS: u32 = 1;

/// Convert a Claude count-tokens request into Gemini's count-tokens request shape by
/// routing the message body through the full create-message -> generate-content transform
/// and embedding the result as `generateContentRequest`.
pub fn transform_request(request: ClaudeCountTokensRequest) -> GeminiCountTokensRequest {
    let model = model_id_string(&request.body.model);

    let wrapped = CreateMessageRequest {
        headers: CreateMessageHeaders::default(),
        body: CreateMessageRequestBody {
            max_tokens: PROBE_MAX_TOKENS,
            messages: request.body.messages,
            model: request.body.model,
            container: None,
            context_management: request.body.context_management,
            mcp_servers: request.body.mcp_servers,
            metadata: None,
            output_config: request.body.output_config,
            output_format: request.body.output_format,
            service_tier: None,
            stop_sequences: None,
            stream: None,
            system: request.body.system,
            temperature: None,
            thinking: request.body.thinking,
            tool_choice: request.body.tool_choice,
            tools: request.body.tools,
            top_k: None,
            top_p: None,
        },
    };

    let gemini_generate = crate::generate_content::claude2gemini::request::transform_request(wrapped);

    GeminiCountTokensRequest {
        path: GeminiCountTokensPath { model },
        body: GeminiCountTokensRequestBody {
            contents: None,
            generate_content_request: Some(gemini_generate.body),
        },
    }
}

fn model_id_string(model: &ClaudeModel) -> String {
    match model {
        ClaudeModel::Custom(value) => value.clone(),
        ClaudeModel::Known(known) => match serde_json::to_value(known) {
            Ok(JsonValue::String(value)) => value,
            _ => "unknown".to_string(),
        },
    }
}
