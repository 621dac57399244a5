use std::sync::Arc;

use portcullis_core::ProviderRegistry;

use crate::providers::claude_aws::ClaudeAwsProvider;
use crate::providers::gemini_gcp::GeminiGcpProvider;
use crate::providers::protobuf_agent::ProtobufAgentProvider;
use crate::providers::ws_claude::WsClaudeProvider;

/// Registers the four built-in upstream adapters into a fresh registry.
pub fn register_builtin_providers(registry: &mut ProviderRegistry) {
    registry.register(Arc::new(ClaudeAwsProvider::new()));
    registry.register(Arc::new(GeminiGcpProvider::new()));
    registry.register(Arc::new(WsClaudeProvider::new()));
    registry.register(Arc::new(ProtobufAgentProvider::new()));
}
