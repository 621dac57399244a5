//! Default provider rows seeded into storage on first boot.

use portcullis_core::ProviderConfig;
use portcullis_core::config::{ClaudeAwsConfig, GeminiGcpConfig, ProtobufAgentConfig, WsClaudeConfig};

pub struct BuiltinProviderSeed {
    pub name: &'static str,
    pub config_json: serde_json::Value,
    pub enabled: bool,
}

pub fn builtin_provider_seeds() -> Vec<BuiltinProviderSeed> {
    vec![
        BuiltinProviderSeed {
            name: "claude_aws",
            config_json: config_json(ProviderConfig::ClaudeAws(ClaudeAwsConfig::default())),
            enabled: true,
        },
        BuiltinProviderSeed {
            name: "gemini_gcp",
            config_json: config_json(ProviderConfig::GeminiGcp(GeminiGcpConfig::default())),
            enabled: true,
        },
        BuiltinProviderSeed {
            name: "ws_claude",
            config_json: config_json(ProviderConfig::WsClaude(WsClaudeConfig::default())),
            enabled: true,
        },
        BuiltinProviderSeed {
            name: "protobuf_agent",
            config_json: config_json(ProviderConfig::ProtobufAgent(
                ProtobufAgentConfig::default(),
            )),
            enabled: true,
        },
    ]
}

fn config_json(config: ProviderConfig) -> serde_json::Value {
    serde_json::to_value(config).unwrap_or(serde_json::Value::Null)
}
