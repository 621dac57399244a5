mod dispatch;
mod model_table;
mod provider_config;

pub use dispatch::{DispatchRule, DispatchTable, OperationKind};
pub use model_table::{ModelRecord, ModelTable};
pub use provider_config::{
    ClaudeAwsConfig, CountTokensMode, GeminiGcpConfig, ProtobufAgentConfig, ProviderConfig,
    WsClaudeConfig,
};
