pub(crate) mod claude_stream;
pub(crate) mod http_client;
pub(crate) mod oauth_common;

pub mod claude_aws;
pub mod gemini_gcp;
pub mod protobuf_agent;
pub mod ws_claude;
