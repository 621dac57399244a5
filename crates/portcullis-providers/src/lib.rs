//! Built-in upstream provider implementations.
//!
//! Most adapters here build `UpstreamHttpRequest` values for the engine's shared
//! HTTP client to execute. `ws_claude` and `protobuf_agent` are the exception: they
//! are not HTTP-request/response shaped upstreams, so they perform their own IO
//! behind `UpstreamProvider::local_response` and hand the engine a pre-wired byte
//! stream instead.

mod auth_extractor;
mod builtin;
mod providers;
mod registry;

pub use builtin::{BuiltinProviderSeed, builtin_provider_seeds};
pub use registry::register_builtin_providers;
