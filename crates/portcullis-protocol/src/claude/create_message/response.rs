use super::types::BetaMessage;

/// A non-streaming `POST /v1/messages` response is just a `BetaMessage`;
/// streaming responses are instead a `BetaStreamEvent` sequence (see
/// `create_message::stream`).
pub type CreateMessageResponse = BetaMessage;
