#![deny(unsafe_code)]

//! Transport seam between the chat room and a hosted conversational model.

mod adapter;
mod media;
mod provider;
mod rig_adapter;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use adapter::{
    MISSING_CREDENTIAL_REPLY, SYSTEM_INSTRUCTION, StreamingAdapter, TRANSPORT_FALLBACK_REPLY,
};
pub use media::{ImageMediaType, ImagePayload, MAX_IMAGE_BYTES, MediaError, MediaResult};
pub use provider::{
    BoxFuture, ChatSession, ChatTransport, DEFAULT_GEMINI_MODEL, DEFAULT_IMAGE_PROMPT,
    FragmentStream, HistoryTurn, ProviderConfig, ProviderError, ProviderResult, Role, TurnRequest,
};
pub use rig_adapter::{RIG_GEMINI_TRANSPORT_ID, RigChatSession, RigGeminiTransport};

/// Builds the Gemini-backed adapter, degrading to an unconfigured one when the
/// key is missing.
pub fn gemini_adapter(config: ProviderConfig) -> StreamingAdapter<RigGeminiTransport> {
    if !config.has_credential() {
        tracing::warn!("no API key provided for Gemini, replies will carry a configuration notice");
        return StreamingAdapter::unconfigured();
    }

    match RigGeminiTransport::new(config) {
        Ok(transport) => {
            tracing::info!(model_id = %transport.model_id(), "gemini transport ready");
            StreamingAdapter::new(transport)
        }
        Err(error) => {
            tracing::error!(error = %error, "failed to initialize gemini transport");
            StreamingAdapter::unconfigured()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_builds_an_unconfigured_adapter() {
        let adapter = gemini_adapter(ProviderConfig::new("", "", ""));
        assert!(!adapter.is_configured());
    }

    #[test]
    fn key_builds_a_configured_adapter() {
        let adapter = gemini_adapter(ProviderConfig::new("secret", "", "gemini-2.0-flash"));
        assert!(adapter.is_configured());
        assert_eq!(
            adapter.transport().map(RigGeminiTransport::model_id),
            Some("gemini-2.0-flash")
        );
    }
}
