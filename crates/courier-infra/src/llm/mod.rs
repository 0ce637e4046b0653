//! Summarizer providers.

pub mod anthropic;

use secrecy::SecretString;

use courier_core::llm::BoxLlmProvider;
use courier_types::llm::LlmError;

use self::anthropic::AnthropicProvider;

/// Environment variable holding the Anthropic API key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Optional base URL override for the Anthropic API.
pub const BASE_URL_ENV: &str = "ANTHROPIC_BASE_URL";

/// Build the consolidation summarizer from the environment.
pub fn summarizer_from_env() -> Result<BoxLlmProvider, LlmError> {
    let api_key = std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| LlmError::InvalidRequest(format!("{API_KEY_ENV} is not set")))?;

    let mut provider = AnthropicProvider::new(SecretString::from(api_key))?;
    if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
        provider = provider.with_base_url(base_url);
    }
    Ok(BoxLlmProvider::new(provider))
}
