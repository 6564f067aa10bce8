//! API credentials read once from the process environment.

use std::fmt;

use crate::error::PipelineError;

/// Generative-text (Gemini) API key.
pub const GOOGLE_KEY_ENV: &str = "GOOGLE_KEY";
/// ElevenLabs text-to-speech API key.
pub const ELEVENLABS_KEY_ENV: &str = "ELEVENLABS_API_KEY";
/// Google Custom Search API key.
pub const GOOGLE_SEARCH_KEY_ENV: &str = "GOOGLE_SEARCH_KEY";
/// Google Custom Search engine identifier.
pub const SEARCH_ENGINE_ID_ENV: &str = "SEARCH_ENGINE_ID";
/// Unsplash access key.
pub const UNSPLASH_KEY_ENV: &str = "UNSPLASH_KEY";
/// Shutterstock consumer key.
pub const SHUTTERSTOCK_KEY_ENV: &str = "SHUTTERSTOCK_KEY";
/// Shutterstock OAuth bearer token.
pub const SHUTTERSTOCK_TOKEN_ENV: &str = "SHUTTERSTOCK_TOKEN";

/// Every credential the pipeline may need.
///
/// Values are captured once; components pull the ones they need at
/// construction and fail with [`PipelineError::MissingCredential`] when a
/// value is absent. Empty strings count as absent.
#[derive(Clone, Default)]
pub struct Credentials {
    pub google_key: Option<String>,
    pub elevenlabs_key: Option<String>,
    pub search_key: Option<String>,
    pub search_engine_id: Option<String>,
    pub unsplash_key: Option<String>,
    pub shutterstock_key: Option<String>,
    pub shutterstock_token: Option<String>,
}

impl Credentials {
    /// Read all credentials from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read all credentials through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            google_key: get(GOOGLE_KEY_ENV),
            elevenlabs_key: get(ELEVENLABS_KEY_ENV),
            search_key: get(GOOGLE_SEARCH_KEY_ENV),
            search_engine_id: get(SEARCH_ENGINE_ID_ENV),
            unsplash_key: get(UNSPLASH_KEY_ENV),
            shutterstock_key: get(SHUTTERSTOCK_KEY_ENV),
            shutterstock_token: get(SHUTTERSTOCK_TOKEN_ENV),
        }
    }

    pub fn text_key(&self) -> Result<&str, PipelineError> {
        require(&self.google_key, GOOGLE_KEY_ENV)
    }

    pub fn speech_key(&self) -> Result<&str, PipelineError> {
        require(&self.elevenlabs_key, ELEVENLABS_KEY_ENV)
    }

    /// Google search key and engine id, checked in that order.
    pub fn google_search(&self) -> Result<(&str, &str), PipelineError> {
        let key = require(&self.search_key, GOOGLE_SEARCH_KEY_ENV)?;
        let engine = require(&self.search_engine_id, SEARCH_ENGINE_ID_ENV)?;
        Ok((key, engine))
    }

    pub fn unsplash(&self) -> Result<&str, PipelineError> {
        require(&self.unsplash_key, UNSPLASH_KEY_ENV)
    }

    /// Shutterstock consumer key and bearer token, checked in that order.
    pub fn shutterstock(&self) -> Result<(&str, &str), PipelineError> {
        let key = require(&self.shutterstock_key, SHUTTERSTOCK_KEY_ENV)?;
        let token = require(&self.shutterstock_token, SHUTTERSTOCK_TOKEN_ENV)?;
        Ok((key, token))
    }
}

fn require<'a>(value: &'a Option<String>, var: &'static str) -> Result<&'a str, PipelineError> {
    value
        .as_deref()
        .ok_or(PipelineError::MissingCredential { var })
}

// Keys never end up in logs or panic messages.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |value: &Option<String>| if value.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("google_key", &mark(&self.google_key))
            .field("elevenlabs_key", &mark(&self.elevenlabs_key))
            .field("search_key", &mark(&self.search_key))
            .field("search_engine_id", &mark(&self.search_engine_id))
            .field("unsplash_key", &mark(&self.unsplash_key))
            .field("shutterstock_key", &mark(&self.shutterstock_key))
            .field("shutterstock_token", &mark(&self.shutterstock_token))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> Credentials {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Credentials::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_missing_speech_key_names_variable() {
        let creds = lookup_from(&[(GOOGLE_KEY_ENV, "g")]);
        match creds.speech_key() {
            Err(PipelineError::MissingCredential { var }) => assert_eq!(var, ELEVENLABS_KEY_ENV),
            other => panic!("expected MissingCredential, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let creds = lookup_from(&[(GOOGLE_KEY_ENV, "  ")]);
        assert!(matches!(
            creds.text_key(),
            Err(PipelineError::MissingCredential { var: GOOGLE_KEY_ENV })
        ));
    }

    #[test]
    fn test_google_search_reports_first_missing() {
        let creds = lookup_from(&[]);
        assert!(matches!(
            creds.google_search(),
            Err(PipelineError::MissingCredential { var: GOOGLE_SEARCH_KEY_ENV })
        ));

        let creds = lookup_from(&[(GOOGLE_SEARCH_KEY_ENV, "key")]);
        assert!(matches!(
            creds.google_search(),
            Err(PipelineError::MissingCredential { var: SEARCH_ENGINE_ID_ENV })
        ));

        let creds = lookup_from(&[(GOOGLE_SEARCH_KEY_ENV, "key"), (SEARCH_ENGINE_ID_ENV, "cx")]);
        assert_eq!(creds.google_search().unwrap(), ("key", "cx"));
    }

    #[test]
    fn test_debug_hides_values() {
        let creds = lookup_from(&[(ELEVENLABS_KEY_ENV, "secret-value")]);
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("<set>"));
    }
}
