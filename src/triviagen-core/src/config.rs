//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::PipelineError;

/// Root configuration structure.
///
/// Every section is optional in the file; missing sections and fields fall
/// back to [`default_config`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationConfig,
    pub voice: VoiceConfig,
    pub search: SearchConfig,
    pub output: OutputConfig,
}

/// Generative-text settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    pub model: String,
    /// Prompt sent to the generator; `{topics}` is replaced by one topic per line.
    pub prompt_template: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model: "gemini-2.0-flash-lite".to_string(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

/// Voice settings for speech synthesis.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub api_base: String,
    pub voice_id: String,
    pub model_id: String,
    pub speed: f32,
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.elevenlabs.io".to_string(),
            voice_id: "22VndfJPBU7AZORAZZTT".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            speed: 1.08,
            stability: 0.15,
            similarity_boost: 0.53,
            style: 0.80,
            use_speaker_boost: true,
        }
    }
}

/// Which image-search service to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    #[default]
    Google,
    Unsplash,
    Shutterstock,
}

impl ImageSource {
    pub const ALL: [ImageSource; 3] = [
        ImageSource::Google,
        ImageSource::Unsplash,
        ImageSource::Shutterstock,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ImageSource::Google => "google",
            ImageSource::Unsplash => "unsplash",
            ImageSource::Shutterstock => "shutterstock",
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageSource {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ImageSource::ALL
            .into_iter()
            .find(|source| source.name() == wanted)
            .ok_or_else(|| {
                PipelineError::Config(format!(
                    "Unknown image source '{}'. Available sources: google, unsplash, shutterstock",
                    s
                ))
            })
    }
}

/// Image-search settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub source: ImageSource,
    pub google_api_base: String,
    pub unsplash_api_base: String,
    pub shutterstock_api_base: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            source: ImageSource::default(),
            google_api_base: "https://www.googleapis.com".to_string(),
            unsplash_api_base: "https://api.unsplash.com".to_string(),
            shutterstock_api_base: "https://api.shutterstock.com".to_string(),
        }
    }
}

/// Where artifacts are written.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub data_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| PipelineError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, PipelineError> {
        toml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config::default()
}

const DEFAULT_PROMPT_TEMPLATE: &str = r#"I need you to list Google Image search prompts for a trivia game, NO ADDED COMMENTS. Please use the following template for each prompt: [Category] [Specific Subject/Object/Action] [Visual Descriptor] [Optional: Time Period/Style/Modifier] photo/image.

For each of the following trivia categories, provide one Google Image search prompt using the template:

{topics}

Please fill in each part of the template with relevant and specific terms for each category.
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_voice_settings() {
        let config = default_config();
        assert_eq!(config.voice.voice_id, "22VndfJPBU7AZORAZZTT");
        assert_eq!(config.voice.model_id, "eleven_multilingual_v2");
        assert_eq!(config.voice.speed, 1.08);
        assert!(config.voice.use_speaker_boost);
        assert_eq!(config.generation.model, "gemini-2.0-flash-lite");
        assert!(config.generation.prompt_template.contains("{topics}"));
    }

    #[test]
    fn test_partial_file_overrides_fields() {
        let config = Config::from_str(
            r#"
            [voice]
            voice_id = "other-voice"
            stability = 0.5

            [search]
            source = "unsplash"

            [output]
            data_dir = "/tmp/trivia"
            "#,
        )
        .unwrap();

        assert_eq!(config.voice.voice_id, "other-voice");
        assert_eq!(config.voice.stability, 0.5);
        assert_eq!(config.voice.model_id, "eleven_multilingual_v2");
        assert_eq!(config.search.source, ImageSource::Unsplash);
        assert_eq!(config.output.data_dir, PathBuf::from("/tmp/trivia"));
        assert_eq!(config.generation.model, "gemini-2.0-flash-lite");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = Config::from_str("[voice\nspeed = ");
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_image_source_from_str() {
        assert_eq!("Google".parse::<ImageSource>().unwrap(), ImageSource::Google);
        assert_eq!(
            " shutterstock ".parse::<ImageSource>().unwrap(),
            ImageSource::Shutterstock
        );
        assert!("bing".parse::<ImageSource>().is_err());
    }
}
