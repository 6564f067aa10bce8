//! Triviagen Core Library
//!
//! Generates trivia prompts for a list of topics and turns each one into
//! narration audio and/or a downloaded image.

pub mod config;
pub mod credentials;
pub mod error;
pub mod photos;
pub mod pipeline;
pub mod script;
pub mod speech;
pub mod storage;

pub use config::{Config, ImageSource, default_config};
pub use credentials::Credentials;
pub use error::PipelineError;
pub use photos::{ImageCandidate, ImageFetcher, ImageSearch};
pub use pipeline::{Pipeline, PipelineEvent, RunMode, RunReport};
pub use script::{GeminiScriptWriter, ScriptWriter};
pub use speech::{AudioClip, AudioStream, ElevenLabsTts, SpeechSynthesizer};
pub use storage::DataLayout;
