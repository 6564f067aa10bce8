//! Narration synthesis through the ElevenLabs streaming API.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt, TryStreamExt};
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::config::VoiceConfig;
use crate::credentials::Credentials;
use crate::error::PipelineError;
use crate::storage::artifact_path;

const SERVICE: &str = "ElevenLabs";

/// Finite, single-pass sequence of audio byte chunks.
///
/// Every consuming operation takes the stream by value, so it can only be
/// drained once. Use [`AudioStream::buffer`] to get an [`AudioClip`] that
/// can be replayed.
pub struct AudioStream {
    chunks: BoxStream<'static, Result<Bytes, PipelineError>>,
}

impl AudioStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, PipelineError>> + Send + 'static,
    {
        Self {
            chunks: stream.boxed(),
        }
    }

    /// Stream over chunks that are already in memory.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
        I::IntoIter: Send + 'static,
    {
        Self::new(stream::iter(chunks.into_iter().map(Ok)))
    }

    pub fn empty() -> Self {
        Self::from_chunks(Vec::new())
    }

    /// Drain the stream into memory.
    pub async fn buffer(self) -> Result<AudioClip, PipelineError> {
        let chunks: Vec<Bytes> = self.chunks.try_collect().await?;
        Ok(AudioClip { chunks })
    }
}

impl fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioStream").finish_non_exhaustive()
    }
}

/// Materialized audio that can be streamed any number of times.
#[derive(Debug, Clone, Default)]
pub struct AudioClip {
    chunks: Vec<Bytes>,
}

impl AudioClip {
    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    /// Total size in bytes.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A fresh stream over the buffered chunks.
    pub fn replay(&self) -> AudioStream {
        AudioStream::from_chunks(self.chunks.clone())
    }
}

/// Turns a narration script into audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns the synthesized audio without consuming it.
    async fn synthesize(&self, script: &str) -> Result<AudioStream, PipelineError>;
}

/// Reject scripts the synthesis service cannot speak.
pub fn validate_script(script: &str) -> Result<(), PipelineError> {
    if script.trim().is_empty() {
        return Err(PipelineError::InvalidInput(
            "Script text cannot be empty".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
    speed: f32,
}

impl From<&VoiceConfig> for VoiceSettings {
    fn from(voice: &VoiceConfig) -> Self {
        Self {
            stability: voice.stability,
            similarity_boost: voice.similarity_boost,
            style: voice.style,
            use_speaker_boost: voice.use_speaker_boost,
            speed: voice.speed,
        }
    }
}

/// ElevenLabs text-to-speech client with fixed voice parameters.
pub struct ElevenLabsTts {
    api_key: String,
    voice: VoiceConfig,
    http_client: reqwest::Client,
}

impl ElevenLabsTts {
    pub fn new(voice: VoiceConfig, api_key: impl Into<String>) -> Result<Self, PipelineError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            api_key: api_key.into(),
            voice,
            http_client,
        })
    }

    /// Build a client from the startup credentials.
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` naming `ELEVENLABS_API_KEY` when no key
    /// was provided.
    pub fn from_credentials(
        voice: VoiceConfig,
        credentials: &Credentials,
    ) -> Result<Self, PipelineError> {
        let api_key = credentials.speech_key()?;
        Self::new(voice, api_key)
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}/stream",
            self.voice.api_base.trim_end_matches('/'),
            self.voice.voice_id
        )
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsTts {
    async fn synthesize(&self, script: &str) -> Result<AudioStream, PipelineError> {
        validate_script(script)?;

        let body = SynthesisRequest {
            text: script,
            model_id: &self.voice.model_id,
            voice_settings: VoiceSettings::from(&self.voice),
        };

        tracing::debug!(voice = %self.voice.voice_id, chars = script.len(), "synthesizing narration");
        let response = self
            .http_client
            .post(self.stream_url())
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::from_response(SERVICE, response).await);
        }

        Ok(AudioStream::new(
            response.bytes_stream().map_err(PipelineError::Http),
        ))
    }
}

/// Write every chunk, in order, to `<dir>/<name>.mp3`.
///
/// The directory is created if needed and an existing file is overwritten.
/// An empty stream leaves a zero-byte file. If the stream or a write fails
/// part way, the partial file is removed.
pub async fn save_audio(
    audio: AudioStream,
    dir: &Path,
    name: &str,
) -> Result<PathBuf, PipelineError> {
    tokio::fs::create_dir_all(dir).await?;

    let dest = artifact_path(dir, name, "mp3");
    let mut file = tokio::fs::File::create(&dest).await?;

    if let Err(e) = write_chunks(&mut file, audio).await {
        drop(file);
        if let Err(remove_err) = tokio::fs::remove_file(&dest).await {
            tracing::warn!(path = %dest.display(), "failed to remove partial audio: {}", remove_err);
        }
        return Err(e);
    }

    Ok(dest)
}

async fn write_chunks(file: &mut tokio::fs::File, audio: AudioStream) -> Result<(), PipelineError> {
    let mut chunks = audio.chunks;
    while let Some(chunk) = chunks.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::ELEVENLABS_KEY_ENV;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tts_for(server: &MockServer) -> ElevenLabsTts {
        let voice = VoiceConfig {
            api_base: server.uri(),
            ..VoiceConfig::default()
        };
        ElevenLabsTts::new(voice, "xi-test").unwrap()
    }

    #[tokio::test]
    async fn test_empty_script_is_rejected_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = tts_for(&server).synthesize("  \n").await;
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn test_missing_key_is_reported_before_any_request() {
        let result = ElevenLabsTts::from_credentials(VoiceConfig::default(), &Credentials::default());
        match result {
            Err(PipelineError::MissingCredential { var }) => assert_eq!(var, ELEVENLABS_KEY_ENV),
            Err(other) => panic!("expected MissingCredential, got {:?}", other),
            Ok(_) => panic!("expected MissingCredential"),
        }
    }

    #[tokio::test]
    async fn test_synthesize_streams_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/22VndfJPBU7AZORAZZTT/stream"))
            .and(header("xi-api-key", "xi-test"))
            .and(body_partial_json(serde_json::json!({
                "text": "What is a mojito?",
                "model_id": "eleven_multilingual_v2",
                "voice_settings": { "use_speaker_boost": true }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3-fake-mp3".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let audio = tts_for(&server).synthesize("What is a mojito?").await.unwrap();
        let clip = audio.buffer().await.unwrap();
        assert_eq!(clip.chunks().concat(), b"ID3-fake-mp3");
    }

    #[tokio::test]
    async fn test_non_success_status_is_remote_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let result = tts_for(&server).synthesize("hello").await;
        match result {
            Err(PipelineError::RemoteService { service, status, body }) => {
                assert_eq!(service, "ElevenLabs");
                assert_eq!(status, 401);
                assert_eq!(body, "invalid api key");
            }
            other => panic!("expected RemoteService, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_save_empty_stream_creates_zero_byte_file() {
        let tmp = tempfile::tempdir().unwrap();
        let audio_dir = tmp.path().join("data").join("audios");

        let saved = save_audio(AudioStream::empty(), &audio_dir, "sample").await.unwrap();
        assert_eq!(saved, audio_dir.join("sample.mp3"));
        assert_eq!(std::fs::metadata(&saved).unwrap().len(), 0);

        // Directory already exists on the second call.
        save_audio(AudioStream::empty(), &audio_dir, "sample").await.unwrap();
        assert_eq!(std::fs::metadata(&saved).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_save_writes_chunks_in_order_and_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let chunks = vec![
            Bytes::from_static(b"chunk1"),
            Bytes::from_static(b"chunk2"),
            Bytes::from_static(b"chunk3"),
        ];

        let first = AudioStream::from_chunks(vec![Bytes::from_static(b"old contents, longer")]);
        save_audio(first, tmp.path(), "test_audio").await.unwrap();

        let saved = save_audio(AudioStream::from_chunks(chunks), tmp.path(), "test_audio")
            .await
            .unwrap();
        assert_eq!(std::fs::read(saved).unwrap(), b"chunk1chunk2chunk3");
    }

    #[tokio::test]
    async fn test_clip_replays_same_bytes() {
        let audio = AudioStream::from_chunks(vec![Bytes::from_static(b"ab"), Bytes::from_static(b"c")]);
        let clip = audio.buffer().await.unwrap();
        assert_eq!(clip.len(), 3);
        assert!(!clip.is_empty());
        assert!(AudioStream::empty().buffer().await.unwrap().is_empty());

        let first = clip.replay().buffer().await.unwrap();
        let second = clip.replay().buffer().await.unwrap();
        assert_eq!(first.chunks(), second.chunks());
    }

    #[tokio::test]
    async fn test_stream_error_propagates_from_save() {
        let tmp = tempfile::tempdir().unwrap();
        let failing = AudioStream::new(stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(PipelineError::InvalidInput("broken".to_string())),
        ]));

        let result = save_audio(failing, tmp.path(), "broken").await;
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
        assert!(!tmp.path().join("broken.mp3").exists());
        assert!(tmp.path().exists());
    }

    #[tokio::test]
    async fn test_failed_rewrite_does_not_leave_stale_audio() {
        let tmp = tempfile::tempdir().unwrap();
        let good = AudioStream::from_chunks(vec![Bytes::from_static(b"complete take")]);
        save_audio(good, tmp.path(), "take").await.unwrap();

        let failing = AudioStream::new(stream::iter(vec![
            Ok(Bytes::from_static(b"half")),
            Err(PipelineError::RemoteService {
                service: "ElevenLabs",
                status: 502,
                body: "upstream reset".to_string(),
            }),
        ]));
        let result = save_audio(failing, tmp.path(), "take").await;

        assert!(matches!(result, Err(PipelineError::RemoteService { status: 502, .. })));
        assert!(!tmp.path().join("take.mp3").exists());
    }
}
