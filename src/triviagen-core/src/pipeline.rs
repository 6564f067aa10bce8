//! Pipeline orchestration.
//!
//! Turns a comma-separated topic line into trivia items and runs each item
//! through speech synthesis and/or image fetching, strictly in order.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::PipelineError;
use crate::photos::{ImageFetcher, image_search_from_config};
use crate::script::{GeminiScriptWriter, ScriptWriter};
use crate::speech::{ElevenLabsTts, SpeechSynthesizer, save_audio};
use crate::storage::{DataLayout, sanitize_file_stem};

/// Which sub-pipelines run for every item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunMode {
    pub audio: bool,
    pub images: bool,
}

impl RunMode {
    pub const AUDIO: RunMode = RunMode {
        audio: true,
        images: false,
    };
    pub const IMAGES: RunMode = RunMode {
        audio: false,
        images: true,
    };
    pub const BOTH: RunMode = RunMode {
        audio: true,
        images: true,
    };
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::IMAGES
    }
}

/// A generated item together with the topic at the same position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicItem {
    pub topic: String,
    pub item: String,
}

/// Callback for pipeline events.
pub type PipelineCallback = Box<dyn Fn(PipelineEvent) + Send + Sync>;

/// Events emitted during a run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// The generator answered and its output was cleaned up.
    ItemsGenerated { items: Vec<String> },
    /// Processing of one item is starting.
    ItemStarted { index: usize, item: String },
    AudioSaved { item: String, path: PathBuf },
    ImageSaved { item: String, path: PathBuf },
    /// The image search had no results for this item.
    ImageSkipped { item: String },
    RunFinished,
}

/// Everything a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub items: Vec<String>,
    pub audio_files: Vec<PathBuf>,
    pub image_files: Vec<PathBuf>,
    /// Items whose image search came back empty.
    pub skipped_images: Vec<String>,
}

/// Drives one topic line through generation, speech and image fetching.
pub struct Pipeline {
    writer: Box<dyn ScriptWriter>,
    prompt_template: String,
    layout: DataLayout,
    speech: Option<Box<dyn SpeechSynthesizer>>,
    images: Option<ImageFetcher>,
    callback: Option<PipelineCallback>,
}

impl Pipeline {
    /// Create a pipeline with no sub-pipelines enabled.
    pub fn new(
        writer: Box<dyn ScriptWriter>,
        prompt_template: impl Into<String>,
        layout: DataLayout,
    ) -> Self {
        Self {
            writer,
            prompt_template: prompt_template.into(),
            layout,
            speech: None,
            images: None,
            callback: None,
        }
    }

    /// Build the production pipeline for `mode`.
    ///
    /// Every credential the mode needs is checked here, so a missing key
    /// fails before any request is made.
    pub fn from_config(
        config: &Config,
        credentials: &Credentials,
        mode: RunMode,
    ) -> Result<Self, PipelineError> {
        let writer = GeminiScriptWriter::new(&config.generation, credentials.text_key()?)?;
        let layout = DataLayout::new(&config.output.data_dir);
        let mut pipeline = Self::new(
            Box::new(writer),
            &config.generation.prompt_template,
            layout,
        );

        if mode.audio {
            let tts = ElevenLabsTts::from_credentials(config.voice.clone(), credentials)?;
            pipeline = pipeline.with_speech(Box::new(tts));
        }

        if mode.images {
            let search = image_search_from_config(&config.search, credentials)?;
            let fetcher = ImageFetcher::new(search, pipeline.layout.photos_dir())?;
            pipeline = pipeline.with_images(fetcher);
        }

        Ok(pipeline)
    }

    pub fn with_speech(mut self, speech: Box<dyn SpeechSynthesizer>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_images(mut self, images: ImageFetcher) -> Self {
        self.images = Some(images);
        self
    }

    /// Set a callback for pipeline events.
    pub fn with_callback(mut self, callback: PipelineCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn mode(&self) -> RunMode {
        RunMode {
            audio: self.speech.is_some(),
            images: self.images.is_some(),
        }
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Run the pipeline for a comma-separated topic line.
    ///
    /// The first failing item aborts the run; artifacts already written stay
    /// on disk.
    pub async fn run(&self, topic_line: &str) -> Result<RunReport, PipelineError> {
        let topics = parse_topics(topic_line);
        let prompt = build_prompt(&self.prompt_template, &topics)?;

        let raw = self.writer.generate(&prompt).await?;
        let items = post_process(&raw);
        tracing::info!(topics = topics.len(), items = items.len(), "generated trivia items");
        self.emit_event(PipelineEvent::ItemsGenerated {
            items: items.clone(),
        });

        let mut report = RunReport {
            items: items.clone(),
            ..RunReport::default()
        };

        // Pair up front so a count mismatch fails before any artifact is written.
        let pairs = match self.images {
            Some(_) => pair_items(&topics, &items)?,
            None => Vec::new(),
        };
        let image_names = image_file_names(&pairs);

        for (index, item) in items.iter().enumerate() {
            self.emit_event(PipelineEvent::ItemStarted {
                index,
                item: item.clone(),
            });

            if let Some(ref speech) = self.speech {
                let audio = speech.synthesize(item).await?;
                let path = save_audio(audio, &self.layout.audio_dir(), item).await?;
                tracing::debug!(path = %path.display(), "saved narration");
                report.audio_files.push(path.clone());
                self.emit_event(PipelineEvent::AudioSaved {
                    item: item.clone(),
                    path,
                });
            }

            if let Some(ref images) = self.images {
                let pair = &pairs[index];
                match images.fetch(&pair.item, &image_names[index]).await? {
                    Some(path) => {
                        tracing::debug!(path = %path.display(), "saved image");
                        report.image_files.push(path.clone());
                        self.emit_event(PipelineEvent::ImageSaved {
                            item: item.clone(),
                            path,
                        });
                    }
                    None => {
                        report.skipped_images.push(item.clone());
                        self.emit_event(PipelineEvent::ImageSkipped { item: item.clone() });
                    }
                }
            }
        }

        self.emit_event(PipelineEvent::RunFinished);
        Ok(report)
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: PipelineEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}

/// Split generator output into clean items.
///
/// Leading `*` bullet markers and surrounding whitespace are removed and
/// blank lines dropped; the order of the remaining lines is kept.
pub fn post_process(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| {
            line.trim_start_matches(|c: char| c == '*' || c.is_whitespace())
                .trim_end()
        })
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a comma-separated line into trimmed, non-empty topics.
pub fn parse_topics(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|topic| !topic.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render the generation prompt with one topic per line.
pub fn build_prompt(template: &str, topics: &[String]) -> Result<String, PipelineError> {
    if topics.is_empty() {
        return Err(PipelineError::InvalidInput(
            "At least one topic is required".to_string(),
        ));
    }
    Ok(template.replace("{topics}", &topics.join("\n")))
}

/// Pair each topic with the item at the same position.
pub fn pair_items(topics: &[String], items: &[String]) -> Result<Vec<TopicItem>, PipelineError> {
    if topics.len() != items.len() {
        return Err(PipelineError::InvalidInput(format!(
            "Generated {} items for {} topics; each topic needs exactly one item",
            items.len(),
            topics.len()
        )));
    }

    Ok(topics
        .iter()
        .zip(items)
        .map(|(topic, item)| TopicItem {
            topic: topic.clone(),
            item: item.clone(),
        })
        .collect())
}

/// File names for the image of each pair, one per pair.
///
/// The name is the topic. Topics that would land on the same file (compared
/// after sanitizing, ignoring case) get their 1-based position appended, so
/// no image overwrites another within a run.
pub fn image_file_names(pairs: &[TopicItem]) -> Vec<String> {
    let stem_key = |topic: &str| sanitize_file_stem(topic).to_lowercase();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for pair in pairs {
        *counts.entry(stem_key(&pair.topic)).or_default() += 1;
    }

    pairs
        .iter()
        .enumerate()
        .map(|(index, pair)| {
            if counts[&stem_key(&pair.topic)] > 1 {
                format!("{}_{}", pair.topic.trim(), index + 1)
            } else {
                pair.topic.clone()
            }
        })
        .collect()
}
