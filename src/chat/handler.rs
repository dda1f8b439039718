//! Answers chat messages, with or without a video in scope.

use super::frame_search::{search_by_color, search_by_keywords};
use super::highlights::{chat_highlights, extract_highlights, Highlight, HighlightCriteria};
use super::intent::{classify, ChatIntent, SummaryType};
use super::memory::ConversationMemory;
use super::people::{analyze_gender_ratio, analyze_people_count, PeopleEstimate};
use super::summary::{summarize_video, VideoSummaryReport};
use super::ChatError;
use crate::analysis::people_phrase;
use crate::config::LlmSettings;
use crate::llm::{CompletionOptions, LlmProvider, Message};
use crate::video_store::{AnalysisSummary, ChatMessage, ChatSession, Frame, Video, VideoStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_PROMPT_FRAMES: usize = 5;
const MAX_REFERENCED_FRAMES: usize = 10;
const OVERVIEW_SAMPLES: usize = 5;
const INTEGRATION_TEMPERATURE: f32 = 0.5;

const SYSTEM_PROMPT: &str = "You answer questions about videos. Frame captions and detection \
statistics from an automatic analysis are given with each question; rely on them and do not \
invent details they do not support.";

const NO_MODEL_ANSWER: &str =
    "No language model is available to answer general questions right now.";

/// URL under which the JPEG of a sampled frame is served.
pub fn frame_image_url(video_id: i64, image_id: i64) -> String {
    format!("/v1/videos/{}/frames/{}/image", video_id, image_id)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub video_id: Option<i64>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferencedFrame {
    pub image_id: i64,
    pub timestamp: f64,
    pub caption: Option<String>,
    pub person_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_score: Option<u32>,
    pub image_url: String,
}

impl ReferencedFrame {
    pub fn new(video_id: i64, frame: &Frame, match_score: Option<u32>) -> Self {
        Self {
            image_id: frame.image_id,
            timestamp: frame.timestamp,
            caption: frame.caption.clone(),
            person_count: frame.persons.len(),
            match_score,
            image_url: frame_image_url(video_id, frame.image_id),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub session_id: String,
    pub video_id: Option<i64>,
    pub intent: &'static str,
    pub is_video_related: bool,
    pub answer: String,
    /// Answer of each model that responded, keyed by `provider/model`.
    pub individual_responses: BTreeMap<String, String>,
    pub frames: Vec<ReferencedFrame>,
    pub frame_images: Vec<String>,
}

/// What the stored analysis says about a question.
struct Findings<'a> {
    /// Facts placed before the frame list in the prompt.
    context: String,
    /// Answer used when no model responds.
    fallback: String,
    frames: Vec<(&'a Frame, Option<u32>)>,
    ask_models: bool,
}

impl<'a> Findings<'a> {
    fn final_answer(fallback: String) -> Self {
        Self {
            context: String::new(),
            fallback,
            frames: Vec::new(),
            ask_models: false,
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn frame_line(index: usize, frame: &Frame, max_caption: usize) -> String {
    format!(
        "{}. [{:.1}s] {} ({})",
        index,
        frame.timestamp,
        truncate_chars(frame.caption.as_deref().unwrap_or("no caption"), max_caption),
        people_phrase(frame.persons.len())
    )
}

fn frame_list(frames: &[(&Frame, Option<u32>)]) -> String {
    frames
        .iter()
        .take(MAX_PROMPT_FRAMES)
        .enumerate()
        .map(|(i, (frame, _))| frame_line(i + 1, frame, 200))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A few frames spread over the whole video.
fn overview(frames: &[Frame]) -> String {
    let step = (frames.len() / OVERVIEW_SAMPLES).max(1);
    frames
        .iter()
        .step_by(step)
        .take(OVERVIEW_SAMPLES)
        .map(|f| {
            format!(
                "- [{:.1}s] {}",
                f.timestamp,
                truncate_chars(f.caption.as_deref().unwrap_or("no caption"), 150)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn gather<'a>(
    intent: &ChatIntent,
    video: &Video,
    frames: &'a [Frame],
    summary: Option<&AnalysisSummary>,
) -> Findings<'a> {
    if frames.is_empty() {
        return Findings::final_answer(format!(
            "\"{}\" has not been analyzed yet (status: {}).",
            video.original_name, video.analysis_status
        ));
    }
    let by_id = |image_id: i64| frames.iter().find(|f| f.image_id == image_id);

    match intent {
        ChatIntent::Summary(summary_type) => {
            let report = summarize_video(video, frames, summary, *summary_type);
            Findings {
                context: format!("Video summary ({}):\n{}", summary_type.as_str(), report.summary),
                fallback: report.summary,
                frames: chat_highlights(frames).into_iter().map(|f| (f, None)).collect(),
                ask_models: true,
            }
        }
        ChatIntent::Highlights => {
            let picked: Vec<(&Frame, Option<u32>)> =
                chat_highlights(frames).into_iter().map(|f| (f, None)).collect();
            Findings {
                context: format!(
                    "The {} frames below are the highlight scenes of the video.",
                    picked.len()
                ),
                fallback: format!("Highlight scenes:\n{}", frame_list(&picked)),
                frames: picked,
                ask_models: true,
            }
        }
        ChatIntent::PeopleCount => {
            let analysis = analyze_people_count(frames);
            let mut context = format!(
                "Distinct people in the whole video. The same people appear in many frames, so \
                 per-frame counts must not be added up.\n- Estimate: {}\n- Confidence: {}\n- Basis: {}",
                analysis.estimated_count,
                analysis.confidence.as_str(),
                analysis.explanation
            );
            for (i, evidence) in analysis.evidence.iter().take(MAX_PROMPT_FRAMES).enumerate() {
                context.push_str(&format!(
                    "\n{}. [{:.1}s] {}",
                    i + 1,
                    evidence.timestamp,
                    people_phrase(evidence.count)
                ));
            }
            let fallback = match analysis.estimated_count {
                PeopleEstimate::Exact(n) => format!(
                    "About {} {} in the video ({} confidence). {}",
                    people_phrase(n),
                    if n == 1 { "appears" } else { "appear" },
                    analysis.confidence.as_str(),
                    analysis.explanation
                ),
                _ => analysis.explanation.clone(),
            };
            Findings {
                context,
                fallback,
                frames: analysis
                    .peak_evidence()
                    .filter_map(|e| by_id(e.image_id))
                    .map(|f| (f, None))
                    .collect(),
                ask_models: true,
            }
        }
        ChatIntent::GenderRatio => {
            let analysis = analyze_gender_ratio(frames);
            let mut context = format!(
                "Gender breakdown of the video:\n- Male: {} ({:.1}%)\n- Female: {} ({:.1}%)\n\
                 - People with a known gender: {}\n- Confidence: {}\n- Basis: {}\n\
                 Some people may have no known gender, so totals can differ from the head count.",
                analysis.male_count,
                analysis.male_ratio,
                analysis.female_count,
                analysis.female_ratio,
                analysis.total_gendered,
                analysis.confidence.as_str(),
                analysis.explanation
            );
            for (i, evidence) in analysis.evidence.iter().take(MAX_PROMPT_FRAMES).enumerate() {
                context.push_str(&format!(
                    "\n{}. [{:.1}s] {} male, {} female",
                    i + 1,
                    evidence.timestamp,
                    evidence.males,
                    evidence.females
                ));
            }
            Findings {
                context,
                fallback: analysis.explanation.clone(),
                frames: analysis
                    .evidence
                    .iter()
                    .take(3)
                    .filter_map(|e| by_id(e.image_id))
                    .map(|f| (f, None))
                    .collect(),
                ask_models: true,
            }
        }
        ChatIntent::ColorSearch(color) => {
            let matches: Vec<(&Frame, Option<u32>)> = search_by_color(frames, color)
                .into_iter()
                .map(|m| (m.frame, Some(m.score)))
                .collect();
            if matches.is_empty() {
                return Findings::final_answer(format!(
                    "No one wearing {} was found in the video.",
                    color
                ));
            }
            Findings {
                context: format!("Frames where {} appears:", color),
                fallback: format!("Frames where {} appears:\n{}", color, frame_list(&matches)),
                frames: matches,
                ask_models: true,
            }
        }
        ChatIntent::KeywordSearch(keywords) => {
            let matches: Vec<(&Frame, Option<u32>)> = search_by_keywords(frames, keywords)
                .into_iter()
                .map(|m| (m.frame, Some(m.score)))
                .collect();
            let fallback = if matches.is_empty() {
                format!(
                    "No frame matched {}. Overview of the video:\n{}",
                    keywords.join(", "),
                    overview(frames)
                )
            } else {
                format!("Frames matching your question:\n{}", frame_list(&matches))
            };
            Findings {
                context: String::new(),
                fallback,
                frames: matches,
                ask_models: true,
            }
        }
        ChatIntent::Overview | ChatIntent::General => Findings {
            context: String::new(),
            fallback: format!("Overview of the video:\n{}", overview(frames)),
            frames: Vec::new(),
            ask_models: true,
        },
    }
}

fn video_prompt(video: &Video, frames: &[Frame], findings: &Findings, question: &str) -> String {
    let mut prompt = format!(
        "Video information:\n- Name: {}\n- Sampled frames: {}\n- Duration: {:.1}s\n",
        video.original_name,
        frames.len(),
        video.duration.unwrap_or_default()
    );
    if !findings.context.is_empty() {
        prompt.push_str(&format!("\n{}\n", findings.context));
    }
    if findings.frames.is_empty() {
        prompt.push_str(&format!("\nMain content of the video:\n{}\n", overview(frames)));
    } else {
        prompt.push_str(&format!(
            "\nRelevant frames ({}):\n{}\n",
            findings.frames.len(),
            frame_list(&findings.frames)
        ));
    }
    prompt.push_str(&format!(
        "\nUser question: {}\n\nAnswer requirements:\n\
         1. Give only the essentials, in at most 3-4 sentences\n\
         2. Answer the question directly\n\
         3. Skip unnecessary explanations\n\
         4. Answer in the language of the question",
        question
    ));
    prompt
}

fn general_prompt(question: &str) -> String {
    format!(
        "Answer the user's question concisely and in a friendly tone.\n\n\
         User question: {}\n\nAnswer requirements:\n\
         1. Give only the essentials, in at most 2-3 sentences\n\
         2. Keep a friendly tone\n\
         3. Skip unnecessary explanations\n\
         4. Answer in the language of the question",
        question
    )
}

fn integration_prompt(question: &str, answers: &[(String, String)]) -> String {
    let responses: String = answers
        .iter()
        .map(|(model, answer)| format!("### {}:\n{}\n\n", model.to_uppercase(), answer))
        .collect();
    format!(
        "Several AI models answered the same question. Merge their answers into one concise \
         answer.\n\nQuestion: {}\n\n{}Requirements:\n\
         1. Keep only the key content, in at most 3-4 sentences\n\
         2. Answer the question directly\n\
         3. Skip unnecessary explanations\n\
         4. Answer in the language of the question\n\nMerged answer:",
        question, responses
    )
}

fn referenced(video_id: i64, frames: &[(&Frame, Option<u32>)]) -> Vec<ReferencedFrame> {
    frames
        .iter()
        .take(MAX_REFERENCED_FRAMES)
        .map(|(frame, score)| ReferencedFrame::new(video_id, frame, *score))
        .collect()
}

pub struct VideoChatHandler {
    store: Arc<dyn VideoStore>,
    /// In priority order; the first one merges multi-model answers.
    providers: Vec<Arc<dyn LlmProvider>>,
    options: CompletionOptions,
    memory: ConversationMemory,
}

impl VideoChatHandler {
    pub fn new(
        store: Arc<dyn VideoStore>,
        providers: Vec<Arc<dyn LlmProvider>>,
        settings: &LlmSettings,
    ) -> Self {
        Self {
            memory: ConversationMemory::new(store.clone(), settings.history_messages),
            store,
            providers,
            options: CompletionOptions {
                temperature: settings.temperature,
                max_tokens: Some(500),
                timeout: Duration::from_secs(settings.timeout_sec),
            },
        }
    }

    pub fn has_llm(&self) -> bool {
        !self.providers.is_empty()
    }

    fn load_video(&self, video_id: i64) -> Result<Video, ChatError> {
        self.store
            .get_video(video_id)?
            .ok_or(ChatError::VideoNotFound(video_id))
    }

    pub async fn handle(&self, request: ChatRequest) -> Result<ChatReply, ChatError> {
        let question = request.message.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let requested_video = request
            .video_id
            .map(|id| self.load_video(id))
            .transpose()?;
        let session = self
            .memory
            .open_session(request.session_id.as_deref(), request.video_id)?;
        let video = match requested_video {
            Some(video) => Some(video),
            None => session.video_id.map(|id| self.load_video(id)).transpose()?,
        };
        let history = self.memory.history(&session.id)?;

        let intent = if video.is_some() {
            classify(question)
        } else {
            ChatIntent::General
        };
        info!(
            "Chat session {} video {:?}: {} question",
            session.id,
            video.as_ref().map(|v| v.id),
            intent.name()
        );

        let (answer, individual_responses, frames) = match &video {
            Some(video) if intent.is_video_related() => {
                let frames = self.store.get_frames(video.id)?;
                let summary = self.store.get_summary(video.id)?;
                let findings = gather(&intent, video, &frames, summary.as_ref());

                let (answer, individual) = if findings.ask_models {
                    let prompt = video_prompt(video, &frames, &findings, question);
                    self.answer(question, prompt, history, findings.fallback.clone())
                        .await
                } else {
                    (findings.fallback.clone(), BTreeMap::new())
                };
                (answer, individual, referenced(video.id, &findings.frames))
            }
            _ => {
                let (answer, individual) = self
                    .answer(
                        question,
                        general_prompt(question),
                        history,
                        NO_MODEL_ANSWER.to_string(),
                    )
                    .await;
                (answer, individual, Vec::new())
            }
        };

        let frame_ids: Vec<i64> = frames.iter().map(|f| f.image_id).collect();
        self.memory
            .record_exchange(&session.id, question, &answer, &frame_ids)?;

        Ok(ChatReply {
            session_id: session.id,
            video_id: video.as_ref().map(|v| v.id),
            intent: intent.name(),
            is_video_related: intent.is_video_related(),
            answer,
            individual_responses,
            frame_images: frames.iter().map(|f| f.image_url.clone()).collect(),
            frames,
        })
    }

    /// Ask every model, then merge. Falls back to `fallback` when none answers.
    async fn answer(
        &self,
        question: &str,
        prompt: String,
        history: Vec<Message>,
        fallback: String,
    ) -> (String, BTreeMap<String, String>) {
        if self.providers.is_empty() {
            return (fallback, BTreeMap::new());
        }
        let mut messages = vec![Message::system(SYSTEM_PROMPT)];
        messages.extend(history);
        messages.push(Message::user(prompt));

        let answers = self.ask_all(&messages).await;
        if answers.is_empty() {
            warn!("No model answered, using the analysis findings");
            return (fallback, BTreeMap::new());
        }
        let merged = self.integrate(question, &answers).await;
        (merged, answers.into_iter().collect())
    }

    async fn ask_all(&self, messages: &[Message]) -> Vec<(String, String)> {
        let requests = self.providers.iter().map(|provider| async move {
            let key = format!("{}/{}", provider.name(), provider.model());
            (key, provider.complete(messages, &self.options).await)
        });

        let mut answers = Vec::new();
        for (key, result) in futures::future::join_all(requests).await {
            match result {
                Ok(response) => {
                    let text = response.message.content.trim().to_string();
                    if text.is_empty() {
                        warn!("{} returned an empty answer", key);
                    } else {
                        debug!("{} answered ({} chars)", key, text.len());
                        answers.push((key, text));
                    }
                }
                Err(e) => warn!("{} failed to answer: {}", key, e),
            }
        }
        answers
    }

    async fn integrate(&self, question: &str, answers: &[(String, String)]) -> String {
        let Some((_, first_answer)) = answers.first() else {
            return String::new();
        };
        if answers.len() == 1 {
            return first_answer.clone();
        }
        let Some(integrator) = self.providers.first() else {
            return first_answer.clone();
        };

        let options = CompletionOptions {
            temperature: INTEGRATION_TEMPERATURE,
            max_tokens: Some(800),
            ..self.options.clone()
        };
        let messages = [Message::user(integration_prompt(question, answers))];
        let mut merged = match integrator.complete(&messages, &options).await {
            Ok(response) if !response.message.content.trim().is_empty() => {
                response.message.content.trim().to_string()
            }
            Ok(_) => first_answer.clone(),
            Err(e) => {
                warn!("Merging answers with {} failed: {}", integrator.name(), e);
                first_answer.clone()
            }
        };

        let models: Vec<&str> = answers.iter().map(|(model, _)| model.as_str()).collect();
        merged.push_str(&format!("\n\n---\nAnswers from: {}", models.join(", ")));
        merged
    }

    /// Text summary of an analyzed video.
    pub fn summarize(
        &self,
        video_id: i64,
        summary_type: SummaryType,
    ) -> Result<VideoSummaryReport, ChatError> {
        let video = self.load_video(video_id)?;
        let frames = self.store.get_frames(video_id)?;
        let summary = self.store.get_summary(video_id)?;
        Ok(summarize_video(&video, &frames, summary.as_ref(), summary_type))
    }

    pub fn highlights(
        &self,
        video_id: i64,
        criteria: &HighlightCriteria,
    ) -> Result<(Video, Vec<Highlight>), ChatError> {
        let video = self.load_video(video_id)?;
        let frames = self.store.get_frames(video_id)?;
        let highlights = extract_highlights(&frames, criteria);
        Ok((video, highlights))
    }

    pub fn transcript(
        &self,
        session_id: &str,
    ) -> Result<(ChatSession, Vec<ChatMessage>), ChatError> {
        self.memory.transcript(session_id)
    }
}
