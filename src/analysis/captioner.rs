//! Frame captions: a vision LLM when one is configured, rules otherwise.

use crate::llm::{CompletionOptions, LlmError, LlmProvider, Message};
use crate::video_store::{ActivityLevel, Frame, Lighting, Setting};
use async_trait::async_trait;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const MAX_CAPTION_CHARS: usize = 300;
const NUMBER_WORDS: [&str; 10] = [
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
];

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("No frame image available")]
    MissingImage,

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Empty caption")]
    Empty,
}

#[async_trait]
pub trait Captioner: Send + Sync {
    fn name(&self) -> &str;

    /// Caption a frame whose detections and scene attributes are already filled.
    async fn caption(&self, frame: &Frame, jpeg: Option<&[u8]>) -> Result<String, CaptionError>;
}

/// English count phrase such as "two people" or "12 people".
pub fn people_phrase(count: usize) -> String {
    match count {
        0 => "no people".to_string(),
        1 => "one person".to_string(),
        n if n <= NUMBER_WORDS.len() => format!("{} people", NUMBER_WORDS[n - 1]),
        n => format!("{} people", n),
    }
}

/// Builds a caption from detections and scene attributes.
pub struct RuleBasedCaptioner;

impl RuleBasedCaptioner {
    pub fn describe(frame: &Frame) -> String {
        let mut parts = vec![format!("At {:.1}s", frame.timestamp)];

        parts.push(
            match frame.scene.setting {
                Setting::Indoor => "indoor scene",
                Setting::Outdoor => "outdoor scene",
            }
            .to_string(),
        );
        match frame.scene.lighting {
            Lighting::Dark => parts.push("dark lighting".to_string()),
            Lighting::Bright => parts.push("bright lighting".to_string()),
            Lighting::Normal => {}
        }

        let persons = &frame.persons;
        if !persons.is_empty() {
            parts.push(people_phrase(persons.len()));
            if persons.len() <= 3 {
                for person in persons {
                    let mut desc = Vec::new();
                    if person.gender != "person" {
                        desc.push(person.gender.replace('_', " "));
                    }
                    if person.age_group != "adult" || desc.is_empty() {
                        desc.push(person.age_group.replace('_', " "));
                    }
                    let mut text = desc.join(" ");
                    let colors: Vec<String> = [
                        (&person.upper_color, "top"),
                        (&person.lower_color, "bottom"),
                    ]
                    .into_iter()
                    .filter(|(color, _)| color.as_str() != "unknown")
                    .map(|(color, part)| format!("{} {}", color, part))
                    .collect();
                    if !colors.is_empty() {
                        text.push_str(&format!(" wearing {}", colors.join(" and ")));
                    }
                    parts.push(text);
                }
            }
        }

        let mut objects: Vec<&str> = Vec::new();
        for object in &frame.objects {
            if !objects.contains(&object.class_name.as_str()) {
                objects.push(&object.class_name);
            }
        }
        if !objects.is_empty() {
            objects.truncate(3);
            parts.push(format!("{} visible", objects.join(", ")));
        }

        match frame.scene.activity_level {
            ActivityLevel::High => parts.push("lively activity".to_string()),
            ActivityLevel::Low => parts.push("quiet scene".to_string()),
            ActivityLevel::Medium => {}
        }

        parts.join(", ")
    }
}

#[async_trait]
impl Captioner for RuleBasedCaptioner {
    fn name(&self) -> &str {
        "rules"
    }

    async fn caption(&self, frame: &Frame, _jpeg: Option<&[u8]>) -> Result<String, CaptionError> {
        Ok(Self::describe(frame))
    }
}

/// Asks a vision-capable model to describe the frame image.
pub struct LlmCaptioner {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl LlmCaptioner {
    pub fn new(provider: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    fn prompt(frame: &Frame) -> String {
        let colors: Vec<&str> = frame
            .dominant_colors
            .iter()
            .take(3)
            .map(|c| c.color.as_str())
            .collect();
        let color_line = if colors.is_empty() {
            String::new()
        } else {
            format!("Dominant colors: {}\n", colors.join(", "))
        };
        format!(
            "Write EXACTLY 2-3 sentences describing this frame. IMPORTANT: Include specific \
             gender and age information for each person visible.\n\n\
             Frame: {:.1}s, {} person(s)\n{}\n\
             Requirements:\n\
             - Describe each person's gender (man/woman/boy/girl) and approximate age (young/adult/elderly)\n\
             - Include clothing colors and actions\n\
             - Mention objects, setting, and atmosphere\n\
             - Be concise and specific\n\n\
             Caption:",
            frame.timestamp,
            frame.persons.len(),
            color_line
        )
    }
}

fn truncate_caption(caption: &str) -> String {
    if caption.chars().count() > MAX_CAPTION_CHARS {
        let cut: String = caption.chars().take(MAX_CAPTION_CHARS).collect();
        format!("{}...", cut)
    } else {
        caption.to_string()
    }
}

#[async_trait]
impl Captioner for LlmCaptioner {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn caption(&self, frame: &Frame, jpeg: Option<&[u8]>) -> Result<String, CaptionError> {
        let jpeg = jpeg.ok_or(CaptionError::MissingImage)?;
        let image = base64::engine::general_purpose::STANDARD.encode(jpeg);
        let options = CompletionOptions {
            temperature: 0.7,
            max_tokens: Some(150),
            timeout: self.timeout,
        };
        let response = self
            .provider
            .complete(&[Message::user_with_image(Self::prompt(frame), image)], &options)
            .await?;
        let caption = response.message.content.trim();
        if caption.is_empty() {
            return Err(CaptionError::Empty);
        }
        Ok(truncate_caption(caption))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionSource {
    Llm,
    Rules,
}

/// LLM captioner first (when configured), rules as the fallback.
pub struct CaptionChain {
    llm: Option<Arc<dyn Captioner>>,
}

impl CaptionChain {
    pub fn new(llm: Option<Arc<dyn Captioner>>) -> Self {
        Self { llm }
    }

    pub fn rules_only() -> Self {
        Self { llm: None }
    }

    pub async fn caption(&self, frame: &Frame, jpeg: Option<&[u8]>) -> (String, CaptionSource) {
        if let Some(llm) = &self.llm {
            match llm.caption(frame, jpeg).await {
                Ok(caption) => {
                    debug!("Frame {} captioned by {}", frame.image_id, llm.name());
                    return (caption, CaptionSource::Llm);
                }
                Err(e) => warn!("LLM caption failed for frame {}: {}", frame.image_id, e),
            }
        }
        (RuleBasedCaptioner::describe(frame), CaptionSource::Rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::quality::tests::frame;
    use crate::llm::{CompletionResponse, FinishReason};
    use crate::video_store::ObjectDetection;

    struct FixedProvider(Result<String, ()>);

    #[async_trait]
    impl LlmProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        fn model(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            messages: &[Message],
            _options: &CompletionOptions,
        ) -> Result<CompletionResponse, LlmError> {
            assert_eq!(messages[0].images.len(), 1);
            match &self.0 {
                Ok(text) => Ok(CompletionResponse {
                    message: Message::assistant(text.clone()),
                    finish_reason: FinishReason::Stop,
                    usage: None,
                }),
                Err(()) => Err(LlmError::Timeout),
            }
        }

        async fn health_check(&self) -> Result<(), LlmError> {
            Ok(())
        }
    }

    #[test]
    fn people_phrases_use_number_words() {
        assert_eq!(people_phrase(0), "no people");
        assert_eq!(people_phrase(1), "one person");
        assert_eq!(people_phrase(3), "three people");
        assert_eq!(people_phrase(10), "ten people");
        assert_eq!(people_phrase(12), "12 people");
    }

    #[test]
    fn rule_caption_describes_scene_people_and_objects() {
        let mut f = frame(1, 160.0, 0.06, 2);
        f.timestamp = 3.5;
        for class_name in ["car", "dog", "car"] {
            f.objects.push(ObjectDetection {
                id: 0,
                frame_id: 0,
                video_id: 0,
                class_name: class_name.to_string(),
                confidence: 0.9,
                bbox: [0.0, 0.0, 0.1, 0.1],
            });
        }
        let caption = RuleBasedCaptioner::describe(&f);
        assert_eq!(
            caption,
            "At 3.5s, outdoor scene, bright lighting, two people, \
             male young adult wearing red top and blue bottom, \
             male young adult wearing red top and blue bottom, \
             car, dog visible, lively activity"
        );
    }

    #[test]
    fn rule_caption_for_an_empty_dark_room() {
        let caption = RuleBasedCaptioner::describe(&frame(1, 40.0, 0.0, 0));
        assert_eq!(caption, "At 1.0s, indoor scene, dark lighting, quiet scene");
    }

    #[test]
    fn long_captions_are_truncated() {
        let long = "a".repeat(400);
        let cut = truncate_caption(&long);
        assert_eq!(cut.chars().count(), 303);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate_caption("short"), "short");
    }

    #[tokio::test]
    async fn chain_falls_back_to_rules() {
        let f = frame(1, 40.0, 0.0, 0);
        let llm: Arc<dyn Captioner> = Arc::new(LlmCaptioner::new(
            Arc::new(FixedProvider(Ok("  A quiet room.  ".to_string()))),
            Duration::from_secs(5),
        ));
        let chain = CaptionChain::new(Some(llm));
        assert_eq!(
            chain.caption(&f, Some(b"jpeg")).await,
            ("A quiet room.".to_string(), CaptionSource::Llm)
        );
        // No image means the LLM cannot be asked.
        assert_eq!(chain.caption(&f, None).await.1, CaptionSource::Rules);

        let failing: Arc<dyn Captioner> = Arc::new(LlmCaptioner::new(
            Arc::new(FixedProvider(Err(()))),
            Duration::from_secs(5),
        ));
        let chain = CaptionChain::new(Some(failing));
        assert_eq!(chain.caption(&f, Some(b"jpeg")).await.1, CaptionSource::Rules);
        assert_eq!(
            CaptionChain::rules_only().caption(&f, None).await.1,
            CaptionSource::Rules
        );
    }
}
