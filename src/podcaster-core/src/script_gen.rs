//! Script drafting through an OpenAI-compatible chat endpoint.
//!
//! The model is asked for a JSON document describing the podcast; the result
//! is validated and rendered into the `Headline:` / `Text:` script format.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::PodcastError;
use crate::script::{ScriptSegment, SegmentKind, render_script};

/// Placeholder id used when the paper id is unknown (e.g. PDF input).
pub const UNKNOWN_PAPER_ID: &str = "paper_id";

/// Settings for the script-generation call.
#[derive(Debug, Clone)]
pub struct ScriptGenConfig {
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// API key for authentication.
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: u32,
    /// Times the model is asked to fix a script that failed validation.
    pub max_corrections: u32,
}

impl ScriptGenConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: "https://openrouter.ai/api/v1".to_string(),
            api_key: api_key.into(),
            model: "qwen/qwen3-235b-a22b-thinking-2507".to_string(),
            temperature: 0.1,
            max_tokens: 8000,
            max_retries: 3,
            max_corrections: 2,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// One component of a drafted script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptComponent {
    pub component_type: String,
    pub content: String,
    pub position: usize,
}

/// The structured script returned by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedScript {
    pub title: String,
    pub paper_id: String,
    pub target_duration_minutes: f32,
    pub components: Vec<ScriptComponent>,
}

impl GeneratedScript {
    /// Check structure, sort components by position and return the segments.
    pub fn validate(mut self, expected_paper_id: &str) -> Result<(Self, Vec<ScriptSegment>), PodcastError> {
        let mut errors = Vec::new();

        if self.components.is_empty() {
            return Err(PodcastError::ScriptGeneration(
                "script must contain at least one component".to_string(),
            ));
        }

        if expected_paper_id != UNKNOWN_PAPER_ID && self.paper_id.trim() != expected_paper_id {
            errors.push(format!(
                "the paper id is {}, but the script says {}; correct it everywhere",
                expected_paper_id, self.paper_id
            ));
        }

        if !(0.0..=6.0).contains(&self.target_duration_minutes) {
            errors.push(format!(
                "target duration {} minutes is outside 0-6",
                self.target_duration_minutes
            ));
        }

        self.components.sort_by_key(|c| c.position);
        let consecutive = self
            .components
            .iter()
            .enumerate()
            .all(|(i, c)| c.position == i);
        if !consecutive {
            errors.push("component positions must be consecutive integers starting from 0".to_string());
        }

        let mut kinds = Vec::with_capacity(self.components.len());
        for component in &self.components {
            match parse_component_type(&component.component_type) {
                Some(kind) => kinds.push(kind),
                None => errors.push(format!(
                    "'{}' is not a valid component_type (expected Text or Headline)",
                    component.component_type.trim()
                )),
            }
        }

        if kinds.len() == self.components.len() {
            if kinds.first() != Some(&SegmentKind::Headline) {
                errors.push("script must start with a Headline component".to_string());
            }
            if kinds
                .windows(2)
                .any(|w| w[0] == SegmentKind::Headline && w[1] == SegmentKind::Headline)
            {
                errors.push("consecutive Headline components are not allowed".to_string());
            }
        }

        if !errors.is_empty() {
            return Err(PodcastError::ScriptGeneration(errors.join("; ")));
        }

        let segments = self
            .components
            .iter()
            .zip(kinds)
            .enumerate()
            .map(|(order, (component, kind))| ScriptSegment {
                kind,
                content: component.content.trim().to_string(),
                order,
            })
            .collect();

        Ok((self, segments))
    }
}

fn parse_component_type(value: &str) -> Option<SegmentKind> {
    match value.trim() {
        "Headline" => Some(SegmentKind::Headline),
        "Text" => Some(SegmentKind::Text),
        _ => None,
    }
}

/// Drafts podcast scripts from paper text.
pub struct ScriptGenerator {
    config: ScriptGenConfig,
    client: Client<OpenAIConfig>,
}

impl ScriptGenerator {
    pub fn new(config: ScriptGenConfig) -> Result<Self, PodcastError> {
        if config.api_key.trim().is_empty() {
            return Err(PodcastError::Config(
                "an API key is required for script generation".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PodcastError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.api_base);
        let client = Client::with_config(openai_config).with_http_client(http_client);

        Ok(Self { config, client })
    }

    /// Draft, validate and render a script. Returns the script text.
    ///
    /// A reply that does not parse or validate is sent back to the model with
    /// the errors, up to `max_corrections` times.
    pub async fn generate(&self, paper: &str, paper_id: &str) -> Result<String, PodcastError> {
        let (script, segments) = draft_until_valid(
            move |messages| self.get_completion(messages),
            initial_messages(paper, paper_id),
            paper_id,
            self.config.max_corrections,
        )
        .await?;

        info!(
            title = %script.title,
            components = segments.len(),
            "Script generated"
        );
        Ok(render_script(&segments))
    }

    /// Get a completion, retrying transport errors with exponential backoff.
    async fn get_completion(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<String, PodcastError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .temperature(self.config.temperature)
            .max_completion_tokens(self.config.max_tokens)
            .messages(messages)
            .build()?;

        let max_retries = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..max_retries {
            if attempt > 0 {
                // Exponential backoff: 2s, 4s
                let delay = Duration::from_secs(1 << attempt);
                tokio::time::sleep(delay).await;
            }

            match self.client.chat().create(request.clone()).await {
                Ok(response) => {
                    let content = response
                        .choices
                        .first()
                        .and_then(|c| c.message.content.clone())
                        .unwrap_or_default();
                    if content.trim().is_empty() {
                        warn!(attempt = attempt + 1, "Empty completion from script model");
                        continue;
                    }
                    return Ok(content);
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, "Script completion failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.map(PodcastError::from).unwrap_or_else(|| {
            PodcastError::ScriptGeneration(format!(
                "model returned empty responses after {} attempts",
                max_retries
            ))
        }))
    }
}

fn initial_messages(paper: &str, paper_id: &str) -> Vec<ChatCompletionRequestMessage> {
    vec![
        ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
            content: SYSTEM_PROMPT.to_string().into(),
            name: None,
        }),
        ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: format!(
                "Here is the paper to turn into a podcast script. Its paper_id is {}:\n\n{}",
                paper_id, paper
            )
            .into(),
            name: None,
        }),
    ]
}

/// Ask for a script until one validates or the corrections run out.
async fn draft_until_valid<F, Fut>(
    mut complete: F,
    mut messages: Vec<ChatCompletionRequestMessage>,
    paper_id: &str,
    max_corrections: u32,
) -> Result<(GeneratedScript, Vec<ScriptSegment>), PodcastError>
where
    F: FnMut(Vec<ChatCompletionRequestMessage>) -> Fut,
    Fut: Future<Output = Result<String, PodcastError>>,
{
    let mut corrections = 0;
    loop {
        let response = complete(messages.clone()).await?;
        let error = match parse_generated_script(&response).and_then(|s| s.validate(paper_id)) {
            Ok(validated) => return Ok(validated),
            Err(e) => e,
        };

        if corrections >= max_corrections {
            return Err(error);
        }
        corrections += 1;
        warn!(
            correction = corrections,
            max = max_corrections,
            "Drafted script rejected: {}",
            error
        );

        messages.push(ChatCompletionRequestMessage::Assistant(
            ChatCompletionRequestAssistantMessage {
                content: Some(response.into()),
                name: None,
                tool_calls: None,
                refusal: None,
                audio: None,
                function_call: None,
            },
        ));
        messages.push(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage {
                content: correction_prompt(&error).into(),
                name: None,
            },
        ));
    }
}

fn correction_prompt(error: &PodcastError) -> String {
    format!(
        "Your script was rejected: {}. Fix these problems and answer again with the complete \
         corrected JSON object only.",
        error
    )
}

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("valid regex"));

/// Parse model output into a [`GeneratedScript`].
pub fn parse_generated_script(response: &str) -> Result<GeneratedScript, PodcastError> {
    let cleaned = strip_reasoning(response);
    let body = CODE_FENCE
        .captures(&cleaned)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(&cleaned);

    serde_json::from_str(body)
        .map_err(|e| PodcastError::ScriptGeneration(format!("model output is not valid script JSON: {}", e)))
}

/// Strip reasoning blocks such as `<think>...</think>` from model output.
fn strip_reasoning(response: &str) -> String {
    let tags_to_strip = ["thinking", "think", "reasoning", "reflection", "scratchpad"];

    let mut result = response.to_string();
    for tag in &tags_to_strip {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }

    result.trim().to_string()
}

const SYSTEM_PROMPT: &str = r#"You write scripts for a podcast that explains research papers to an audience of academics, students and practitioners.

GOAL:
Write a script for an episode of five to six minutes about the paper you receive.

STYLE:
- Engaging, clear and concise, with short sentences that sound natural when spoken
- Make the research accessible without losing rigor
- Never use markdown lists, bullet points, tables or formatting of any kind

FORMAT:
Answer with a single JSON object and nothing else:
{
    "title": "<title of the paper>",
    "paper_id": "<the paper id you were given>",
    "target_duration_minutes": <number between 0 and 6>,
    "components": [
        { "component_type": "Headline", "content": "...", "position": 0 },
        { "component_type": "Text", "content": "...", "position": 1 }
    ]
}

RULES FOR COMPONENTS:
- component_type is either "Headline" or "Text"
- positions are consecutive integers starting at 0
- the first component is a Headline, and two Headlines never follow each other
- Headlines are complete conversational sentences such as "Let's explore how..." or "Here's why this approach works", never title-case phrases
- Text is the narration that follows a Headline
- Do not mention figures, links or images
"#;
