//! Common types for completion calls

/// One agent turn's completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Environment, roster, host instructions and the agent's own prompt
    pub instructions: String,
    /// User turn: the transcript wrapped for an agent, or an enrichment brief
    pub input: String,
    pub max_tokens: u32,
    pub model: String,
    /// Reasoning hint, sent only to models that accept one
    pub reasoning_effort: Option<String>,
}

/// What the model produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Text(String),
    /// The model declined; carries the refusal text
    Refusal(String),
}

impl Completion {
    pub fn text(s: impl Into<String>) -> Self {
        Completion::Text(s.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub completion: Completion,
    pub usage: Usage,
}

impl CompletionResponse {
    pub fn new(completion: Completion) -> Self {
        Self {
            completion,
            usage: Usage::default(),
        }
    }
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
