//! Per-model request capabilities
//!
//! Reasoning models take instructions in the `developer` role and accept a
//! reasoning effort; chat models use `system` and accept a temperature.

/// Role that carries the instruction text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionRole {
    System,
    Developer,
}

impl InstructionRole {
    pub fn as_str(self) -> &'static str {
        match self {
            InstructionRole::System => "system",
            InstructionRole::Developer => "developer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    pub role: InstructionRole,
    pub supports_temperature: bool,
    pub supports_reasoning_effort: bool,
}

const CHAT: ModelCapabilities = ModelCapabilities {
    role: InstructionRole::System,
    supports_temperature: true,
    supports_reasoning_effort: false,
};

const REASONING: ModelCapabilities = ModelCapabilities {
    role: InstructionRole::Developer,
    supports_temperature: false,
    supports_reasoning_effort: true,
};

const REASONING_NO_EFFORT: ModelCapabilities = ModelCapabilities {
    role: InstructionRole::Developer,
    supports_temperature: false,
    supports_reasoning_effort: false,
};

/// Known model ids
const KNOWN_MODELS: &[(&str, ModelCapabilities)] = &[
    ("gpt-4o", CHAT),
    ("gpt-4o-mini", CHAT),
    ("gpt-4.1", CHAT),
    ("gpt-4.1-mini", CHAT),
    ("gpt-4.1-nano", CHAT),
    ("gpt-4-turbo", CHAT),
    ("gpt-3.5-turbo", CHAT),
    ("o1", REASONING),
    ("o1-mini", REASONING_NO_EFFORT),
    ("o3", REASONING),
    ("o3-mini", REASONING),
    ("o4-mini", REASONING),
    ("gpt-5.2", REASONING),
];

/// Capabilities for `model`, guessed from its prefix when unknown
pub fn capabilities(model: &str) -> ModelCapabilities {
    if let Some((_, caps)) = KNOWN_MODELS.iter().find(|(id, _)| *id == model) {
        return *caps;
    }
    if ["o1", "o3", "o4", "gpt-5"]
        .iter()
        .any(|prefix| model.starts_with(prefix))
    {
        return REASONING;
    }
    CHAT
}
