//! Instruction text for one agent turn
//!
//! Layers, outermost first: the shared environment description, the live
//! participant roster, the host's global instructions and finally the
//! agent's own prompt.

use crate::store::{AgentConfig, Settings, USER_AUTHOR};
use std::fmt::Write;

/// Exact reply (after trimming) that means "I have nothing to add"
pub const PASS_SENTINEL: &str = "[PASS]";

const FALLBACK_DESCRIPTION: &str = "AI assistant";
const DESCRIPTION_PREFIXES: &[&str] = &["You are ", "You're ", "Role:"];
const MAX_DESCRIPTION_CHARS: usize = 120;

const ENVIRONMENT: &str = "You are taking part in a multi-agent conversation. Several AI agents \
and a human user share one transcript and take turns writing to it. Each message in the \
transcript is headed by its index and its author.

Write only your own next message, in your own voice. Do not write messages for other \
participants and do not repeat the header format.

If you have nothing useful to add right now, reply with exactly [PASS] and nothing else. \
When every agent passes, the conversation waits for the human to speak.";

/// Instructions for expanding a short agent description into a full prompt
pub const ENRICH_INSTRUCTIONS: &str = "You are an expert at writing system prompts for AI agents.
Given a brief description, expand it into a detailed, effective system prompt.
Keep it focused and actionable. Include:
- Clear role definition
- Personality/tone guidance
- Key behaviors and rules
- What to emphasize or avoid

Return ONLY the improved prompt text, no explanations.";

/// Short description of an agent, taken from the first line of its prompt
fn describe(agent: &AgentConfig) -> String {
    let first_line = agent.prompt.lines().next().unwrap_or("").trim();

    let mut description = first_line;
    for prefix in DESCRIPTION_PREFIXES {
        if let Some(rest) = description.strip_prefix(prefix) {
            description = rest.trim_start();
            break;
        }
    }
    let description = description.trim_end_matches('.').trim();

    if description.is_empty() {
        return FALLBACK_DESCRIPTION.to_string();
    }
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        let cut: String = description.chars().take(MAX_DESCRIPTION_CHARS).collect();
        return format!("{cut}...");
    }
    description.to_string()
}

/// Roster listing with the current agent marked
pub fn build_participants_context(agents: &[AgentConfig], current: &str) -> String {
    let mut out = String::from("Current participants:\n");
    for agent in agents {
        let description = describe(agent);
        if agent.name == current {
            let _ = writeln!(out, "- {} (you): {description}", agent.name);
        } else {
            let _ = writeln!(out, "- {}: {description}", agent.name);
        }
    }
    let _ = writeln!(out, "- {USER_AUTHOR}: Human participant");
    out
}

/// Environment, roster and host instructions shared by every agent
pub fn build_global_context(agents: &[AgentConfig], current: &str, instructions: &str) -> String {
    let mut out = String::new();
    out.push_str(ENVIRONMENT);
    out.push_str("\n\n");
    out.push_str(&build_participants_context(agents, current));

    let instructions = instructions.trim();
    if !instructions.is_empty() {
        out.push_str("\nAdditional instructions from the session host:\n");
        out.push_str(instructions);
        out.push('\n');
    }
    out
}

/// Full instruction text for `agent` under the current settings
pub fn build_instructions(settings: &Settings, agent: &AgentConfig) -> String {
    let mut out = build_global_context(&settings.agents, &agent.name, &settings.global_prompt);
    let personal = agent.prompt.trim();
    if !personal.is_empty() {
        out.push_str("\nYour role:\n");
        out.push_str(personal);
        out.push('\n');
    }
    out
}

/// User turn that hands an agent the transcript
pub fn transcript_turn(transcript: &str) -> String {
    format!("Here is the conversation so far:\n\n{transcript}\n\nWrite your next message.")
}

/// User turn asking for an enriched prompt for `name`
pub fn enrich_brief(name: &str, description: &str) -> String {
    format!(
        "Agent name: {name}\n\nBrief description:\n{description}\n\nWrite an enriched system prompt:"
    )
}
