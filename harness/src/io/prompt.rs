//! Prompt pack builder for deterministic Deciding input.

use minijinja::{Environment, context};
use serde_json::Value;
use tracing::debug;

use crate::core::transcript::TranscriptEntry;

const DECIDE_TEMPLATE: &str = include_str!("prompts/decide.md");

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("decide", DECIDE_TEMPLATE)
            .expect("decide template should be valid");
        Self { env }
    }

    fn render_decide(&self, input: &PromptInputs) -> Result<String, minijinja::Error> {
        let template = self.env.get_template("decide")?;
        template.render(context! {
            goal => input.goal.trim(),
            catalog => input.catalog.trim(),
            snapshot => input.snapshot.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            transcript => input.transcript.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            turn => input.turn,
            max_turns => input.max_turns,
        })
    }
}

/// A parsed section from rendered template output.
#[derive(Debug, Clone)]
struct ParsedSection {
    /// Section identifier (e.g., "contract", "state").
    key: String,
    /// Whether this section is required (cannot be dropped).
    required: bool,
    /// Full section content including header.
    content: String,
}

/// Parse sections from rendered template output using HTML comment markers.
///
/// Markers follow format: `<!-- section:KEY required|droppable -->`
fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    use std::sync::LazyLock;
    static SECTION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
        regex::Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->").unwrap()
    });

    let mut sections = Vec::new();
    let matches: Vec<_> = SECTION_RE.captures_iter(rendered).collect();

    for (i, caps) in matches.iter().enumerate() {
        let key = caps.get(1).unwrap().as_str().to_string();
        let required = caps.get(2).unwrap().as_str() == "required";
        let start = caps.get(0).unwrap().end();
        let end = matches
            .get(i + 1)
            .map(|m| m.get(0).unwrap().start())
            .unwrap_or(rendered.len());

        let content = rendered[start..end].trim().to_string();
        if !content.is_empty() || required {
            sections.push(ParsedSection {
                key,
                required,
                content,
            });
        }
    }

    sections
}

/// Apply budget to parsed sections, dropping droppable sections as needed.
///
/// Drop order: transcript -> state. The transcript goes first because older
/// information survives in the structured state snapshot.
fn apply_budget_to_sections(sections: &mut Vec<ParsedSection>, budget: usize) {
    let total_len =
        |secs: &[ParsedSection]| -> usize { secs.iter().map(|s| s.content.len()).sum() };

    if total_len(sections) <= budget {
        return;
    }

    let drop_order = ["transcript", "state"];
    for key in drop_order {
        if total_len(sections) <= budget {
            break;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            let dropped_len = sections[idx].content.len();
            debug!(
                section = key,
                bytes_dropped = dropped_len,
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }

    // If still over budget, truncate the last section
    if total_len(sections) > budget && !sections.is_empty() {
        let other_len: usize = sections
            .iter()
            .take(sections.len() - 1)
            .map(|s| s.content.len())
            .sum();
        let allowed = budget.saturating_sub(other_len);
        let last = sections.last_mut().unwrap();
        let before_len = last.content.len();
        if last.content.len() > allowed {
            if allowed > 12 {
                last.content.truncate(allowed - 12);
                last.content.push_str("\n[truncated]");
            } else {
                last.content.truncate(allowed);
            }
            debug!(
                section = last.key,
                before_len,
                after_len = last.content.len(),
                "truncated section for budget"
            );
        }
    }
}

/// Render sections back to a single string.
fn render_sections(sections: &[ParsedSection]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// All inputs needed to build a Deciding prompt.
#[derive(Debug, Clone)]
pub struct PromptInputs {
    /// The user goal text.
    pub goal: String,
    /// Declared action catalog as pretty-printed JSON.
    pub catalog: String,
    /// Serialized trial state snapshot; `None` in the baseline condition.
    pub snapshot: Option<String>,
    /// Rendered transcript window; `None` when empty.
    pub transcript: Option<String>,
    /// Turn about to run (1-indexed).
    pub turn: u32,
    /// Configured turn budget.
    pub max_turns: u32,
}

/// Render the bounded transcript window, one line per entry.
pub fn render_transcript(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            format!(
                "[turn {} {}] {}",
                entry.turn_index,
                entry.role.as_str(),
                compact(&entry.payload)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn compact(payload: &Value) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| payload.to_string())
}

/// Builds a prompt pack within a byte budget, dropping less critical sections first.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    /// Create a builder with the given byte budget.
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    /// Build the Deciding prompt pack.
    pub fn build(&self, input: &PromptInputs) -> PromptPack {
        let engine = PromptEngine::new();
        let rendered = engine
            .render_decide(input)
            .expect("decide template rendering should not fail");

        let mut sections = parse_sections(&rendered);
        apply_budget_to_sections(&mut sections, self.budget_bytes);

        PromptPack {
            content: render_sections(&sections),
        }
    }
}

/// A rendered prompt ready to send to the agent.
#[derive(Debug, Clone)]
pub struct PromptPack {
    content: String,
}

impl PromptPack {
    /// Get the rendered prompt content.
    pub fn render(&self) -> String {
        self.content.clone()
    }
}
