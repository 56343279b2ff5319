//! Prompts for the extraction and synthesis calls, plus parsing of the
//! extractor's JSON reply.

use std::sync::LazyLock;

use regex::Regex;

use super::model::{DialogueTurn, Profile, Speaker, SynopsisField};
use super::research::ResearchItem;

/// Fixed response when the extraction call fails.
pub const EXTRACTION_FAILED_RESPONSE: &str = "An error occurred during AI processing. Please try again.";

/// Fixed response when the extractor replied without any text for the user.
pub const EMPTY_REPLY_RESPONSE: &str = "I'm not sure what to say, can you rephrase?";

/// Fixed synthesis text when the analysis call fails.
pub const ANALYSIS_UNAVAILABLE: &str = "Analysis unavailable at the moment.";

/// Fixed text when the suggestions call fails.
pub const SUGGESTIONS_UNAVAILABLE: &str = "Suggestions unavailable at the moment.";

/// Display annotation appended when automatic research ran.
pub const RESEARCH_NOTICE: &str = "\
**Auto-research complete.** I looked up similar repositories and related papers \
for your project and drafted a short analysis. It will be folded into your synopsis.";

/// Display annotation appended the first time the profile is ready.
pub const READY_NOTICE: &str = "\
**Ready for synopsis generation!** I have enough information to generate your \
synopsis. Ask me to create it, or use the generate action.";

const EXTRACTION_SYSTEM: &str = "\
You are a research assistant helping a student build an academic project synopsis \
through natural conversation. You output only valid JSON, with no comments.";

/// Build the single-shot extraction prompt for one user turn.
pub fn extraction_prompt(profile: &Profile, history: &[DialogueTurn], utterance: &str) -> String {
    let memory = serde_json::to_string_pretty(profile).unwrap_or_else(|_| "{}".to_string());
    let history_text = if history.is_empty() {
        "(no earlier messages)".to_string()
    } else {
        history
            .iter()
            .map(|t| {
                let who = match t.role {
                    Speaker::User => "User",
                    Speaker::Assistant => "Assistant",
                };
                format!("{who}: {}", t.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    let keys = SynopsisField::ALL
        .iter()
        .map(|f| format!("    \"{}\": \"updated text, or omit if unchanged\"", f.key()))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "Current synopsis memory:\n{memory}\n\n\
         Recent conversation:\n{history_text}\n\n\
         User's latest message:\n{utterance}\n\n\
         Reply with exactly this JSON shape:\n\
         {{\n  \"updated_memory\": {{\n{keys}\n  }},\n  \
         \"ai_response\": \"A natural reply. Acknowledge what they said and ask ONE good follow-up question.\"\n}}\n\n\
         Rules:\n\
         - Only include keys in updated_memory that the latest message adds to or changes.\n\
         - Merge new details with what is already known instead of discarding it.\n\
         - ai_response must be conversational. Do not mention the word \"synopsis\".\n\
         - Do not add comments inside the JSON."
    )
}

pub fn extraction_system_prompt() -> &'static str {
    EXTRACTION_SYSTEM
}

/// Build the analysis prompt from the project title and research items.
pub fn synthesis_prompt(title: &str, items: &[ResearchItem]) -> String {
    let related = if items.is_empty() {
        "(none found)".to_string()
    } else {
        items
            .iter()
            .take(6)
            .map(|i| format!("- {}", i.label))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "Conduct a professional analysis of this project idea: {title}\n\n\
         Related repositories and papers:\n{related}\n\n\
         Cover:\n\
         1. Innovation level and relevance\n\
         2. Technical complexity\n\
         3. Implementation feasibility\n\
         4. Existing work and how this project differs\n\
         5. Recommended technology stack\n\
         6. Rough development timeline\n\n\
         Give specific, actionable insights in plain prose."
    )
}

/// Build the improvement-suggestions prompt from the current profile.
pub fn suggestions_prompt(profile: &Profile) -> String {
    let memory = serde_json::to_string_pretty(profile).unwrap_or_else(|_| "{}".to_string());
    format!(
        "Based on this project:\n{memory}\n\n\
         Provide 5 specific, actionable suggestions to improve the project:\n\
         1. Technical enhancements\n\
         2. Implementation strategies\n\
         3. Potential challenges to address\n\
         4. Innovation opportunities\n\
         5. Market differentiation\n\n\
         Be specific and practical."
    )
}

/// The extractor's reply after cleanup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractorReply {
    /// Proposed field values, if the reply carried an `updated_memory` object.
    pub updated_memory: Option<serde_json::Map<String, serde_json::Value>>,
    /// Text for the user, if present and non-blank.
    pub response: Option<String>,
}

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*```(?:json|JSON)?\s*$").expect("valid regex"));
static COMMENT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(//|#).*$").expect("valid regex"));

/// Strip markdown fences and whole-line comments that models like to add.
fn clean_reply(text: &str) -> String {
    let without_fences = FENCE_RE.replace_all(text.trim(), "");
    COMMENT_LINE_RE.replace_all(&without_fences, "").trim().to_string()
}

/// Extract the outermost JSON object from text that may contain prose.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse the extractor's raw reply.
///
/// `Err` means the reply is unusable (no JSON object at all). A parseable
/// object with unexpected shape yields an `ExtractorReply` with the bad parts
/// left as `None`.
pub fn parse_extractor_reply(raw: &str) -> Result<ExtractorReply, serde_json::Error> {
    let cleaned = clean_reply(raw);
    let candidate = extract_json_object(&cleaned).unwrap_or(cleaned.as_str());
    let value: serde_json::Value = serde_json::from_str(candidate)?;

    let updated_memory = value
        .get("updated_memory")
        .and_then(|v| v.as_object())
        .cloned();
    let response = value
        .get("ai_response")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    Ok(ExtractorReply {
        updated_memory,
        response,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let raw = r#"{"updated_memory": {"title": "Smart bins"}, "ai_response": "Nice! Who is on your team?"}"#;
        let reply = parse_extractor_reply(raw).unwrap();
        assert_eq!(reply.updated_memory.unwrap()["title"], "Smart bins");
        assert_eq!(reply.response.as_deref(), Some("Nice! Who is on your team?"));
    }

    #[test]
    fn parses_fenced_json_with_comments() {
        let raw = "Here you go:\n```json\n{\n  // the title\n  \"updated_memory\": {\"title\": \"X\"},\n  \"ai_response\": \"ok\"\n}\n```\n";
        let reply = parse_extractor_reply(raw).unwrap();
        assert!(reply.updated_memory.is_some());
        assert_eq!(reply.response.as_deref(), Some("ok"));
    }

    #[test]
    fn unexpected_shape_is_not_an_error() {
        let raw = r#"{"updated_memory": "title is Smart bins", "ai_response": "   "}"#;
        let reply = parse_extractor_reply(raw).unwrap();
        assert!(reply.updated_memory.is_none());
        assert!(reply.response.is_none());
    }

    #[test]
    fn prose_without_json_is_an_error() {
        assert!(parse_extractor_reply("Sorry, I can't help with that.").is_err());
        assert!(parse_extractor_reply("").is_err());
    }

    #[test]
    fn extraction_prompt_lists_every_field() {
        let prompt = extraction_prompt(&Profile::new(), &[], "I want to build a drone");
        for field in SynopsisField::ALL {
            assert!(prompt.contains(field.key()), "missing {field}");
        }
        assert!(prompt.contains("I want to build a drone"));
        assert!(prompt.contains("(no earlier messages)"));
    }

    #[test]
    fn extraction_prompt_includes_history_and_memory() {
        let profile = Profile::new().with(SynopsisField::Title, "Smart bins");
        let history = vec![
            DialogueTurn::user("Hi"),
            DialogueTurn::assistant("Hello! What's your idea?"),
        ];
        let prompt = extraction_prompt(&profile, &history, "It's about waste");
        assert!(prompt.contains("\"title\": \"Smart bins\""));
        assert!(prompt.contains("User: Hi"));
        assert!(prompt.contains("Assistant: Hello! What's your idea?"));
    }

    #[test]
    fn suggestions_prompt_embeds_profile() {
        let profile = Profile::new().with(SynopsisField::Title, "Smart bins");
        let prompt = suggestions_prompt(&profile);
        assert!(prompt.contains("\"title\": \"Smart bins\""));
        assert!(prompt.contains("5 specific, actionable suggestions"));
    }

    #[test]
    fn synthesis_prompt_handles_no_items() {
        let prompt = synthesis_prompt("Smart bins", &[]);
        assert!(prompt.contains("Smart bins"));
        assert!(prompt.contains("(none found)"));
    }
}
