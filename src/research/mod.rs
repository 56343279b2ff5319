//! External research providers: GitHub repository search, Semantic Scholar
//! paper search and LLM-backed synthesis.

pub mod github;
pub mod papers;
pub mod synthesis;

pub use github::GitHubRepoSource;
pub use papers::SemanticScholarSource;
pub use synthesis::LlmSynthesizer;

/// Sent on every outbound research request; GitHub rejects requests without one.
pub(crate) const USER_AGENT: &str = concat!("synopsis-assist/", env!("CARGO_PKG_VERSION"));

/// Shorten free text to at most `words` words, marking the cut.
pub(crate) fn truncate_words(text: &str, words: usize) -> String {
    let mut parts = text.split_whitespace();
    let kept: Vec<&str> = parts.by_ref().take(words).collect();
    if parts.next().is_some() {
        format!("{}...", kept.join(" "))
    } else {
        kept.join(" ")
    }
}
