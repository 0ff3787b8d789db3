//! Request logging formatter

use crate::synthesis::SynthesisRequest;

/// Format a synthesis request in compact one-line form.
///
/// The text is whitespace-normalized and truncated, never logged whole.
pub fn format_synthesis_log(request: &SynthesisRequest) -> String {
    let mut parts = vec![
        format!("voice={}", request.voice()),
        format!("temp={}", request.temperature()),
        format!("rep={}", request.repetition_penalty()),
        format!("chars={}", request.text().chars().count()),
    ];

    if request.streaming() {
        parts.push("stream".to_string());
    }

    let normalized = normalize_whitespace(request.text());
    if !normalized.is_empty() {
        parts.push(format!("\"{}\"", truncate_message(&normalized)));
    }

    format!("→ {}", parts.join(" "))
}

/// Convert newlines and tabs to single spaces, collapse multiple spaces
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate message according to rules:
/// - If <= 100 chars: show all
/// - If > 100 chars: first 25 + " ... " + last 75
fn truncate_message(s: &str) -> String {
    const MAX_TOTAL: usize = 100;
    const PREFIX_LEN: usize = 25;
    const SUFFIX_LEN: usize = 75;
    const ELLIPSIS: &str = " ... ";

    let char_count = s.chars().count();
    if char_count <= MAX_TOTAL {
        return s.to_string();
    }

    let prefix: String = s.chars().take(PREFIX_LEN).collect();
    let suffix: String = s.chars().skip(char_count - SUFFIX_LEN).collect();

    format!("{}{}{}", prefix, ELLIPSIS, suffix)
}
