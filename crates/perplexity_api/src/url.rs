/// Default base URL for Perplexity API requests.
pub const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";

const COMPLETIONS_PATH: &str = "/chat/completions";

/// Normalize a base URL to the chat completions endpoint.
///
/// Normalization rules:
/// 1) an empty input falls back to [`DEFAULT_BASE_URL`]
/// 2) keep `/chat/completions` unchanged
/// 3) append `/completions` when path ends in `/chat`
/// 4) append `/chat/completions` otherwise
pub fn normalize_completions_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with(COMPLETIONS_PATH) {
        return trimmed.to_string();
    }
    if trimmed.ends_with("/chat") {
        return format!("{trimmed}/completions");
    }
    format!("{trimmed}{COMPLETIONS_PATH}")
}
