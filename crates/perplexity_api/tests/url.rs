use perplexity_api::normalize_completions_url;

#[test]
fn url_normalization_keeps_existing_completions_endpoint() {
    assert_eq!(
        normalize_completions_url("https://api.perplexity.ai/chat/completions"),
        "https://api.perplexity.ai/chat/completions"
    );
}

#[test]
fn url_normalization_appends_completions_to_chat_base() {
    assert_eq!(
        normalize_completions_url("https://api.perplexity.ai/chat/"),
        "https://api.perplexity.ai/chat/completions"
    );
}

#[test]
fn url_normalization_appends_full_path_to_generic_base() {
    assert_eq!(
        normalize_completions_url("http://127.0.0.1:8080/"),
        "http://127.0.0.1:8080/chat/completions"
    );
}

#[test]
fn url_normalization_defaults_blank_input() {
    assert_eq!(
        normalize_completions_url("   "),
        "https://api.perplexity.ai/chat/completions"
    );
}
