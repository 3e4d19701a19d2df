//! Compact one-line request log

use crate::api::ChatCompletionRequest;

/// `→ model=.. msgs=.. [stream] [tools=N] "first user message"`
pub fn format_request_log(request: &ChatCompletionRequest) -> String {
    let mut parts = vec![
        format!("model={}", request.model),
        format!("msgs={}", request.messages.len()),
    ];

    if request.stream {
        parts.push("stream".to_string());
    }

    let tools = request.tools.as_ref().map_or(0, Vec::len);
    if tools > 0 {
        parts.push(format!("tools={}", tools));
    }

    if let Some(text) = request.first_user_text() {
        parts.push(format!("\"{}\"", truncate_message(&normalize_whitespace(&text))));
    }

    format!("→ {}", parts.join(" "))
}

/// Collapse every whitespace run (newlines, tabs) to one space
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Up to 100 chars as is; longer becomes first 25 + " ... " + last 75
fn truncate_message(s: &str) -> String {
    const MAX_TOTAL: usize = 100;
    const PREFIX_LEN: usize = 25;
    const SUFFIX_LEN: usize = 75;

    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= MAX_TOTAL {
        return s.to_string();
    }

    let prefix: String = chars[..PREFIX_LEN].iter().collect();
    let suffix: String = chars[chars.len() - SUFFIX_LEN..].iter().collect();
    format!("{} ... {}", prefix, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> ChatCompletionRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_format_request_log_basic() {
        let req = parse(json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "Be brief"},
                {"role": "user", "content": "What's new\nin Rust?"}
            ],
            "stream": true
        }));

        assert_eq!(format_request_log(&req), "→ model=gpt-4o msgs=2 stream \"What's new in Rust?\"");
    }

    #[test]
    fn test_format_request_log_with_tools() {
        let req = parse(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "Test"}],
            "tools": [
                {"type": "function", "function": {"name": "search", "parameters": {}}},
                {"type": "function", "function": {"name": "crawler", "parameters": {}}}
            ]
        }));

        let log = format_request_log(&req);
        assert!(log.contains("tools=2"));
        assert!(!log.contains("stream"));
    }

    #[test]
    fn test_format_request_log_parts_content() {
        let req = parse(json!({
            "model": "m",
            "messages": [{"role": "user", "content": [
                {"type": "text", "text": "Part 1"},
                {"type": "image_url", "image_url": {"url": "https://x/img.png"}},
                {"type": "text", "text": "Part 2"}
            ]}]
        }));
        assert!(format_request_log(&req).ends_with("\"Part 1 Part 2\""));
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("hello\r\nworld"), "hello world");
        assert_eq!(normalize_whitespace("  hello\t\t  world "), "hello world");
    }

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short"), "short");
        assert_eq!(truncate_message(&"x".repeat(100)).len(), 100);

        let long = format!("{}{}", "a".repeat(150), "b".repeat(150));
        let truncated = truncate_message(&long);
        assert_eq!(truncated, format!("{} ... {}", "a".repeat(25), "b".repeat(75)));
    }

    #[test]
    fn test_truncate_multibyte() {
        let msg = "猫".repeat(120);
        let truncated = truncate_message(&msg);
        assert_eq!(truncated.chars().count(), 105);
    }
}
