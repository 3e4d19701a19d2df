//! Common test helpers and JSON builders

use serde_json::{json, Value};

use crate::types::MockResponse;

// ─── Request builders ────────────────────────────────────────────────────────

/// Build a basic non-streaming chat request
pub fn basic_request(prompt: &str) -> Value {
    json!({
        "model": "test-model",
        "messages": [{"role": "user", "content": prompt}],
        "stream": false
    })
}

/// Build a request that brings its own tool list (get_weather)
pub fn request_with_client_tool(prompt: &str) -> Value {
    json!({
        "model": "test-model",
        "messages": [{"role": "user", "content": prompt}],
        "stream": false,
        "tools": [{
            "type": "function",
            "function": {
                "name": "get_weather",
                "description": "Current weather for a city",
                "parameters": {
                    "type": "object",
                    "properties": {"city": {"type": "string"}},
                    "required": ["city"]
                }
            }
        }]
    })
}

// ─── Upstream SSE turns ──────────────────────────────────────────────────────

fn chunk(delta: Value, finish_reason: Option<&str>) -> String {
    json!({
        "id": "chatcmpl-e2e",
        "object": "chat.completion.chunk",
        "created": 1700000000,
        "model": "test-model",
        "choices": [{"index": 0, "delta": delta, "finish_reason": finish_reason}]
    })
    .to_string()
}

/// A streamed text answer split into the given content deltas
pub fn upstream_text_stream(parts: &[&str]) -> MockResponse {
    let mut payloads = vec![chunk(json!({"role": "assistant", "content": ""}), None)];
    payloads.extend(parts.iter().map(|p| chunk(json!({"content": p}), None)));
    payloads.push(chunk(json!({}), Some("stop")));
    payloads.push("[DONE]".to_string());
    MockResponse::sse(&payloads)
}

/// A streamed turn that calls one tool, with the arguments split across fragments
pub fn upstream_tool_stream(call_id: &str, name: &str, argument_fragments: &[&str]) -> MockResponse {
    let mut payloads = vec![chunk(json!({"role": "assistant", "content": null}), None)];
    for (i, fragment) in argument_fragments.iter().enumerate() {
        let call = if i == 0 {
            json!({"index": 0, "id": call_id, "type": "function", "function": {"name": name, "arguments": fragment}})
        } else {
            json!({"index": 0, "function": {"arguments": fragment}})
        };
        payloads.push(chunk(json!({"tool_calls": [call]}), None));
    }
    payloads.push(chunk(json!({}), Some("tool_calls")));
    payloads.push("[DONE]".to_string());
    MockResponse::sse(&payloads)
}

// ─── Upstream JSON responses ─────────────────────────────────────────────────

/// Build a normal text completion response from the upstream
pub fn upstream_text_response(content: &str) -> MockResponse {
    MockResponse::json(
        json!({
            "id": "chatcmpl-test001",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "test-model",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })
        .to_string(),
    )
}

/// Build a completion that calls one tool
pub fn upstream_tool_response(call_id: &str, name: &str, args_json: &str) -> MockResponse {
    MockResponse::json(
        json!({
            "id": "chatcmpl-test002",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "test-model",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": call_id,
                        "type": "function",
                        "function": {"name": name, "arguments": args_json}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })
        .to_string(),
    )
}

// ─── Assertions ──────────────────────────────────────────────────────────────

pub fn assert_eq_str(actual: &str, expected: &str, label: &str) -> anyhow::Result<()> {
    if actual != expected {
        Err(anyhow::anyhow!("{}: expected {:?}, got {:?}", label, expected, actual))
    } else {
        Ok(())
    }
}

pub fn assert_true(cond: bool, msg: &str) -> anyhow::Result<()> {
    if !cond {
        Err(anyhow::anyhow!("{}", msg))
    } else {
        Ok(())
    }
}
