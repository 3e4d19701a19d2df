//! Test registry - all test cases are registered here

pub mod helpers;
pub mod toolcall;

use crate::runner::TestCase;

/// Build and return all test cases
///
/// Each test:
/// 1. Queues mock upstream responses (what the chat API would return)
/// 2. Sends a request to the REAL proxy
/// 3. Validates the response and what the mock services saw
pub fn all_tests() -> Vec<TestCase> {
    macro_rules! test {
        ($name:expr, $desc:expr, $func:path) => {
            TestCase {
                name: $name,
                description: $desc,
                run: Box::new(|ctx| Box::pin($func(ctx))),
            }
        };
    }

    vec![
        // ── Basic behavior ────────────────────────────────────────────────────
        test!(
            "basic/streaming_text",
            "Plain streamed answer is relayed delta by delta",
            basic::test_streaming_text
        ),
        test!(
            "basic/non_streaming_text",
            "Plain non-streaming answer is returned as JSON",
            basic::test_non_streaming_text
        ),
        test!(
            "basic/credential_forwarded",
            "Client bearer token is forwarded to the upstream",
            basic::test_credential_forwarded
        ),
        test!(
            "basic/missing_credential",
            "Request without a credential is rejected with 401",
            basic::test_missing_credential
        ),
        test!(
            "basic/invalid_request",
            "Malformed chat request is rejected with 400",
            basic::test_invalid_request
        ),
        test!(
            "basic/upstream_error",
            "First upstream failure is a 502 JSON error",
            basic::test_upstream_error
        ),
        test!(
            "basic/health_and_welcome",
            "/ and /health are served locally",
            basic::test_health_and_welcome
        ),

        // ── Tool-call continuation ────────────────────────────────────────────
        test!(
            "toolcall/tools_injected",
            "search and crawler are offered when the client sends no tools",
            toolcall::test_tools_injected
        ),
        test!(
            "toolcall/client_tools_preserved",
            "Client tool list is forwarded unchanged",
            toolcall::test_client_tools_preserved
        ),
        test!(
            "toolcall/search_streaming",
            "Streamed search call is executed and the answer carries search_results",
            toolcall::test_search_round_trip_streaming
        ),
        test!(
            "toolcall/crawler_streaming",
            "Crawler call posts to the crawl service and feeds back its JSON",
            toolcall::test_crawler_round_trip
        ),
        test!(
            "toolcall/failed_tool",
            "Failed tool batch ends the stream with [DONE] and no re-request",
            toolcall::test_failed_tool_ends_stream
        ),
        test!(
            "toolcall/continuation_limit",
            "Endless tool calls end with a continuation_limit_exceeded event",
            toolcall::test_continuation_limit
        ),
        test!(
            "toolcall/search_non_streaming",
            "Non-streaming request runs the tool loop to a final answer",
            toolcall::test_search_round_trip_non_streaming
        ),
        test!(
            "toolcall/unknown_tool",
            "Call to a client-owned tool is returned to the client",
            toolcall::test_unknown_tool_returned_to_client
        ),
    ]
}
