//! Tool-call continuation: the proxy runs search/crawler and re-asks the upstream

use crate::runner::TestContext;

use super::helpers::*;

/// Tools are offered to the model when the client sends none
pub async fn test_tools_injected(ctx: TestContext) -> anyhow::Result<()> {
    ctx.mocks.queue(upstream_text_stream(&["ok"]));

    ctx.proxy.chat_stream(basic_request("hi")).await?;

    let reqs = ctx.mocks.take_requests();
    let names = reqs.first().map(|r| r.tool_names()).unwrap_or_default();
    assert_true(
        names == ["search", "crawler"],
        &format!("Expected injected [search, crawler], got {:?}", names),
    )?;
    Ok(())
}

/// A client-supplied tool list is forwarded as is
pub async fn test_client_tools_preserved(ctx: TestContext) -> anyhow::Result<()> {
    ctx.mocks.queue(upstream_text_stream(&["ok"]));

    ctx.proxy.chat_stream(request_with_client_tool("weather?")).await?;

    let reqs = ctx.mocks.take_requests();
    let names = reqs.first().map(|r| r.tool_names()).unwrap_or_default();
    assert_true(
        names == ["get_weather"],
        &format!("Client tools must not be replaced, got {:?}", names),
    )?;
    Ok(())
}

/// Streamed search call: proxy queries SearXNG, continues upstream, and the
/// first content event carries the tool messages as search_results
pub async fn test_search_round_trip_streaming(ctx: TestContext) -> anyhow::Result<()> {
    ctx.mocks
        .queue(upstream_tool_stream("call-1", "search", &["{\"query\":", "\"rust async\"}"]));
    ctx.mocks.queue(upstream_text_stream(&["Rust async ", "uses futures."]));

    let resp = ctx.proxy.chat_stream(basic_request("what is rust async?")).await?;

    assert_true(resp.has_done_marker(), "SSE stream must end with [DONE]")?;
    assert_eq_str(&resp.accumulated_content(), "Rust async uses futures.", "accumulated content")?;

    let queries = ctx.mocks.search_queries();
    assert_true(
        queries == ["rust async"],
        &format!("Expected one SearXNG query for 'rust async', got {:?}", queries),
    )?;

    let search_results = resp
        .search_results()
        .ok_or_else(|| anyhow::anyhow!("First content event has no search_results"))?;
    let first = &search_results[0];
    assert_true(first["role"] == "tool", &format!("search_results[0] is not a tool message: {}", first))?;
    assert_true(first["tool_call_id"] == "call-1", "search_results[0] must answer call-1")?;
    let tool_output: serde_json::Value = serde_json::from_str(first["content"].as_str().unwrap_or("null"))?;
    let hits = tool_output["results"].as_array().map(Vec::len).unwrap_or(0);
    assert_true(hits == 3, &format!("max_results is 3, tool returned {} hits", hits))?;

    let reqs = ctx.mocks.take_requests();
    assert_true(reqs.len() == 2, &format!("Expected 2 upstream requests, got {}", reqs.len()))?;
    let roles = reqs[1].roles();
    assert_true(
        roles == ["user", "assistant", "tool"],
        &format!("Continuation conversation has roles {:?}", roles),
    )?;
    let assistant = &reqs[1].body["messages"][1];
    assert_true(
        assistant["tool_calls"][0]["function"]["arguments"] == "{\"query\":\"rust async\"}",
        &format!("Assistant turn must carry the joined arguments: {}", assistant),
    )?;
    Ok(())
}

/// Crawler call posts the URL to the crawl service and feeds its JSON back
pub async fn test_crawler_round_trip(ctx: TestContext) -> anyhow::Result<()> {
    ctx.mocks.queue(upstream_tool_stream(
        "call-c",
        "crawler",
        &["{\"url\":\"https://example.com/article\"}"],
    ));
    ctx.mocks.queue(upstream_text_stream(&["The article says hi."]));

    let resp = ctx.proxy.chat_stream(basic_request("summarize the page")).await?;

    assert_eq_str(&resp.accumulated_content(), "The article says hi.", "accumulated content")?;
    let urls = ctx.mocks.crawled_urls();
    assert_true(
        urls == ["https://example.com/article"],
        &format!("Expected one crawl request, got {:?}", urls),
    )?;

    let reqs = ctx.mocks.take_requests();
    let tool_content = reqs
        .get(1)
        .and_then(|r| r.body["messages"][2]["content"].as_str())
        .unwrap_or_default()
        .to_string();
    assert_true(
        tool_content.contains("Full page text"),
        &format!("Tool message must carry the crawl JSON, got {:?}", tool_content),
    )?;
    Ok(())
}

/// A tool that fails produces no continuation; the client just gets [DONE]
pub async fn test_failed_tool_ends_stream(ctx: TestContext) -> anyhow::Result<()> {
    ctx.mocks.queue(upstream_tool_stream(
        "call-x",
        "crawler",
        &["{\"url\":\"https://broken.example/\"}"],
    ));

    let resp = ctx.proxy.chat_stream(basic_request("read it")).await?;

    assert_true(resp.has_done_marker(), "SSE stream must end with [DONE]")?;
    assert_true(
        resp.data_events().is_empty(),
        &format!("Expected no data events, got {}", resp.data_events().len()),
    )?;
    let reqs = ctx.mocks.take_requests();
    assert_true(reqs.len() == 1, &format!("Expected no re-request, got {} requests", reqs.len()))?;
    Ok(())
}

/// The model calling tools forever hits the continuation limit (3 in the e2e config)
pub async fn test_continuation_limit(ctx: TestContext) -> anyhow::Result<()> {
    for i in 0..4 {
        let id = format!("call-{}", i);
        ctx.mocks
            .queue(upstream_tool_stream(&id, "search", &["{\"query\":\"again\"}"]));
    }

    let resp = ctx.proxy.chat_stream(basic_request("loop")).await?;

    assert_true(resp.has_done_marker(), "SSE stream must end with [DONE]")?;
    let error = resp
        .error_event()
        .ok_or_else(|| anyhow::anyhow!("Expected an in-band error event"))?;
    assert_true(
        error["type"] == "continuation_limit_exceeded",
        &format!("Unexpected error event: {}", error),
    )?;
    assert_true(ctx.mocks.search_queries().len() == 3, "Exactly 3 tool rounds should run")?;
    assert_true(ctx.mocks.take_requests().len() == 4, "Expected 4 upstream requests")?;
    Ok(())
}

/// Non-streaming requests run the same loop and return the final completion
pub async fn test_search_round_trip_non_streaming(ctx: TestContext) -> anyhow::Result<()> {
    ctx.mocks
        .queue(upstream_tool_response("call-n", "search", "{\"query\":\"tokio\"}"));
    ctx.mocks.queue(upstream_text_response("Tokio is a runtime."));

    let resp = ctx.proxy.chat(basic_request("what is tokio?")).await?;

    assert_true(resp.status == 200, &format!("Expected 200, got {}", resp.status))?;
    assert_eq_str(
        resp.get_str("choices.0.message.content").unwrap_or_default(),
        "Tokio is a runtime.",
        "final content",
    )?;
    assert_true(ctx.mocks.search_queries() == ["tokio"], "Expected one search for 'tokio'")?;

    let reqs = ctx.mocks.take_requests();
    assert_true(reqs.len() == 2, &format!("Expected 2 upstream requests, got {}", reqs.len()))?;
    assert_true(
        reqs[1].body["stream"].as_bool() != Some(true),
        "Non-streaming continuation must not ask for a stream",
    )?;
    Ok(())
}

/// A call to a tool the proxy does not own is handed back to the client
pub async fn test_unknown_tool_returned_to_client(ctx: TestContext) -> anyhow::Result<()> {
    ctx.mocks
        .queue(upstream_tool_response("call-w", "get_weather", "{\"city\":\"Oslo\"}"));

    let resp = ctx.proxy.chat(request_with_client_tool("weather in Oslo?")).await?;

    assert_true(resp.status == 200, &format!("Expected 200, got {}", resp.status))?;
    assert_eq_str(
        resp.get_str("choices.0.message.tool_calls.0.function.name").unwrap_or_default(),
        "get_weather",
        "returned tool call",
    )?;
    assert_eq_str(
        resp.get_str("choices.0.finish_reason").unwrap_or_default(),
        "tool_calls",
        "finish_reason",
    )?;
    assert_true(ctx.mocks.take_requests().len() == 1, "No continuation expected")?;
    Ok(())
}
