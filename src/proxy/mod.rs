//! HTTP proxy and the tool-call continuation engine

mod accumulator;
mod handler;
mod orchestrator;
pub mod server;
mod sink;
mod streaming;
mod upstream;

pub use accumulator::{SlotMode, ToolCallAccumulator};
pub use handler::ProxyHandler;
pub use orchestrator::{ExchangeOutcome, ExchangeStats, Orchestrator};
pub use server::{build_http_client, build_state, router, run_server, ProxyState};
pub use sink::{send_data, send_done, send_json, ChannelSink, EventSink, SinkError};
pub use streaming::{RelayError, RelayOutcome, StreamRelay, TOOL_CALLS_FINISH_REASON};
pub use upstream::{ByteStream, HttpUpstream, UpstreamClient};
