use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use toolwire_core::{
    handler_fn, InputSchema, ProtocolHandler, Property, ServerInfo, Session, SessionError,
    ToolDescriptor, ToolError, ToolOutput, ToolRegistry,
};

const SERVER_NAME: &str = "integration-server";

fn registry() -> ToolRegistry {
    ToolRegistry::builder()
        .register(
            ToolDescriptor::new(
                "sleep",
                "Sleep for a while, then report",
                InputSchema::object()
                    .required("ms", Property::integer("Milliseconds to sleep"))
                    .required("label", Property::string("Label to return")),
            ),
            handler_fn(|args: Value| async move {
                let ms = args["ms"].as_u64().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(ToolOutput::text(args["label"].as_str().unwrap_or_default()))
            }),
        )
        .unwrap()
        .register(
            ToolDescriptor::new(
                "units",
                "Pick a unit system",
                InputSchema::object().optional(
                    "system",
                    Property::string("Unit system")
                        .one_of(["metric", "imperial"])
                        .with_default("metric"),
                ),
            ),
            handler_fn(|args: Value| async move {
                Ok(ToolOutput::text(args["system"].as_str().unwrap_or_default()))
            }),
        )
        .unwrap()
        .register(
            ToolDescriptor::new("broken", "Always fails upstream", InputSchema::object()),
            handler_fn(|_| async { Err(ToolError::upstream("connection reset")) }),
        )
        .unwrap()
        .build()
}

fn handler() -> Arc<ProtocolHandler> {
    Arc::new(ProtocolHandler::new(
        ServerInfo {
            name: SERVER_NAME.to_string(),
            version: "1.2.3".to_string(),
        },
        Arc::new(registry()),
    ))
}

fn call(id: u64, name: &str, arguments: Value) -> String {
    let req = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    });
    format!("{}\n", req)
}

async fn run_session(input: &str, depth: usize) -> Vec<Value> {
    let mut output = Vec::new();
    Session::new(input.as_bytes(), &mut output, handler())
        .with_pipeline_depth(depth)
        .run()
        .await
        .unwrap();
    parse_lines(&output)
}

fn parse_lines(output: &[u8]) -> Vec<Value> {
    String::from_utf8(output.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn text(response: &Value) -> &str {
    response["result"]["content"][0]["text"]
        .as_str()
        .unwrap_or("")
}

#[tokio::test]
async fn initialize_reports_configured_name() {
    let out = run_session(
        "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\",\"params\":{}}\n",
        16,
    )
    .await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["id"], 1);
    assert_eq!(out[0]["result"]["serverInfo"]["name"], SERVER_NAME);
    assert_eq!(out[0]["result"]["serverInfo"]["version"], "1.2.3");
}

#[tokio::test]
async fn nonexistent_tool_is_error_result() {
    let out = run_session(
        "{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/call\",\"params\":{\"name\":\"nonexistent_tool\",\"arguments\":{}}}\n",
        16,
    )
    .await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["id"], 2);
    assert!(out[0].get("error").is_none());
    assert_eq!(out[0]["result"]["isError"], true);
    assert!(text(&out[0]).contains("nonexistent_tool"));
}

#[tokio::test]
async fn parse_error_does_not_end_session() {
    let input = "\"not json\"\n{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"tools/list\"}\n";
    let out = run_session(input, 16).await;

    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["error"]["code"], -32700);
    assert!(out[0].get("id").is_none());
    assert_eq!(out[1]["id"], 3);
    assert_eq!(out[1]["result"]["tools"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn garbage_frames_each_get_one_parse_error() {
    let input = "{{{\n]\n{\"id\":4,\"method\":\"ping\"}\n";
    let out = run_session(input, 16).await;

    assert_eq!(out.len(), 3);
    assert_eq!(out[0]["error"]["code"], -32700);
    assert_eq!(out[1]["error"]["code"], -32700);
    assert_eq!(out[2]["id"], 4);
}

#[tokio::test]
async fn tools_list_is_byte_identical_across_calls() {
    let mut output = Vec::new();
    let input = "{\"id\":1,\"method\":\"tools/list\"}\n{\"id\":1,\"method\":\"tools/list\"}\n";
    Session::new(input.as_bytes(), &mut output, handler())
        .run()
        .await
        .unwrap();

    let text = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], lines[1]);
}

#[tokio::test]
async fn tool_call_echoes_request_id() {
    let mut input = String::new();
    for id in [10, 11, 12] {
        input.push_str(&call(id, "units", json!({"system": "imperial"})));
    }
    let out = run_session(&input, 16).await;

    let ids: Vec<u64> = out.iter().map(|r| r["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, [10, 11, 12]);
    assert!(out.iter().all(|r| text(r) == "imperial"));
}

#[tokio::test]
async fn tool_failures_stay_in_result() {
    let input = format!(
        "{}{}{}",
        call(1, "broken", json!({})),
        call(2, "units", json!({"system": "kelvin"})),
        call(3, "sleep", json!({"label": "x"})),
    );
    let out = run_session(&input, 16).await;

    assert_eq!(out.len(), 3);
    for resp in &out {
        assert!(resp.get("error").is_none());
        assert_eq!(resp["result"]["isError"], true);
    }
    assert_eq!(text(&out[0]), "Error: upstream error: connection reset");
    assert!(text(&out[1]).contains("must be one of"));
    assert_eq!(text(&out[2]), "Error: Missing required argument: ms");
}

#[tokio::test(start_paused = true)]
async fn responses_follow_request_order_not_completion_order() {
    let input = format!(
        "{}{}",
        call(1, "sleep", json!({"ms": 500, "label": "slow"})),
        call(2, "sleep", json!({"ms": 10, "label": "fast"})),
    );

    let started = tokio::time::Instant::now();
    let out = run_session(&input, 16).await;
    let elapsed = started.elapsed();

    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["id"], 1);
    assert_eq!(text(&out[0]), "slow");
    assert_eq!(out[1]["id"], 2);
    assert_eq!(text(&out[1]), "fast");
    // Both calls were in flight together.
    assert!(elapsed < Duration::from_millis(510), "{:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn depth_of_one_serializes_dispatch() {
    let input = format!(
        "{}{}",
        call(1, "sleep", json!({"ms": 500, "label": "slow"})),
        call(2, "sleep", json!({"ms": 10, "label": "fast"})),
    );

    let started = tokio::time::Instant::now();
    let out = run_session(&input, 1).await;

    assert_eq!(text(&out[0]), "slow");
    assert_eq!(text(&out[1]), "fast");
    assert!(started.elapsed() >= Duration::from_millis(510));
}

#[tokio::test]
async fn byte_at_a_time_input_matches_whole_input() {
    let input = format!(
        "{}\n\"not json\"\n{}{}",
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        call(2, "units", json!({})),
        call(3, "missing", json!({})),
    );
    let whole = run_session(&input, 16).await;

    let (mut client, server) = tokio::io::duplex(16);
    let bytes = input.clone().into_bytes();
    let writer = tokio::spawn(async move {
        for b in bytes {
            client.write_all(&[b]).await.unwrap();
            tokio::task::yield_now().await;
        }
    });

    let mut output = Vec::new();
    Session::new(server, &mut output, handler())
        .run()
        .await
        .unwrap();
    writer.await.unwrap();

    assert_eq!(parse_lines(&output), whole);
    assert_eq!(whole.len(), 4);
}

#[tokio::test]
async fn object_without_method_keeps_its_id() {
    let input = "{\"jsonrpc\":\"2.0\",\"id\":5}\n{\"id\":6,\"method\":42}\n";
    let out = run_session(input, 16).await;

    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["id"], 5);
    assert_eq!(out[0]["error"]["code"], -32601);
    assert_eq!(out[1]["id"], 6);
    assert_eq!(out[1]["error"]["code"], -32601);
}

#[tokio::test]
async fn null_id_is_echoed_back() {
    let out = run_session("{\"id\":null,\"method\":\"nope\"}\n", 16).await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].get("id"), Some(&Value::Null));
    assert_eq!(out[0]["error"]["code"], -32601);
}

#[tokio::test(start_paused = true)]
async fn whole_float_counts_as_integer() {
    let out = run_session(&call(1, "sleep", json!({"ms": 20.0, "label": "ok"})), 16).await;
    assert_eq!(out[0]["result"]["isError"], false);
    assert_eq!(text(&out[0]), "ok");
}

/// Writer whose peer has gone away.
struct ClosedPipe;

impl AsyncWrite for ClosedPipe {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer closed")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Reader that yields `data` once, then fails.
struct FailingReader {
    data: Option<&'static [u8]>,
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.data.take() {
            Some(data) => {
                buf.put_slice(data);
                Poll::Ready(Ok(()))
            }
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "input reset",
            ))),
        }
    }
}

#[tokio::test]
async fn output_fault_ends_session_with_error() {
    let input = "{\"id\":1,\"method\":\"ping\"}\n{\"id\":2,\"method\":\"ping\"}\n";
    let err = Session::new(input.as_bytes(), ClosedPipe, handler())
        .run()
        .await
        .unwrap_err();

    match err {
        SessionError::Write(e) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("expected write error, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn read_error_still_drains_pending_responses() {
    let reader = FailingReader {
        data: Some(b"{\"id\":1,\"method\":\"tools/call\",\"params\":{\"name\":\"sleep\",\"arguments\":{\"ms\":50,\"label\":\"late\"}}}\n"),
    };
    let mut output = Vec::new();
    let err = Session::new(reader, &mut output, handler())
        .run()
        .await
        .unwrap_err();

    match err {
        SessionError::Read(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
        other => panic!("expected read error, got {:?}", other),
    }

    let out = parse_lines(&output);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["id"], 1);
    assert_eq!(text(&out[0]), "late");
}
