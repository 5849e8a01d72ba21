//! End-to-end session tests: bind → exchange → insert → stop, over the
//! scripted transport and over real HTTP sockets.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, Mutex};

use aicom::config::ChatConfig;
use aicom::editor::{EditorHandle, MemoryBuffer, Position};
use aicom::llm::providers::polling::PollingTransport;
use aicom::llm::providers::scripted::ScriptedTransport;
use aicom::llm::providers::streaming::StreamingTransport;
use aicom::llm::{Transport, TransportEvent};
use aicom::session::{Companion, GenerationState, SessionEvent};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn chat_config() -> ChatConfig {
    ChatConfig {
        system_prompt: "You are the AI assistant. You talk with people and helps them.".into(),
        user_name: "User".into(),
        token_speed_ms: 100,
        top_k: 30,
        top_p: 0.9,
        temperature: 0.2,
        repeat_penalty: 1.1,
    }
}

fn companion(transport: Transport) -> (Companion, mpsc::UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Companion::new(transport, &chat_config(), tx), rx)
}

fn scripted_reply() -> Transport {
    Transport::Scripted(ScriptedTransport::new(vec![
        TransportEvent::Opened,
        TransportEvent::Chunk("Hi".into()),
        TransportEvent::Chunk(" there".into()),
        TransportEvent::Done,
    ]))
}

fn buffer(text: &str) -> (Arc<Mutex<MemoryBuffer>>, EditorHandle) {
    let buf = Arc::new(Mutex::new(MemoryBuffer::from_text(text)));
    let handle: EditorHandle = buf.clone();
    (buf, handle)
}

/// Pump the insertion loop until the conversation leaves `read`.
async fn drain(companion: &mut Companion) {
    for _ in 0..5_000 {
        companion.flood_once().await;
        if companion.state() != GenerationState::Read {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    panic!("conversation did not finish");
}

fn notices(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(ev) = events.try_recv() {
        if let SessionEvent::Notice(msg) = ev {
            out.push(msg);
        }
    }
    out
}

// ── Minimal blocking HTTP server ─────────────────────────────────────────────

/// Serve `handler("METHOD /path", body) -> (status, reply)` on a local port,
/// one connection at a time, `connection: close` on every response.
fn spawn_server<F>(handler: F) -> String
where
    F: Fn(&str, &str) -> (u16, String) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(s) => handle_conn(s, &handler),
                Err(_) => break,
            }
        }
    });
    format!("http://{addr}")
}

fn handle_conn<F>(mut stream: TcpStream, handler: &F)
where
    F: Fn(&str, &str) -> (u16, String),
{
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    let header_end = loop {
        match stream.read(&mut tmp) {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                buf.extend_from_slice(&tmp[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos;
                }
            }
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let lower = line.to_ascii_lowercase();
            lower
                .strip_prefix("content-length:")
                .and_then(|v| v.trim().parse::<usize>().ok())
        })
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        match stream.read(&mut tmp) {
            Ok(0) | Err(_) => break,
            Ok(n) => body.extend_from_slice(&tmp[..n]),
        }
    }

    let request_line = head.lines().next().unwrap_or_default();
    let target = request_line
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ");

    let (status, reply) = handler(&target, &String::from_utf8_lossy(&body));
    let response = format!(
        "HTTP/1.1 {status} Status\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{reply}",
        reply.len()
    );
    let _ = stream.write_all(response.as_bytes());
}

// ── Scripted transport flows ─────────────────────────────────────────────────

#[tokio::test]
async fn scripted_conversation_streams_into_the_buffer() {
    let (mut companion, _events) = companion(scripted_reply());
    let (buf, handle) = buffer("==User==\nhello\n");

    companion.toggle(handle).await;
    drain(&mut companion).await;

    assert_eq!(companion.state(), GenerationState::Stop);
    assert!(!companion.is_bound());
    assert_eq!(companion.tokens(), 2);
    assert_eq!(
        buf.lock().await.text(),
        "==User==\nhello\n\n\n==AICom==\nHi there\n\n==User==\n"
    );
}

#[tokio::test]
async fn markerless_buffer_gets_a_user_marker_prepended() {
    let (mut companion, _events) = companion(scripted_reply());
    let (buf, handle) = buffer("just a question");

    companion.toggle(handle).await;
    drain(&mut companion).await;

    assert_eq!(
        buf.lock().await.text(),
        "==User==\njust a question\n\n==AICom==\nHi there\n\n==User==\n"
    );
}

#[tokio::test]
async fn selection_binds_only_the_selected_range() {
    let (mut companion, _events) = companion(scripted_reply());
    let text = "notes\n\n==User==\nq1\nTAIL";
    let buf = Arc::new(Mutex::new(MemoryBuffer::from_text(text)));
    buf.lock()
        .await
        .set_selection(Position::new(2, 0), Position::new(3, 2));
    let handle: EditorHandle = buf.clone();

    companion.toggle(handle).await;
    drain(&mut companion).await;

    // The reply lands after the selection end, ahead of the trailing text,
    // and nothing was prepended at the buffer start.
    assert_eq!(
        buf.lock().await.text(),
        "notes\n\n==User==\nq1\n\n==AICom==\nHi there\n\n==User==\n\nTAIL"
    );
}

// ── Real-socket flows ────────────────────────────────────────────────────────

#[tokio::test]
async fn streaming_transport_end_to_end() {
    let seen = Arc::new(StdMutex::new(Vec::<String>::new()));
    let seen_in_handler = seen.clone();
    let base = spawn_server(move |target, body| {
        if target == "POST /v1/chat/completions" {
            seen_in_handler.lock().unwrap().push(body.to_string());
            let frames = "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n\
                          data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n\
                          data: [DONE]\n\n";
            (200, frames.to_string())
        } else {
            (404, String::new())
        }
    });

    let transport = Transport::Streaming(
        StreamingTransport::new(format!("{base}/v1"), Some("test-key".into()), 5).unwrap(),
    );
    let (mut companion, _events) = companion(transport);
    let (buf, handle) = buffer("==User==\nhi\n");

    companion.toggle(handle).await;
    drain(&mut companion).await;

    assert_eq!(companion.state(), GenerationState::Stop);
    let text = buf.lock().await.text().to_string();
    assert!(text.contains("==AICom==\nHello world"));
    assert!(text.ends_with("\n\n==User==\n"));

    // The request body is exactly {messages, stream}.
    let bodies = seen.lock().unwrap();
    let request: serde_json::Value = serde_json::from_str(&bodies[0]).unwrap();
    assert_eq!(request["stream"], serde_json::json!(true));
    assert_eq!(request["messages"][0]["role"], "system");
    assert_eq!(request["messages"][1]["content"], "hi");
    assert_eq!(
        request.as_object().unwrap().keys().len(),
        2,
        "body must carry only messages and stream"
    );
}

#[tokio::test]
async fn polling_sentinel_stops_and_appends_user_marker() {
    let seen = Arc::new(StdMutex::new(Vec::<(String, String)>::new()));
    let seen_in_handler = seen.clone();
    let polls = Arc::new(AtomicUsize::new(0));
    let polls_in_handler = polls.clone();

    let base = spawn_server(move |target, body| {
        seen_in_handler
            .lock()
            .unwrap()
            .push((target.to_string(), body.to_string()));
        match target {
            "POST /system" | "POST /send" => (200, String::new()),
            "GET /receive" => {
                if polls_in_handler.fetch_add(1, Ordering::SeqCst) == 0 {
                    (200, "Hello".to_string())
                } else {
                    (200, "==Done==".to_string())
                }
            }
            _ => (404, String::new()),
        }
    });

    let transport = Transport::Polling(
        PollingTransport::new(base, None, 5, "User".into()).unwrap(),
    );
    let (mut companion, _events) = companion(transport);
    let (buf, handle) = buffer("==User==\nhi\n");

    companion.toggle(handle).await;
    drain(&mut companion).await;

    assert_eq!(companion.state(), GenerationState::Stop);
    let text = buf.lock().await.text().to_string();
    assert!(text.contains("AICom: Hello"));
    assert!(text.ends_with("\n\nUser: "));

    // The system prompt and the rendered dialog went out as plain text.
    let requests = seen.lock().unwrap();
    let system = requests.iter().find(|(t, _)| t == "POST /system").unwrap();
    assert!(system.1.contains("You are the AI assistant"));
    let send = requests.iter().find(|(t, _)| t == "POST /send").unwrap();
    assert_eq!(send.1, "User: hi");
}

#[tokio::test]
async fn non_200_at_bind_time_unbinds_with_send_error() {
    let base = spawn_server(|_target, _body| (500, "upstream busted".to_string()));

    let transport = Transport::Streaming(
        StreamingTransport::new(format!("{base}/v1"), Some("test-key".into()), 5).unwrap(),
    );
    let (mut companion, mut events) = companion(transport);
    let (buf, handle) = buffer("==User==\nhi\n");

    companion.toggle(handle).await;

    assert_eq!(companion.state(), GenerationState::SendError);
    assert!(!companion.is_bound());
    // Nothing was inserted.
    assert_eq!(buf.lock().await.text(), "==User==\nhi\n");

    let notices = notices(&mut events);
    assert!(notices.iter().any(|n| n.contains("unset on error")));
    assert!(notices.iter().any(|n| n.contains("500")));
}

#[tokio::test]
async fn unreachable_host_unbinds_with_an_error_state() {
    // Nothing listens on this port.
    let transport = Transport::Streaming(
        StreamingTransport::new("http://127.0.0.1:9/v1".into(), None, 1).unwrap(),
    );
    let (mut companion, _events) = companion(transport);
    let (_buf, handle) = buffer("==User==\nhi\n");

    companion.toggle(handle).await;

    assert!(companion.state().is_error());
    assert!(!companion.is_bound());
}
