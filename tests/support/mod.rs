#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

/// A tiny HTTP endpoint that answers every POST with the same status and
/// body, recording the request paths and bodies it saw.
pub struct FakeEndpoint {
    pub base_url: String,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeEndpoint {
    pub fn start(status: u16, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake endpoint");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        let body = body.to_string();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                if let Some(request) = serve(stream, status, &body) {
                    seen.lock().expect("lock").push(request);
                }
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().expect("lock").clone()
    }
}

fn serve(mut stream: TcpStream, status: u16, body: &str) -> Option<(String, String)> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let path = request_line.split_whitespace().nth(1)?.to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':')
            && name.eq_ignore_ascii_case("content-length")
        {
            content_length = value.trim().parse().unwrap_or(0);
        }
    }
    let mut payload = vec![0u8; content_length];
    reader.read_exact(&mut payload).ok()?;

    let response = format!(
        "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).ok()?;
    stream.flush().ok()?;
    Some((path, String::from_utf8_lossy(&payload).to_string()))
}

/// An Ollama `/api/chat` envelope whose message content is `content`.
pub fn ollama_reply(content: &str) -> String {
    serde_json::json!({
        "model": "qwen3-vl",
        "message": {"role": "assistant", "content": content},
        "done": true
    })
    .to_string()
}

pub fn openai_reply(content: &str) -> String {
    serde_json::json!({
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
    .to_string()
}

pub const GOOD_READING: &str = "```json\n{\"current_session\":{\"percent_used\":42,\"resets_in\":\"3 hr 12 min\"},\"weekly_limits\":{\"percent_used\":\"67%\",\"resets\":\"Mon 9:00 AM\"}}\n```";

/// A command with the environment isolated from the developer's machine.
pub fn quotawatch(home: &std::path::Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("quotawatch");
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("QUOTA_HOME", home.join(".config/quotawatch"))
        .env_remove("QUOTA_CONFIG_PATH")
        .env_remove("QUOTA_API_KEY")
        .env_remove("OLLAMA_API_KEY")
        .env_remove("QUOTA_HOST")
        .env_remove("QUOTA_PROVIDER")
        .env_remove("QUOTA_MODEL")
        .env_remove("QUOTA_WATCH_DIR")
        .env_remove("QUOTA_STATUS_FILE")
        .env_remove("QUOTA_FULL_OUTPUT")
        .env_remove("RUST_LOG");
    cmd
}
