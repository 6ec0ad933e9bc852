//! In-process fake of the storage endpoint's resumable-upload protocol.
//!
//! Serves one request per connection (the connection always closes after
//! the response), stores acknowledged bytes, and exposes fault-injection
//! knobs: reject initiation, reject chunks, drop a connection without
//! responding, and acknowledge more than it durably retains.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub struct FakeStore {
    /// Pre-signed upload URL pointing at this fake.
    pub signed_url: String,
    /// Session URI handed out at initiation.
    pub session_uri: String,
    state: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
pub struct StoreState {
    /// Durably stored object bytes.
    pub data: Vec<u8>,
    pub completed: bool,
    pub initiations: usize,
    pub chunk_puts: usize,
    pub marker_puts: usize,
    /// Byte ranges of accepted chunks, in arrival order.
    pub chunk_ranges: Vec<(u64, u64)>,

    // Fault injection.
    /// Respond to session creation with this status.
    pub reject_initiation: Option<u16>,
    /// Respond to every data chunk with this status.
    pub reject_chunks: Option<u16>,
    /// Acknowledge the next chunk in full but durably retain only this
    /// many total bytes (one-shot).
    pub retain_only: Option<usize>,
    /// Once at least this many bytes are stored, close the connection of
    /// the next data chunk without responding (one-shot).
    pub drop_when_stored: Option<usize>,
}

enum Plan {
    /// Close the connection without writing anything.
    Drop,
    Respond {
        status: u16,
        headers: Vec<(String, String)>,
    },
}

impl FakeStore {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let base = format!("http://127.0.0.1:{port}");
        let session_uri = format!("{base}/session/1");
        let state = Arc::new(Mutex::new(StoreState::default()));

        let srv_state = state.clone();
        let srv_uri = session_uri.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let state = srv_state.clone();
                let uri = srv_uri.clone();
                tokio::spawn(async move {
                    handle(stream, state, uri).await;
                });
            }
        });

        Self {
            signed_url: format!("{base}/bucket/object?sig=ok"),
            session_uri,
            state,
        }
    }

    pub fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }
}

async fn handle(mut stream: TcpStream, state: Arc<Mutex<StoreState>>, session_uri: String) {
    let Some(req) = read_request(&mut stream).await else {
        return;
    };

    let plan = plan_response(&req, &state, &session_uri);
    match plan {
        Plan::Drop => {}
        Plan::Respond { status, headers } => {
            let reason = match status {
                200 => "OK",
                201 => "Created",
                308 => "Resume Incomplete",
                _ => "Error",
            };
            let mut resp = format!("HTTP/1.1 {status} {reason}\r\n");
            for (name, value) in headers {
                resp.push_str(&format!("{name}: {value}\r\n"));
            }
            resp.push_str("Content-Length: 0\r\nConnection: close\r\n\r\n");
            let _ = stream.write_all(resp.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    }
}

fn plan_response(req: &Request, state: &Arc<Mutex<StoreState>>, session_uri: &str) -> Plan {
    let mut s = state.lock().unwrap();

    if req.method == "POST" {
        s.initiations += 1;
        return match s.reject_initiation {
            Some(status) => Plan::Respond {
                status,
                headers: vec![],
            },
            None => Plan::Respond {
                status: 201,
                headers: vec![("Location".into(), session_uri.to_string())],
            },
        };
    }

    let range = req
        .headers
        .get("content-range")
        .cloned()
        .unwrap_or_default();

    // Marker PUT: committed-offset query or finalize.
    if let Some(total) = range.strip_prefix("bytes */") {
        s.marker_puts += 1;
        if s.completed {
            return Plan::Respond {
                status: 200,
                headers: vec![],
            };
        }
        if total != "*"
            && let Ok(n) = total.parse::<usize>()
            && n == s.data.len()
        {
            s.completed = true;
            return Plan::Respond {
                status: 200,
                headers: vec![],
            };
        }
        return resume_incomplete(s.data.len());
    }

    // Data chunk.
    let Some((start, end, total)) = parse_chunk_range(&range) else {
        return Plan::Respond {
            status: 400,
            headers: vec![],
        };
    };

    if let Some(limit) = s.drop_when_stored
        && s.data.len() >= limit
    {
        s.drop_when_stored = None;
        return Plan::Drop;
    }
    if let Some(status) = s.reject_chunks {
        return Plan::Respond {
            status,
            headers: vec![],
        };
    }

    s.chunk_puts += 1;
    if start != s.data.len() as u64 {
        // Contiguity violation: the client sent a range the store cannot
        // append.
        return Plan::Respond {
            status: 400,
            headers: vec![],
        };
    }

    s.chunk_ranges.push((start, end));
    s.data.extend_from_slice(&req.body);
    let ack_end = s.data.len();
    if let Some(keep) = s.retain_only.take() {
        s.data.truncate(keep);
    }

    if let Some(t) = total
        && end + 1 == t
    {
        s.completed = true;
        return Plan::Respond {
            status: 200,
            headers: vec![],
        };
    }
    resume_incomplete(ack_end)
}

fn resume_incomplete(acked: usize) -> Plan {
    let mut headers = vec![];
    if acked > 0 {
        headers.push(("Range".into(), format!("bytes=0-{}", acked - 1)));
    }
    Plan::Respond {
        status: 308,
        headers,
    }
}

fn parse_chunk_range(value: &str) -> Option<(u64, u64, Option<u64>)> {
    let rest = value.strip_prefix("bytes ")?;
    let (range, total) = rest.split_once('/')?;
    let (start, end) = range.split_once('-')?;
    let total = if total == "*" {
        None
    } else {
        Some(total.parse().ok()?)
    };
    Some((start.parse().ok()?, end.parse().ok()?, total))
}

struct Request {
    method: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

async fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 8192];

    // Read until the end of the header block.
    let header_end = loop {
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        let n = stream.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let request_line = lines.next()?;
    let method = request_line.split_whitespace().next()?.to_string();

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        body.extend_from_slice(&tmp[..n]);
    }
    body.truncate(content_length);

    Some(Request {
        method,
        headers,
        body,
    })
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
