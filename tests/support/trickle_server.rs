//! Raw TCP origin that drips its body out slowly, without range support.
//!
//! wiremock only delays whole responses; this server paces the body itself so
//! tests can tell idle-read limits apart from total request time.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How the GET body is paced.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// Bytes written per step.
    pub step_bytes: usize,
    /// Pause between steps.
    pub interval: Duration,
    /// Stop writing (but keep the connection open) after this many bytes.
    pub stall_after: Option<usize>,
}

/// Starts the origin and returns the URL of its single resource.
pub async fn trickle_origin(body: Vec<u8>, pacing: Pacing) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let body = body.clone();
            tokio::spawn(serve(socket, body, pacing));
        }
    });
    format!("http://{addr}/slow.bin")
}

async fn serve(mut socket: TcpStream, body: Vec<u8>, pacing: Pacing) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }

    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    if socket.write_all(head.as_bytes()).await.is_err() || request.starts_with(b"HEAD") {
        return;
    }

    let mut sent = 0;
    for step in body.chunks(pacing.step_bytes.max(1)) {
        if pacing.stall_after.is_some_and(|limit| sent >= limit) {
            tokio::time::sleep(Duration::from_secs(30)).await;
            return;
        }
        if socket.write_all(step).await.is_err() || socket.flush().await.is_err() {
            return;
        }
        sent += step.len();
        tokio::time::sleep(pacing.interval).await;
    }
}
