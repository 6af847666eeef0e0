use futures::StreamExt as _;
use reqwest::header::ACCEPT;
use tracing::debug;

use super::{ChunkStream, RecommendTransport};
use crate::config::ClientConfig;
use crate::errors::{RecommendError, TransportError};
use crate::request::RecommendRequest;

/// `reqwest`-backed transport for the recommendation endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Creates a transport from explicit client configuration.
    pub fn new(config: ClientConfig) -> Result<Self, RecommendError> {
        if config.base_url.trim().is_empty() {
            return Err(RecommendError::Config("base_url must not be empty".into()));
        }
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RecommendError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait::async_trait]
impl RecommendTransport for HttpTransport {
    async fn open_stream(&self, request: &RecommendRequest) -> Result<ChunkStream, TransportError> {
        let url = self.config.recommend_url();
        debug!(%url, products = request.product_ids.len(), "opening recommendation stream");

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::request(describe_reqwest_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = extract_error_detail(&body)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(TransportError::status(status.as_u16(), detail));
        }

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::read(describe_reqwest_error(&e))));
        Ok(Box::pin(chunks))
    }
}

fn describe_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timed out: {err}")
    } else {
        err.to_string()
    }
}

/// Pulls a string `detail` out of an error body like `{"detail": "..."}`.
fn extract_error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    /// Serves exactly one HTTP exchange, writing `chunks` one by one, and
    /// returns the raw request text.
    async fn serve_once(
        status_line: &'static str,
        chunks: Vec<&'static [u8]>,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let request = read_request(&mut socket).await;
            let head = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n"
            );
            socket.write_all(head.as_bytes()).await.expect("head");
            for chunk in chunks {
                socket.write_all(chunk).await.expect("chunk");
                socket.flush().await.expect("flush");
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let _ = socket.shutdown().await;
            request
        });
        (format!("http://{addr}"), handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut tmp = [0_u8; 1024];
        loop {
            let n = socket.read(&mut tmp).await.expect("read");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&tmp[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    #[tokio::test]
    async fn posts_json_body_and_streams_raw_chunks() {
        let chunks: Vec<&'static [u8]> = vec![
            &b"data: {\"event\":\"delta\",\"da"[..],
            &b"ta\":\"Hel\"}\n\ndata: {\"event\":\"delta\",\"data\":\"lo\"}\n\n"[..],
            &b"data: {\"event\":\"done\",\"data\":\"\"}\n\n"[..],
        ];
        let expected: Vec<u8> = chunks.concat();
        let (base_url, server) = serve_once("200 OK", chunks).await;

        let transport = HttpTransport::new(ClientConfig::new(base_url)).expect("transport");
        let request = RecommendRequest::new(["p1", "p2"], Some("casual".into())).expect("request");
        let mut stream = transport.open_stream(&request).await.expect("open");

        let mut received = Vec::new();
        while let Some(chunk) = stream.next().await {
            received.extend_from_slice(&chunk.expect("chunk"));
        }
        assert_eq!(received, expected);

        let raw_request = server.await.expect("server");
        assert!(raw_request.starts_with("POST /api/v1/recommend?stream=true "));
        let body = raw_request.split("\r\n\r\n").nth(1).expect("body");
        let body: serde_json::Value = serde_json::from_str(body).expect("json body");
        assert_eq!(
            body,
            serde_json::json!({"product_ids": ["p1", "p2"], "user_query": "casual"})
        );
    }

    #[tokio::test]
    async fn non_success_status_surfaces_server_detail() {
        let (base_url, _server) = serve_once(
            "503 Service Unavailable",
            vec![&b"{\"detail\":\"recommendation service unavailable\"}"[..]],
        )
        .await;
        let transport = HttpTransport::new(ClientConfig::new(base_url)).expect("transport");
        let request = RecommendRequest::new(["p1"], None).expect("request");
        let err = match transport.open_stream(&request).await {
            Ok(_) => panic!("503 should fail"),
            Err(err) => err,
        };
        assert_eq!(
            err,
            TransportError::status(503, "recommendation service unavailable")
        );
    }

    #[tokio::test]
    async fn non_string_detail_falls_back_to_status_code() {
        let (base_url, _server) = serve_once(
            "422 Unprocessable Entity",
            vec![&b"{\"detail\":[{\"msg\":\"too short\"}]}"[..]],
        )
        .await;
        let transport = HttpTransport::new(ClientConfig::new(base_url)).expect("transport");
        let request = RecommendRequest::new(["p1"], None).expect("request");
        let err = match transport.open_stream(&request).await {
            Ok(_) => panic!("422 should fail"),
            Err(err) => err,
        };
        assert_eq!(err, TransportError::status(422, "HTTP 422"));
    }

    #[tokio::test]
    async fn session_over_http_completes_with_reassembled_text() {
        let (base_url, _server) = serve_once(
            "200 OK",
            vec![
                &b": heartbeat\n\ndata: {\"event\":\"delta\",\"data\":\"\xec\x95"[..],
                &b"\x88\xeb\x85\x95\"}\n\ndata: {\"event\":\"done\",\"data\":\"\"}\n\n"[..],
            ],
        )
        .await;
        let client = crate::RecommendClient::new(ClientConfig::new(base_url)).expect("client");
        let text = tokio::time::timeout(
            Duration::from_secs(5),
            client.collect_text(["p1"], None),
        )
        .await
        .expect("no hang")
        .expect("completed");
        assert_eq!(text, "안녕");
    }

    #[tokio::test]
    async fn refused_connection_is_a_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let transport =
            HttpTransport::new(ClientConfig::new(format!("http://{addr}"))).expect("transport");
        let request = RecommendRequest::new(["p1"], None).expect("request");
        let err = match transport.open_stream(&request).await {
            Ok(_) => panic!("closed port should fail"),
            Err(err) => err,
        };
        assert!(matches!(err, TransportError::Request { .. }));
    }

    #[test]
    fn rejects_blank_base_url() {
        let result = HttpTransport::new(ClientConfig::new("  "));
        assert!(matches!(result, Err(RecommendError::Config(_))));
    }

    #[test]
    fn extracts_only_string_details() {
        assert_eq!(
            extract_error_detail("{\"detail\":\"bad\"}").as_deref(),
            Some("bad")
        );
        assert_eq!(extract_error_detail("{\"detail\":[1]}"), None);
        assert_eq!(extract_error_detail("<html>"), None);
    }
}
