use std::sync::Arc;

use crate::config::ClientConfig;
use crate::errors::RecommendError;
use crate::session::RecommendSession;
use crate::transport::{HttpTransport, RecommendTransport};

/// Entry point for creating recommendation sessions.
///
/// Sessions created from one client share its transport but are otherwise
/// independent: starting or cancelling one never affects another.
#[derive(Clone)]
pub struct RecommendClient {
    transport: Arc<dyn RecommendTransport>,
}

impl RecommendClient {
    /// Creates a client that talks HTTP to `config.base_url`.
    pub fn new(config: ClientConfig) -> Result<Self, RecommendError> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new(config)?)))
    }

    /// Creates a client over a custom transport.
    pub fn with_transport(transport: Arc<dyn RecommendTransport>) -> Self {
        Self { transport }
    }

    /// Creates an idle session.
    pub fn session(&self) -> RecommendSession {
        RecommendSession::new(self.transport.clone())
    }

    /// Runs one recommendation to a terminal state and returns its text.
    ///
    /// Must be called within a Tokio runtime.
    pub async fn collect_text<I, S>(
        &self,
        product_ids: I,
        user_query: Option<String>,
    ) -> Result<String, RecommendError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut session = self.session();
        session.start(product_ids, user_query)?;
        session.finish().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::request::RecommendRequest;
    use crate::transport::ChunkStream;
    use futures::stream;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        requests: Mutex<Vec<RecommendRequest>>,
    }

    #[async_trait::async_trait]
    impl RecommendTransport for RecordingTransport {
        async fn open_stream(
            &self,
            request: &RecommendRequest,
        ) -> Result<ChunkStream, TransportError> {
            self.requests.lock().expect("lock").push(request.clone());
            let body = format!(
                "data: {}\n\ndata: {{\"event\":\"done\",\"data\":\"\"}}\n\n",
                serde_json::json!({"event": "delta", "data": request.product_ids.join(",")})
            );
            Ok(Box::pin(stream::iter(vec![Ok::<_, TransportError>(
                bytes::Bytes::from(body),
            )])))
        }
    }

    #[tokio::test]
    async fn collect_text_returns_final_text_and_forwards_request() {
        let transport = Arc::new(RecordingTransport::default());
        let client = RecommendClient::with_transport(transport.clone());

        let text = client
            .collect_text(["a", "b"], Some("gift".into()))
            .await
            .expect("completed");
        assert_eq!(text, "a,b");

        let requests = transport.requests.lock().expect("lock");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].user_query.as_deref(), Some("gift"));
    }

    #[tokio::test]
    async fn collect_text_rejects_empty_selection_locally() {
        let transport = Arc::new(RecordingTransport::default());
        let client = RecommendClient::with_transport(transport.clone());

        let err = client
            .collect_text(Vec::<String>::new(), None)
            .await
            .expect_err("invalid");
        assert!(matches!(err, RecommendError::InvalidRequest(_)));
        assert!(transport.requests.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn sessions_from_one_client_are_independent() {
        let client = RecommendClient::with_transport(Arc::new(RecordingTransport::default()));
        let mut first = client.session();
        let second = client.session();
        assert_ne!(first.session_id(), second.session_id());

        first.start(["x"], None).expect("start");
        assert_eq!(first.finish().await.expect("done"), "x");
        assert!(!second.snapshot().is_terminal());
    }

    #[test]
    fn http_client_rejects_blank_base_url() {
        let result = RecommendClient::new(ClientConfig::new(""));
        assert!(matches!(result, Err(RecommendError::Config(_))));
    }
}
