//! Streaming client for the product recommendation endpoint.
//!
//! A [`RecommendSession`] posts the selected product ids, consumes the
//! line-framed event stream the server answers with, and exposes a
//! consistent, cancelable view of the text being generated.
//!
//! # Usage
//!
//! ```no_run
//! use recommend_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), RecommendError> {
//! let client = RecommendClient::new(ClientConfig::new("http://localhost:8000"))?;
//!
//! let mut session = client.session();
//! session.start(["sku-1", "sku-2"], Some("summer outfit".into()))?;
//!
//! let mut updates = session.subscribe();
//! while updates.changed().await.is_ok() {
//!     let snapshot = updates.borrow_and_update().clone();
//!     if snapshot.is_terminal() {
//!         break;
//!     }
//!     println!("{}", snapshot.text);
//! }
//!
//! println!("{}", session.finish().await?);
//! # Ok(())
//! # }
//! ```

/// Entry point that creates sessions.
pub mod client;
/// Client configuration.
pub mod config;
/// Session state and frame transitions.
pub mod dispatch;
/// Public error types.
pub mod errors;
/// Incremental frame parser.
pub mod frame;
/// Tracing subscriber setup for binaries.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Request body and validation.
pub mod request;
/// Streaming session lifecycle and cancellation.
pub mod session;
/// Transport contract and HTTP implementation.
pub mod transport;

pub use client::RecommendClient;
pub use config::ClientConfig;
pub use dispatch::{SessionSnapshot, SessionState};
pub use errors::{RecommendError, SessionFailure, TransportError};
pub use frame::{Frame, FrameKind, FrameParser};
pub use request::RecommendRequest;
pub use session::{CancelHandle, RecommendSession};
pub use transport::{ChunkStream, HttpTransport, RecommendTransport};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn public_types_are_send_sync() {
        assert_send_sync::<RecommendClient>();
        assert_send_sync::<RecommendSession>();
        assert_send_sync::<CancelHandle>();
        assert_send_sync::<SessionSnapshot>();
        assert_send_sync::<FrameParser>();
        assert_send_sync::<HttpTransport>();
        assert_send_sync::<RecommendError>();
    }
}
