//! Transport contract used by sessions to open the chunked response stream.
//!
//! The session only sees raw byte chunks; framing is handled by
//! [`FrameParser`](crate::frame::FrameParser).

mod http;

use std::pin::Pin;

pub use http::HttpTransport;

use crate::errors::TransportError;
use crate::request::RecommendRequest;

/// Raw body chunks as delivered by the transport, with no alignment to
/// frame boundaries.
pub type ChunkStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, TransportError>> + Send + 'static>>;

/// Opens one streaming recommendation request.
///
/// Dropping the returned stream must abort the underlying request.
#[async_trait::async_trait]
pub trait RecommendTransport: Send + Sync {
    async fn open_stream(&self, request: &RecommendRequest) -> Result<ChunkStream, TransportError>;
}
