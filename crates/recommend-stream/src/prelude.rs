//! Common imports for typical client usage.
pub use crate::{
    CancelHandle, ClientConfig, RecommendClient, RecommendError, RecommendSession,
    SessionFailure, SessionSnapshot, SessionState,
};
