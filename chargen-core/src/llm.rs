//! The completion boundary the driver talks to.

use async_trait::async_trait;
use claude::{Claude, Request, Response};

/// A stateless request/response chat completion backend.
///
/// Implemented for [`Claude`]; tests use
/// [`ScriptedLlm`](crate::testing::ScriptedLlm).
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one request and wait for the full response.
    async fn complete(&self, request: Request) -> Result<Response, claude::Error>;

    /// Model used when the driver does not pin one.
    fn default_model(&self) -> &str;
}

#[async_trait]
impl LlmClient for Claude {
    async fn complete(&self, request: Request) -> Result<Response, claude::Error> {
        Claude::complete(self, request).await
    }

    fn default_model(&self) -> &str {
        self.model()
    }
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Box<T> {
    async fn complete(&self, request: Request) -> Result<Response, claude::Error> {
        (**self).complete(request).await
    }

    fn default_model(&self) -> &str {
        (**self).default_model()
    }
}
