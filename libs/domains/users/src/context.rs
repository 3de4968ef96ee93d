use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::trace_context::{SpanContextInjector, W3cSpanContextInjector};

/// Per-call context handed to every service operation
///
/// Carries the caller's cancellation signal and the injector used to stamp
/// outbox records with the current trace context.
#[derive(Debug, Clone)]
pub struct RequestContext {
    cancel: CancellationToken,
    span_injector: Arc<dyn SpanContextInjector>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            span_injector: Arc::new(W3cSpanContextInjector::new()),
        }
    }

    /// Tie the context to an existing cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_span_injector(mut self, injector: Arc<dyn SpanContextInjector>) -> Self {
        self.span_injector = injector;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the context is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn span_context(&self) -> String {
        self.span_injector.inject()
    }
}
