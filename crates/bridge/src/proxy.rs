//! Request/response contract shared with the host gateway.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;
use tokio::sync::watch;
use url::Url;

use crate::error::BridgeError;

/// Streaming request body
pub type Body = Pin<Box<dyn AsyncRead + Send>>;

/// Inbound request as seen by a backend
pub struct ProxyRequest {
    pub method: String,
    pub url: Url,
    /// Multi-valued, string-keyed headers
    pub headers: HashMap<String, Vec<String>>,
    pub body: Option<Body>,
}

impl ProxyRequest {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into(),
            url,
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Append a header value
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(Box::pin(std::io::Cursor::new(body.into())));
        self
    }

    pub fn with_body_reader(mut self, reader: impl AsyncRead + Send + 'static) -> Self {
        self.body = Some(Box::pin(reader));
        self
    }

    /// First value of a query parameter
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

impl fmt::Debug for ProxyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Backend response handed back to the gateway
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxyResponse {
    pub is_complete: bool,
    pub data: Option<Bytes>,
    pub metadata: HashMap<String, Vec<String>>,
}

impl ProxyResponse {
    /// Completed response without payload
    pub fn complete() -> Self {
        Self {
            is_complete: true,
            ..Default::default()
        }
    }
}

/// Per-call cancellation and deadline.
///
/// The cancel receiver flips to `true` when the caller gives up. A dropped
/// sender means nobody can cancel anymore, not that the call is cancelled.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: Option<watch::Receiver<bool>>,
    timeout: Option<Duration>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    async fn cancelled(&self) {
        if let Some(rx) = &self.cancel {
            let mut rx = rx.clone();
            let fired = rx.wait_for(|cancelled| *cancelled).await.is_ok();
            if fired {
                return;
            }
        }
        std::future::pending::<()>().await
    }

    /// Run `work` until it finishes, the call is cancelled, or the deadline passes.
    pub async fn run<T, F>(&self, work: F) -> Result<T, BridgeError>
    where
        F: Future<Output = Result<T, BridgeError>>,
    {
        if self.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }
        let deadline = async {
            match self.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            result = work => result,
            _ = self.cancelled() => Err(BridgeError::Cancelled),
            _ = deadline => Err(BridgeError::TimedOut),
        }
    }
}

/// A route's backend handler
#[async_trait]
pub trait Proxy: Send + Sync {
    async fn call(&self, ctx: &CallContext, request: ProxyRequest) -> Result<ProxyResponse, BridgeError>;
}
