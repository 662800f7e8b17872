//! Request descriptors: which service and method a stream talks to.

use std::fmt;
use std::sync::Arc;

/// Content type used when a descriptor does not specify one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/postcard";

/// Immutable description of the call a stream belongs to.
pub trait Request: Send + Sync {
    fn service(&self) -> &str;

    fn method(&self) -> &str;

    fn content_type(&self) -> &str {
        DEFAULT_CONTENT_TYPE
    }
}

/// Owned [`Request`] implementation.
///
/// Cloning is cheap; all clones share the same strings.
#[derive(Clone, PartialEq, Eq)]
pub struct MethodRequest {
    inner: Arc<MethodRequestInner>,
}

#[derive(PartialEq, Eq)]
struct MethodRequestInner {
    service: String,
    method: String,
    content_type: String,
}

impl MethodRequest {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self::with_content_type(service, method, DEFAULT_CONTENT_TYPE)
    }

    pub fn with_content_type(
        service: impl Into<String>,
        method: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(MethodRequestInner {
                service: service.into(),
                method: method.into(),
                content_type: content_type.into(),
            }),
        }
    }
}

impl Request for MethodRequest {
    fn service(&self) -> &str {
        &self.inner.service
    }

    fn method(&self) -> &str {
        &self.inner.method
    }

    fn content_type(&self) -> &str {
        &self.inner.content_type
    }
}

impl fmt::Debug for MethodRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.inner.service, self.inner.method)
    }
}
