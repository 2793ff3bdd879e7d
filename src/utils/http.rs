use serde::{Deserialize, Serialize};

/// Uniform JSON envelope for every HTTP response.
#[derive(Debug, Deserialize, Serialize)]
pub struct HttpResponse<T> {
    pub code: u16,
    pub message: String,
    pub body: T,
}

impl<T> HttpResponse<T> {
    pub fn new(code: u16, message: String, body: T) -> Self {
        Self { code, message, body }
    }

    pub fn ok(body: T) -> Self {
        Self::new(200, "ok".to_string(), body)
    }
}

impl HttpResponse<()> {
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::new(code, message.into(), ())
    }
}
