use std::time::Duration;

/// Failure modes shared by every provider adapter.
///
/// Per-request failures propagate to the immediate caller; nothing here is
/// retried automatically. A malformed line inside a stream is not an error at
/// this level — adapters log and skip it.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// A required credential is absent. Raised before any network I/O.
    #[error("{provider} API key is not configured")]
    Configuration { provider: &'static str },

    /// Connection-level failure (DNS, TLS, reset, decode).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("API request failed: {status} {reason}")]
    Status { status: u16, reason: String },

    /// The body parsed as JSON but the expected field path is missing.
    ///
    /// `summary` is a truncated copy of the body, safe to show to a user:
    /// response bodies never carry the API key.
    #[error("unexpected {provider} response: missing {path} in {summary}")]
    Schema {
        provider: &'static str,
        path: &'static str,
        summary: String,
    },

    /// The model identifier matches no known adapter or prefix.
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// The request exceeded the local-server deadline and was aborted.
    #[error("request to local server timed out after {0:?}")]
    Timeout(Duration),
}

/// Cap a response body for inclusion in an error message.
pub(crate) fn body_summary(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_truncates_long_bodies() {
        let long = "x".repeat(500);
        let s = body_summary(&long);
        assert!(s.len() < 210);
        assert!(s.ends_with('…'));
    }

    #[test]
    fn summary_respects_utf8_boundaries() {
        let long = "é".repeat(300);
        let s = body_summary(&long);
        assert!(s.ends_with('…'));
    }

    #[test]
    fn unsupported_model_message_names_the_model() {
        let err = ProviderError::UnsupportedModel("gpt-99".into());
        assert_eq!(err.to_string(), "Unsupported model: gpt-99");
    }
}
