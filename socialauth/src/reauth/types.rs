use serde::{Deserialize, Serialize};

use crate::reauth::errors::ReauthError;
use crate::socialaccount::SocialLogin;
use crate::utils::{base64url_decode, base64url_encode};

/// Enough of an HTTP request to reissue it after reauthentication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StashedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    /// Base64url encoded body
    body: String,
}

impl StashedRequest {
    pub fn new(
        method: &str,
        path: &str,
        query: Option<&str>,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            query: query.filter(|q| !q.is_empty()).map(str::to_string),
            content_type: content_type.map(str::to_string),
            body: base64url_encode(body),
        }
    }

    pub fn body(&self) -> Result<Vec<u8>, ReauthError> {
        Ok(base64url_decode(&self.body)?)
    }

    /// Path with the query string, as it was requested.
    pub fn uri(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}

/// A flow that waits for reauthentication and then continues in-process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "flow", content = "data", rename_all = "snake_case")]
pub enum ResumeState {
    /// Connect the stashed provider login to the current user.
    SocialConnect(Box<SocialLogin>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub(crate) enum StashKind {
    Request(StashedRequest),
    Continue(ResumeState),
}

/// What waits in the session. Released once the user has reauthenticated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ReauthStash {
    pub(crate) kind: StashKind,
    #[serde(default)]
    pub(crate) released: bool,
}

/// How to carry on after a successful reauthentication.
#[derive(Debug, Clone)]
pub enum ResumeAction {
    /// Reissue the stashed request at its path
    Replay(StashedRequest),
    Continue(ResumeState),
    Redirect(String),
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stashed_request_keeps_body_bytes() {
        let body = b"provider=github&account=\xff\x00binary";
        let request = StashedRequest::new(
            "post",
            "/accounts/3rdparty/disconnect/",
            Some(""),
            Some("application/x-www-form-urlencoded"),
            body,
        );
        assert_eq!(request.method, "POST");
        assert_eq!(request.query, None);
        assert_eq!(request.uri(), "/accounts/3rdparty/disconnect/");

        let json = serde_json::to_string(&request).unwrap();
        let back: StashedRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.body().unwrap(), body);
        assert_eq!(back, request);
    }

    #[test]
    fn test_uri_with_query() {
        let request = StashedRequest::new("POST", "/a/", Some("x=1"), None, b"");
        assert_eq!(request.uri(), "/a/?x=1");
    }
}
