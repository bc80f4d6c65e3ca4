//! Failure policy of the authorize and callback legs.
//!
//! A failed leg never surfaces as a raw error. Without a custom handler the
//! user agent is redirected to `<prefix>/failure` with the error text in
//! `message` and the original `state` parameter, if there was one. No
//! principal is stored on a failed leg.

use std::fmt;
use url::form_urlencoded;

/// The leg of the flow a request is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Authorizing,
    CallingBack,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authorizing => "authorize",
            Self::CallingBack => "callback",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the default failure redirect target.
#[must_use]
pub fn failure_location(failure_path: &str, message: &str, state: Option<&str>) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("message", message);
    if let Some(state) = state {
        query.append_pair("state", state);
    }
    format!("{failure_path}?{}", query.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::RequestParams;

    #[test]
    fn message_and_state_are_query_params() {
        let location = failure_location(
            "/auth/provider/failure",
            "access_denied",
            Some("/?endpoint=login.example.com"),
        );
        let (path, query) = location.split_once('?').expect("query");
        assert_eq!(path, "/auth/provider/failure");

        let params = RequestParams::from_query(Some(query));
        assert_eq!(params.get("message"), Some("access_denied"));
        assert_eq!(params.get("state"), Some("/?endpoint=login.example.com"));
    }

    #[test]
    fn state_is_omitted_when_absent() {
        let location = failure_location("/auth/provider/failure", "error some error", None);
        assert_eq!(location, "/auth/provider/failure?message=error+some+error");
    }

    #[test]
    fn phase_names() {
        assert_eq!(Phase::Authorizing.to_string(), "authorize");
        assert_eq!(Phase::CallingBack.to_string(), "callback");
    }
}
