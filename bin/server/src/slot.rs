//! Cookie binding of the session slot.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration as TimeDuration;
use webflow_access::SessionSlot;

use crate::config::CookieConfig;

/// The session slot backed by a single cookie.
///
/// Remembers the value the request arrived with, so a `Set-Cookie` is only
/// emitted when the flow changed it.
#[derive(Debug)]
pub struct CookieSlot {
    jar: CookieJar,
    original: Option<String>,
    current: Option<String>,
}

impl CookieSlot {
    /// Reads the slot from request headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap, config: &CookieConfig) -> Self {
        let jar = CookieJar::from_headers(headers);
        let original = jar
            .get(&config.name)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty());
        Self {
            jar,
            current: original.clone(),
            original,
        }
    }

    /// Returns true if the slot was written with a different value.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.original != self.current
    }

    /// Returns the jar carrying the cookie update, if any.
    #[must_use]
    pub fn into_jar(self, config: &CookieConfig) -> CookieJar {
        if !self.is_changed() {
            return self.jar;
        }

        match self.current {
            Some(value) => {
                let cookie = Cookie::build((config.name.clone(), value))
                    .path("/")
                    .http_only(true)
                    .secure(config.secure)
                    .same_site(SameSite::Lax);
                self.jar.add(cookie)
            }
            None => {
                let removal = Cookie::build((config.name.clone(), ""))
                    .path("/")
                    .http_only(true)
                    .secure(config.secure)
                    .same_site(SameSite::Lax)
                    .max_age(TimeDuration::ZERO);
                self.jar.add(removal)
            }
        }
    }
}

impl SessionSlot for CookieSlot {
    fn get(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn put(&mut self, value: Option<String>) {
        self.current = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{COOKIE, SET_COOKIE};
    use axum::response::IntoResponse;

    fn headers(cookie: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = cookie {
            headers.insert(COOKIE, cookie.parse().expect("header value"));
        }
        headers
    }

    fn set_cookies(jar: CookieJar) -> Vec<String> {
        let response = (jar, ()).into_response();
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().expect("ascii").to_string())
            .collect()
    }

    #[test]
    fn reads_existing_cookie() {
        let slot = CookieSlot::from_headers(
            &headers(Some("other=1; webflow.principal=blob")),
            &CookieConfig::default(),
        );
        assert_eq!(slot.get(), Some("blob"));
        assert!(!slot.is_changed());
    }

    #[test]
    fn unchanged_slot_sets_no_cookie() {
        let config = CookieConfig::default();
        let slot = CookieSlot::from_headers(&headers(Some("webflow.principal=blob")), &config);
        assert!(set_cookies(slot.into_jar(&config)).is_empty());
    }

    #[test]
    fn new_value_sets_cookie() {
        let config = CookieConfig::default();
        let mut slot = CookieSlot::from_headers(&headers(None), &config);
        slot.put(Some("blob".to_string()));

        let cookies = set_cookies(slot.into_jar(&config));
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("webflow.principal=blob"));
        assert!(cookies[0].contains("HttpOnly"));
        assert!(cookies[0].contains("SameSite=Lax"));
        assert!(cookies[0].contains("Secure"));
    }

    #[test]
    fn cleared_slot_expires_cookie() {
        let config = CookieConfig {
            secure: false,
            ..CookieConfig::default()
        };
        let mut slot = CookieSlot::from_headers(&headers(Some("webflow.principal=blob")), &config);
        slot.put(None);

        let cookies = set_cookies(slot.into_jar(&config));
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].contains("Max-Age=0"));
        assert!(!cookies[0].contains("Secure"));
    }
}
