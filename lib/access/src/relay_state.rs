//! Relay state carried through the identity-provider round trip.
//!
//! The relay state is the caller's post-login destination (a path plus
//! query parameters) with one extra `endpoint` parameter naming the
//! endpoint whose credentials started the flow. The callback strips that
//! parameter again before redirecting to the destination.
//!
//! Path, query pieces and fragment are kept as the caller wrote them, so
//! the destination comes back byte for byte once `endpoint` is removed.

use crate::error::FlowError;
use rootcause::prelude::Report;
use std::fmt;
use url::{Url, form_urlencoded};
use webflow_core::EndpointId;

/// Name of the query parameter that carries the endpoint id.
pub const ENDPOINT_PARAM: &str = "endpoint";

/// A parsed relay state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayState {
    /// `scheme://authority` when the caller supplied an absolute URL.
    origin: Option<String>,
    path: String,
    /// Raw `key` / `key=value` pieces, still percent-encoded.
    params: Vec<(String, Option<String>)>,
    fragment: Option<String>,
}

impl RelayState {
    /// Parses a caller-supplied state. Blank or absent input means `/`.
    pub fn parse(raw: Option<&str>) -> Result<Self, Report<FlowError>> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("/");

        let (rest, fragment) = match raw.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (raw, None),
        };
        let (head, query) = rest.split_once('?').unwrap_or((rest, ""));

        let (origin, path) = match scheme(head) {
            Some(scheme) => {
                let (origin, path) = split_absolute(raw, head, scheme)?;
                (Some(origin), path)
            }
            None => (None, head.to_string()),
        };

        let params = query
            .split('&')
            .filter(|piece| !piece.is_empty())
            .map(|piece| match piece.split_once('=') {
                Some((key, value)) => (key.to_string(), Some(value.to_string())),
                None => (piece.to_string(), None),
            })
            .collect();

        Ok(Self {
            origin,
            path,
            params,
            fragment,
        })
    }

    /// Builds the relay state sent to the provider on the authorize leg.
    ///
    /// A caller parameter named `endpoint` is overwritten.
    pub fn build(
        caller_state: Option<&str>,
        endpoint: &EndpointId,
    ) -> Result<Self, Report<FlowError>> {
        let mut state = Self::parse(caller_state)?;
        state.set_param(ENDPOINT_PARAM, endpoint.as_str());
        Ok(state)
    }

    /// Sets a parameter, replacing the first existing occurrence in place
    /// and dropping any later duplicates, or appending it.
    pub fn set_param(&mut self, name: &str, value: &str) {
        let value = encode(value);
        match self.params.iter().position(|(key, _)| decode(key) == name) {
            Some(index) => {
                self.params[index].1 = Some(value);
                let mut seen = 0usize;
                self.params.retain(|(key, _)| {
                    if decode(key) != name {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.params.push((encode(name), Some(value))),
        }
    }

    /// Removes and returns the decoded `endpoint` parameter.
    ///
    /// The returned state is the caller's original destination.
    #[must_use]
    pub fn extract_endpoint(mut self) -> (Option<String>, Self) {
        let mut endpoint = None;
        self.params.retain(|(key, value)| {
            if decode(key) == ENDPOINT_PARAM {
                endpoint = Some(value.as_deref().map(decode).unwrap_or_default());
                false
            } else {
                true
            }
        });
        (endpoint, self)
    }

    /// Renders the state as a redirect target, with no bare trailing `?`.
    #[must_use]
    pub fn finalize(&self) -> String {
        self.to_string()
    }

    /// Returns the path component.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the query parameters in order, as written.
    #[must_use]
    pub fn params(&self) -> &[(String, Option<String>)] {
        &self.params
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(origin) = &self.origin {
            f.write_str(origin)?;
        }
        f.write_str(&self.path)?;
        for (index, (key, value)) in self.params.iter().enumerate() {
            f.write_str(if index == 0 { "?" } else { "&" })?;
            f.write_str(key)?;
            if let Some(value) = value {
                write!(f, "={value}")?;
            }
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

/// Returns the URL scheme of `head`, if it starts with one.
fn scheme(head: &str) -> Option<&str> {
    let (scheme, _) = head.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    let valid = first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

/// Splits an absolute http(s) state into its origin and raw path.
fn split_absolute(
    raw: &str,
    head: &str,
    scheme: &str,
) -> Result<(String, String), Report<FlowError>> {
    if !matches!(scheme.to_ascii_lowercase().as_str(), "http" | "https") {
        return Err(FlowError::InvalidRelayState {
            reason: format!("unsupported scheme '{scheme}'"),
        }
        .into());
    }

    let url = Url::parse(raw).map_err(|e| FlowError::InvalidRelayState {
        reason: e.to_string(),
    })?;
    let after_scheme = &head[scheme.len() + 1..];
    let Some(authority_and_path) = after_scheme.strip_prefix("//") else {
        return Err(FlowError::InvalidRelayState {
            reason: "missing authority".to_string(),
        }
        .into());
    };
    if url.host_str().is_none() {
        return Err(FlowError::InvalidRelayState {
            reason: "missing host".to_string(),
        }
        .into());
    }

    let (authority, path) = match authority_and_path.find('/') {
        Some(index) => authority_and_path.split_at(index),
        None => (authority_and_path, "/"),
    };
    Ok((format!("{scheme}://{authority}"), path.to_string()))
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn decode(raw: &str) -> String {
    form_urlencoded::parse(format!("_={raw}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}
