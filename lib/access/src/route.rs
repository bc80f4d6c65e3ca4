//! Classification of intercepted request paths.

/// What the flow does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Start the authorize leg: redirect to the identity provider.
    Authorize,
    /// Finish the flow: exchange the code and redirect to the relay state.
    Callback,
    /// Not ours: load the principal and hand the request to the application.
    PassThrough,
}

impl Route {
    /// Classifies a request path against the configured prefix.
    ///
    /// Matching is exact and case-insensitive after dropping a single
    /// trailing slash. `prefix` must already be normalized (no trailing
    /// slash).
    #[must_use]
    pub fn classify(path: &str, prefix: &str) -> Self {
        let path = path.strip_suffix('/').unwrap_or(path);

        if path.eq_ignore_ascii_case(prefix) {
            return Self::Authorize;
        }

        let is_callback = path
            .get(..prefix.len())
            .zip(path.get(prefix.len()..))
            .is_some_and(|(head, tail)| {
                head.eq_ignore_ascii_case(prefix) && tail.eq_ignore_ascii_case("/callback")
            });

        if is_callback {
            Self::Callback
        } else {
            Self::PassThrough
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "/auth/provider";

    #[test]
    fn exact_prefix_is_authorize() {
        assert_eq!(Route::classify("/auth/provider", PREFIX), Route::Authorize);
        assert_eq!(Route::classify("/auth/provider/", PREFIX), Route::Authorize);
        assert_eq!(Route::classify("/AUTH/Provider", PREFIX), Route::Authorize);
    }

    #[test]
    fn callback_suffix_is_callback() {
        assert_eq!(
            Route::classify("/auth/provider/callback", PREFIX),
            Route::Callback
        );
        assert_eq!(
            Route::classify("/Auth/Provider/CALLBACK/", PREFIX),
            Route::Callback
        );
    }

    #[test]
    fn other_paths_pass_through() {
        assert_eq!(Route::classify("/", PREFIX), Route::PassThrough);
        assert_eq!(Route::classify("/resources", PREFIX), Route::PassThrough);
        assert_eq!(
            Route::classify("/auth/provider/failure", PREFIX),
            Route::PassThrough
        );
        assert_eq!(
            Route::classify("/auth/provider/callback/extra", PREFIX),
            Route::PassThrough
        );
        assert_eq!(Route::classify("/auth/providers", PREFIX), Route::PassThrough);
    }

    #[test]
    fn only_one_trailing_slash_is_dropped() {
        assert_eq!(Route::classify("/auth/provider//", PREFIX), Route::PassThrough);
    }
}
