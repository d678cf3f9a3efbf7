//! Session key extraction from request headers and cookies.

use std::collections::HashMap;

use cookie::Cookie;

use crate::config::SessionConfig;

/// Read access to a name/value map such as request headers or cookies.
pub trait KeyLookup {
    fn lookup(&self, name: &str) -> Option<&str>;
}

impl KeyLookup for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl<L: KeyLookup + ?Sized> KeyLookup for &L {
    fn lookup(&self, name: &str) -> Option<&str> {
        (**self).lookup(name)
    }
}

#[cfg(feature = "axum_api")]
impl KeyLookup for axum::http::HeaderMap {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

#[cfg(feature = "actix")]
impl KeyLookup for actix_web::http::header::HeaderMap {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Cookies parsed from one or more `Cookie` request headers.
///
/// When a name appears twice the first occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct CookieMap {
    cookies: HashMap<String, String>,
}

impl CookieMap {
    pub fn parse<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut cookies = HashMap::new();

        for header in headers {
            for cookie in Cookie::split_parse(header).flatten() {
                cookies
                    .entry(cookie.name().to_owned())
                    .or_insert_with(|| cookie.value().to_owned());
            }
        }

        Self { cookies }
    }

    #[cfg(feature = "axum_api")]
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        Self::parse(
            headers
                .get_all(axum::http::header::COOKIE)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        )
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

impl KeyLookup for CookieMap {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

/// Finds the session key of a request.
///
/// The configured header is consulted first, then the configured cookie.
/// Empty values count as absent.
#[derive(Debug, Clone, Default)]
pub struct KeyResolver {
    token: Option<String>,
    cookie: Option<String>,
}

impl KeyResolver {
    pub fn new(token: Option<String>, cookie: Option<String>) -> Self {
        Self { token, cookie }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.token.clone(), config.cookie.clone())
    }

    pub fn resolve(&self, headers: &impl KeyLookup, cookies: &impl KeyLookup) -> Option<String> {
        let from_header = self
            .token
            .as_deref()
            .and_then(|name| headers.lookup(name))
            .filter(|value| !value.is_empty());

        let from_cookie = || {
            self.cookie
                .as_deref()
                .and_then(|name| cookies.lookup(name))
                .filter(|value| !value.is_empty())
        };

        from_header.or_else(from_cookie).map(ToOwned::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> HashMap<String, String> {
        HashMap::new()
    }

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_header_only() {
        let resolver = KeyResolver::new(Some("authToken".to_owned()), None);
        let headers = map(&[("authToken", "abcdef")]);

        assert_eq!(
            resolver.resolve(&headers, &empty()),
            Some("abcdef".to_owned())
        );
    }

    #[test]
    fn test_cookie_only() {
        let resolver = KeyResolver::new(None, Some("auth".to_owned()));
        let cookies = map(&[("auth", "abcdef")]);

        assert_eq!(
            resolver.resolve(&empty(), &cookies),
            Some("abcdef".to_owned())
        );
    }

    #[test]
    fn test_header_takes_precedence() {
        let resolver = KeyResolver::new(Some("authToken".to_owned()), Some("auth".to_owned()));
        let headers = map(&[("authToken", "from-header")]);
        let cookies = map(&[("auth", "from-cookie")]);

        assert_eq!(
            resolver.resolve(&headers, &cookies),
            Some("from-header".to_owned())
        );
    }

    #[test]
    fn test_falls_back_to_cookie() {
        let resolver = KeyResolver::new(Some("authToken".to_owned()), Some("auth".to_owned()));
        let headers = map(&[("other", "x")]);
        let cookies = map(&[("auth", "from-cookie")]);

        assert_eq!(
            resolver.resolve(&headers, &cookies),
            Some("from-cookie".to_owned())
        );
    }

    #[test]
    fn test_no_key() {
        let resolver = KeyResolver::new(Some("authToken".to_owned()), Some("auth".to_owned()));
        assert!(resolver.resolve(&empty(), &empty()).is_none());
    }

    #[test]
    fn test_unconfigured_names_are_ignored() {
        let resolver = KeyResolver::default();
        let values = map(&[("auth", "abcdef"), ("authToken", "abcdef")]);
        assert!(resolver.resolve(&values, &values).is_none());
    }

    #[test]
    fn test_empty_value_is_absent() {
        let resolver = KeyResolver::new(Some("authToken".to_owned()), Some("auth".to_owned()));
        let headers = map(&[("authToken", "")]);
        let cookies = map(&[("auth", "abcdef")]);

        assert_eq!(
            resolver.resolve(&headers, &cookies),
            Some("abcdef".to_owned())
        );
    }

    #[test]
    fn test_cookie_map_parse() {
        let cookies = CookieMap::parse(["auth=abc; theme=dark", "auth=ignored; lang=en"]);

        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies.lookup("auth"), Some("abc"));
        assert_eq!(cookies.lookup("theme"), Some("dark"));
        assert_eq!(cookies.lookup("lang"), Some("en"));
        assert!(cookies.lookup("missing").is_none());
    }

    #[test]
    fn test_cookie_map_skips_malformed_pairs() {
        let cookies = CookieMap::parse(["=nameless; auth=abc"]);
        assert_eq!(cookies.lookup("auth"), Some("abc"));
    }
}
