//! Slash normalization and request path resolution.

use crate::http::Request;

const SLASHES: [char; 2] = ['/', '\\'];

/// Ensure `url` starts with exactly one `/`.
pub fn add_leading_slash(url: &str, leave_blank: bool) -> String {
    if leave_blank && url.is_empty() {
        return String::new();
    }
    format!("/{}", remove_leading_slash(url))
}

pub fn remove_leading_slash(url: &str) -> &str {
    url.trim_start_matches('/')
}

/// Ensure `url` ends with exactly one `/`.
pub fn add_trailing_slash(url: &str, leave_blank: bool) -> String {
    if leave_blank && url.is_empty() {
        return String::new();
    }
    format!("{}/", remove_trailing_slash(url))
}

pub fn remove_trailing_slash(url: &str) -> &str {
    url.trim_end_matches(SLASHES)
}

/// Request path relative to the home URL, with a leading slash.
///
/// Requests for another host keep their full path. The home path is only
/// stripped on a segment boundary, so `/blog` never eats `/blogroll`.
pub fn request_path(request: &Request) -> String {
    let path = add_leading_slash(remove_trailing_slash(request.path()), false);

    let Some(home) = request.home_url() else {
        return path;
    };

    if request.url().host_str() != home.host_str() {
        return path;
    }

    let home_path = add_leading_slash(remove_trailing_slash(home.path()), false);
    if home_path == "/" {
        return path;
    }

    match path.strip_prefix(home_path.as_str()) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => add_leading_slash(rest, false),
        _ => path,
    }
}

/// Join a home URL and a path without doubling slashes.
pub fn join_home(home: &::url::Url, path: &str) -> String {
    format!("{}{}", remove_trailing_slash(home.as_str()), add_leading_slash(path, false))
}

#[cfg(test)]
mod tests {
    use ::url::Url;

    use super::*;

    #[test]
    fn test_slash_helpers() {
        assert_eq!(add_leading_slash("//foo", false), "/foo");
        assert_eq!(add_leading_slash("", true), "");
        assert_eq!(add_leading_slash("", false), "/");
        assert_eq!(add_trailing_slash("foo//", false), "foo/");
        assert_eq!(add_trailing_slash("", true), "");
        assert_eq!(remove_trailing_slash("/foo/\\"), "/foo");
    }

    #[test]
    fn test_request_path_strips_home_path() {
        let home = Url::parse("http://example.com/site/").unwrap();
        let request = Request::get("http://example.com/site/foo/42/")
            .unwrap()
            .with_home_url(home.clone());
        assert_eq!(request_path(&request), "/foo/42");

        let request = Request::get("http://example.com/site")
            .unwrap()
            .with_home_url(home.clone());
        assert_eq!(request_path(&request), "/");

        let request = Request::get("http://example.com/sitemap")
            .unwrap()
            .with_home_url(home);
        assert_eq!(request_path(&request), "/sitemap");
    }

    #[test]
    fn test_request_path_other_host_keeps_full_path() {
        let home = Url::parse("http://example.com/site/").unwrap();
        let request = Request::get("http://other.test/site/foo")
            .unwrap()
            .with_home_url(home);
        assert_eq!(request_path(&request), "/site/foo");
    }

    #[test]
    fn test_join_home() {
        let home = Url::parse("http://example.com/site/").unwrap();
        assert_eq!(join_home(&home, "/foo/"), "http://example.com/site/foo/");
        let home = Url::parse("http://example.com").unwrap();
        assert_eq!(join_home(&home, "foo"), "http://example.com/foo");
    }
}
