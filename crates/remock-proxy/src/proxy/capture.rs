//! Mapping proxied HTTP exchanges into the recorded-request model.
//!
//! Exclusion rules: the raw `cookie` request header and the `content-type`
//! and `set-cookie` response headers never appear in the captured header
//! lists; all three are represented structurally instead.

use crate::model::cookie::{parse_request_cookies, parse_set_cookie};
use crate::model::{CapturedRequest, CapturedResponse, NameValuePair};
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use hyper::http::response;
use hyper::{HeaderMap, Method, Uri};

/// Build the captured inbound side of an exchange.
pub fn capture_request(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &Bytes,
) -> CapturedRequest {
    let captured_headers = headers
        .iter()
        .filter(|(name, _)| **name != COOKIE)
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some(NameValuePair::new(name.as_str(), value))
        })
        .collect();

    let cookies = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(parse_request_cookies)
        .collect();

    let full_path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path())
        .to_string();

    CapturedRequest {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        full_path,
        // A bodyless request is an empty string, never a placeholder value.
        body: String::from_utf8_lossy(body).into_owned(),
        params: parse_query_params(uri.query()),
        headers: captured_headers,
        cookies,
    }
}

/// Build the captured outbound side of an exchange from the drained upstream
/// response.
pub fn capture_response(parts: &response::Parts, body: &Bytes, elapsed_ms: u64) -> CapturedResponse {
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let captured_headers = parts
        .headers
        .iter()
        .filter(|(name, _)| **name != CONTENT_TYPE && **name != SET_COOKIE)
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some(NameValuePair::new(name.as_str(), value))
        })
        .collect();

    // One structured cookie per Set-Cookie header value, order preserved.
    let cookies = parts
        .headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(parse_set_cookie)
        .collect();

    CapturedResponse {
        content_type,
        status_code: parts.status.as_u16(),
        elapsed_ms,
        body: String::from_utf8_lossy(body).into_owned(),
        headers: captured_headers,
        cookies,
    }
}

fn parse_query_params(query: Option<&str>) -> Vec<NameValuePair> {
    let Some(query) = query else {
        return Vec::new();
    };
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            NameValuePair::new(decode(name), decode(value))
        })
        .collect()
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Response;

    fn request_fixture(uri: &str, headers: &[(&str, &str)], body: &[u8]) -> CapturedRequest {
        let mut builder = hyper::Request::builder().method(Method::GET).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(()).unwrap();
        capture_request(
            request.method(),
            request.uri(),
            request.headers(),
            &Bytes::copy_from_slice(body),
        )
    }

    fn response_fixture(headers: &[(&str, &str)], body: &[u8]) -> CapturedResponse {
        let mut builder = Response::builder().status(200);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        capture_response(&parts, &Bytes::copy_from_slice(body), 7)
    }

    #[test]
    fn bodyless_request_captures_empty_string_body() {
        let captured = request_fixture("http://localhost/test1", &[], b"");
        assert_eq!(captured.body, "");
    }

    #[test]
    fn cookie_header_is_excluded_and_represented_structurally() {
        let captured = request_fixture(
            "http://localhost/a",
            &[("cookie", "s=1; t=2"), ("x-test", "a")],
            b"",
        );
        assert!(captured.headers.iter().all(|h| h.name != "cookie"));
        assert_eq!(
            captured.cookies,
            vec![NameValuePair::new("s", "1"), NameValuePair::new("t", "2")]
        );
        assert!(captured
            .headers
            .iter()
            .any(|h| h.name == "x-test" && h.value == "a"));
    }

    #[test]
    fn no_cookies_captures_empty_list() {
        let captured = request_fixture("http://localhost/a", &[], b"");
        assert_eq!(captured.cookies, vec![]);
    }

    #[test]
    fn query_params_are_parsed_and_decoded() {
        let captured = request_fixture("http://localhost/p?a=1&b=two%20words&flag", &[], b"");
        assert_eq!(
            captured.params,
            vec![
                NameValuePair::new("a", "1"),
                NameValuePair::new("b", "two words"),
                NameValuePair::new("flag", ""),
            ]
        );
        assert_eq!(captured.path, "/p");
        assert_eq!(captured.full_path, "/p?a=1&b=two%20words&flag");
    }

    #[test]
    fn response_content_type_and_set_cookie_are_excluded_from_headers() {
        let captured = response_fixture(
            &[
                ("content-type", "text/plain"),
                ("set-cookie", "koek=njamnjam; Path=/; HttpOnly; Secure"),
                ("x-test", "a"),
            ],
            b"test1",
        );
        assert_eq!(captured.content_type.as_deref(), Some("text/plain"));
        assert!(captured
            .headers
            .iter()
            .all(|h| h.name != "content-type" && h.name != "set-cookie"));
        assert_eq!(captured.cookies.len(), 1);
        assert_eq!(captured.cookies[0].name, "koek");
        assert_eq!(captured.cookies[0].value, "njamnjam");
        assert_eq!(captured.cookies[0].properties.http_only, Some(true));
        assert_eq!(captured.cookies[0].properties.secure, Some(true));
        assert_eq!(captured.cookies[0].properties.path.as_deref(), Some("/"));
        assert_eq!(captured.body, "test1");
        assert_eq!(captured.elapsed_ms, 7);
    }

    #[test]
    fn repeated_set_cookie_headers_preserve_order() {
        let captured = response_fixture(
            &[("set-cookie", "first=1"), ("set-cookie", "second=2")],
            b"",
        );
        let names: Vec<&str> = captured.cookies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn missing_content_type_captures_none() {
        let captured = response_fixture(&[], b"");
        assert_eq!(captured.content_type, None);
        assert_eq!(captured.cookies, vec![]);
    }
}
