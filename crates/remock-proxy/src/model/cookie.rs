//! Cookie header parsing.
//!
//! Request `Cookie` headers are flattened into ordered name/value pairs.
//! Response `Set-Cookie` values are parsed into structured
//! [`ResponseCookie`] entries with standard attribute handling, and can be
//! rewritten to drop `Domain` restrictions so recorded cookies stay portable
//! across hosts.

use super::{CookieProperties, NameValuePair, ResponseCookie};
use chrono::{DateTime, Utc};

/// Parse a request `Cookie` header value (`"a=1; b=2"`) into ordered pairs.
/// Malformed fragments without `=` are skipped.
pub fn parse_request_cookies(raw: &str) -> Vec<NameValuePair> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(NameValuePair::new(name, value.trim()))
        })
        .collect()
}

/// Parse one `Set-Cookie` header value into a structured cookie.
///
/// Returns `None` when the leading `name=value` pair is missing or the name
/// is empty. Unknown attributes are ignored; `Domain` is intentionally not
/// captured (recorded cookies carry no domain restriction).
pub fn parse_set_cookie(raw: &str) -> Option<ResponseCookie> {
    let mut segments = raw.split(';');
    let (name, value) = segments.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut properties = CookieProperties::default();
    for segment in segments {
        let segment = segment.trim();
        let (attr, attr_value) = match segment.split_once('=') {
            Some((attr, v)) => (attr.trim(), Some(v.trim())),
            None => (segment, None),
        };
        match attr.to_ascii_lowercase().as_str() {
            "expires" => properties.expires = attr_value.and_then(parse_cookie_date),
            "max-age" => properties.max_age = attr_value.and_then(|v| v.parse().ok()),
            "path" => properties.path = attr_value.map(str::to_string),
            "secure" => properties.secure = Some(true),
            "httponly" => properties.http_only = Some(true),
            "samesite" => properties.same_site = attr_value.map(str::to_string),
            _ => {}
        }
    }

    Some(ResponseCookie {
        name: name.to_string(),
        value: value.trim().to_string(),
        properties,
    })
}

/// Remove any `Domain` attribute from a `Set-Cookie` value, leaving the rest
/// of the cookie untouched.
pub fn strip_domain_attribute(raw: &str) -> String {
    raw.split(';')
        .filter(|segment| {
            let attr = segment.trim();
            let attr_name = attr.split_once('=').map(|(n, _)| n).unwrap_or(attr);
            !attr_name.trim().eq_ignore_ascii_case("domain")
        })
        .collect::<Vec<_>>()
        .join(";")
}

// Set-Cookie dates are RFC 1123 (a fixed-offset RFC 2822 subset).
fn parse_cookie_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_cookie_pairs_in_order() {
        let cookies = parse_request_cookies("a=1; b=2; c=3");
        assert_eq!(
            cookies,
            vec![
                NameValuePair::new("a", "1"),
                NameValuePair::new("b", "2"),
                NameValuePair::new("c", "3"),
            ]
        );
    }

    #[test]
    fn skips_malformed_request_cookie_fragments() {
        let cookies = parse_request_cookies("a=1; nonsense; =empty; b=2");
        assert_eq!(
            cookies,
            vec![NameValuePair::new("a", "1"), NameValuePair::new("b", "2")]
        );
    }

    #[test]
    fn parses_set_cookie_with_flag_attributes() {
        let cookie = parse_set_cookie("koek=njamnjam; Path=/; HttpOnly; Secure").unwrap();
        assert_eq!(cookie.name, "koek");
        assert_eq!(cookie.value, "njamnjam");
        assert_eq!(cookie.properties.path.as_deref(), Some("/"));
        assert_eq!(cookie.properties.http_only, Some(true));
        assert_eq!(cookie.properties.secure, Some(true));
        assert_eq!(cookie.properties.expires, None);
        assert_eq!(cookie.properties.max_age, None);
        assert_eq!(cookie.properties.same_site, None);
    }

    #[test]
    fn parses_set_cookie_expires_and_max_age() {
        let cookie =
            parse_set_cookie("id=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Max-Age=3600").unwrap();
        let expires = cookie.properties.expires.unwrap();
        assert_eq!(expires.to_rfc3339(), "2015-10-21T07:28:00+00:00");
        assert_eq!(cookie.properties.max_age, Some(3600));
    }

    #[test]
    fn parses_same_site_attribute() {
        let cookie = parse_set_cookie("sid=x; SameSite=Lax").unwrap();
        assert_eq!(cookie.properties.same_site.as_deref(), Some("Lax"));
    }

    #[test]
    fn rejects_set_cookie_without_name_value_pair() {
        assert!(parse_set_cookie("Path=/").is_some()); // "Path" is a legal cookie name here
        assert!(parse_set_cookie("; Secure").is_none());
        assert!(parse_set_cookie("=value; Secure").is_none());
    }

    #[test]
    fn strips_domain_attribute_case_insensitively() {
        assert_eq!(
            strip_domain_attribute("sid=x; Domain=example.com; Path=/"),
            "sid=x; Path=/"
        );
        assert_eq!(
            strip_domain_attribute("sid=x; domain=.example.com"),
            "sid=x"
        );
        assert_eq!(strip_domain_attribute("sid=x; Secure"), "sid=x; Secure");
    }
}
