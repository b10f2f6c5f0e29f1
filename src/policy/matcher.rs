use serde::{Deserialize, Serialize};
use url::Url;

/// `true` when `path` is `prefix` itself or lies beneath it.
///
/// Segment boundaries are respected: `/booking` matches `/booking` and
/// `/booking/42` but never `/bookingdetail` or `/booking-detail`. The root
/// prefix `/` matches only `/`.
pub fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix || path == prefix.trim_end_matches('/') || is_sub_path(path, prefix)
}

/// `true` when `path` lies strictly beneath `prefix`.
pub fn is_sub_path(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return false;
    }

    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Canonical form of a request path, as an upstream would resolve it.
///
/// Percent-encoded unreserved characters are decoded, `.` and `..`
/// segments are collapsed, backslashes become slashes and repeated slashes
/// are merged. The result is a fixed point: normalising it again changes
/// nothing. `None` for relative paths and for encoded `/` or `\`, which
/// would move segment boundaries once an upstream decodes them.
pub fn normalize_path(path: &str) -> Option<String> {
    if !path.starts_with('/') {
        return None;
    }

    let decoded = decode_unreserved(path)?;
    let url = Url::parse(&format!("http://gate.invalid{decoded}")).ok()?;

    let mut normalized = String::with_capacity(url.path().len());
    for ch in url.path().chars() {
        if ch == '/' && normalized.ends_with('/') {
            continue;
        }
        normalized.push(ch);
    }
    Some(normalized)
}

fn decode_unreserved(path: &str) -> Option<String> {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let encoded = &rest[pos..];
        let byte = encoded
            .get(1..3)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());

        match byte {
            Some(b'/' | b'\\') => return None,
            Some(b) if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') => {
                out.push(char::from(b));
                rest = &encoded[3..];
            }
            _ => {
                out.push('%');
                rest = &encoded[1..];
            }
        }
    }

    out.push_str(rest);
    Some(out)
}

/// Requests the route guard never intercepts: API calls, framework assets
/// and static images.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestMatcher {
    #[serde(default)]
    pub prefixes: Vec<String>,

    /// File extensions, without the dot, compared case-insensitively.
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl RequestMatcher {
    pub fn standard() -> Self {
        Self {
            prefixes: ["/api", "/_next/static", "/_next/image", "/favicon.ico"]
                .map(String::from)
                .to_vec(),
            extensions: ["svg", "png", "jpg", "jpeg", "gif", "webp"]
                .map(String::from)
                .to_vec(),
        }
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        if self
            .prefixes
            .iter()
            .any(|prefix| matches_prefix(path, prefix))
        {
            return true;
        }

        let file_name = path.rsplit('/').next().unwrap_or_default();
        match file_name.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => self
                .extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(extension)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_nested_paths_match() {
        assert!(matches_prefix("/booking", "/booking"));
        assert!(matches_prefix("/booking/court-3", "/booking"));
        assert!(matches_prefix("/warehouse/orders/17", "/warehouse"));
    }

    #[test]
    fn adjacent_names_do_not_match() {
        assert!(!matches_prefix("/bookingdetail", "/booking"));
        assert!(!matches_prefix("/booking-detail", "/booking"));
        assert!(!matches_prefix("/profiles", "/profile"));
    }

    #[test]
    fn root_prefix_only_matches_root() {
        assert!(matches_prefix("/", "/"));
        assert!(!matches_prefix("/employees", "/"));
        assert!(!is_sub_path("/employees", "/"));
    }

    #[test]
    fn trailing_slash_on_prefix_is_ignored() {
        assert!(matches_prefix("/warehouse/orders", "/warehouse/"));
        assert!(matches_prefix("/warehouse", "/warehouse/"));
        assert!(is_sub_path("/warehouse/", "/warehouse"));
    }

    #[test]
    fn normalize_collapses_dot_segments() {
        assert_eq!(
            normalize_path("/_next/static/../../admin/dashboard").as_deref(),
            Some("/admin/dashboard")
        );
        assert_eq!(normalize_path("/booking/../employees").as_deref(), Some("/employees"));
        assert_eq!(normalize_path("/booking/./list").as_deref(), Some("/booking/list"));
        assert_eq!(normalize_path("/../../profile").as_deref(), Some("/profile"));
    }

    #[test]
    fn normalize_decodes_unreserved_characters() {
        assert_eq!(
            normalize_path("/booking/%2e%2e/employees").as_deref(),
            Some("/employees")
        );
        assert_eq!(normalize_path("/booking/%2E./employees").as_deref(), Some("/employees"));
        assert_eq!(normalize_path("/%61dmin/dashboard").as_deref(), Some("/admin/dashboard"));
        assert_eq!(normalize_path("/search/a%20b").as_deref(), Some("/search/a%20b"));
        assert_eq!(normalize_path("/odd/%zz").as_deref(), Some("/odd/%zz"));
    }

    #[test]
    fn normalize_merges_slashes() {
        assert_eq!(normalize_path("//admin//dashboard").as_deref(), Some("/admin/dashboard"));
        assert_eq!(normalize_path("/booking\\..\\employees").as_deref(), Some("/employees"));
        assert_eq!(normalize_path("/warehouse/").as_deref(), Some("/warehouse/"));
    }

    #[test]
    fn normalize_rejects_encoded_separators_and_relative_paths() {
        assert_eq!(normalize_path("/_next/static/..%2F..%2Fadmin"), None);
        assert_eq!(normalize_path("/booking%5c..%5cemployees"), None);
        assert_eq!(normalize_path("booking"), None);
    }

    #[test]
    fn normalized_paths_are_fixed_points() {
        for raw in ["/", "/booking/42", "/a/b/../c/./d//e", "/%7Euser/%20x"] {
            let once = normalize_path(raw).unwrap();
            assert_eq!(normalize_path(&once).as_deref(), Some(once.as_str()), "{raw}");
        }
    }

    #[test]
    fn standard_matcher_skips_api_and_assets() {
        let matcher = RequestMatcher::standard();

        assert!(matcher.is_excluded("/api/auth/session"));
        assert!(matcher.is_excluded("/api"));
        assert!(matcher.is_excluded("/_next/static/chunks/main.js"));
        assert!(matcher.is_excluded("/_next/image"));
        assert!(matcher.is_excluded("/favicon.ico"));
        assert!(matcher.is_excluded("/images/court.PNG"));
        assert!(matcher.is_excluded("/logo.svg"));
    }

    #[test]
    fn standard_matcher_intercepts_pages() {
        let matcher = RequestMatcher::standard();

        assert!(!matcher.is_excluded("/"));
        assert!(!matcher.is_excluded("/apiary"));
        assert!(!matcher.is_excluded("/employees"));
        assert!(!matcher.is_excluded("/warehouse/orders.v2"));
        assert!(!matcher.is_excluded("/.png"));
    }
}
