//! Token and URL encoding helpers.
//!
//! Two serializations live here and they differ on purpose:
//! - [`authorize_url`] percent-encodes every value (`1 2` becomes `1%202`).
//! - [`raw_query_string`] joins `key=value` pairs untouched; REST GET
//!   requests are built with it, so callers pre-encode reserved characters.

use std::sync::LazyLock;

use regex::Regex;

use crate::store::Secret;

/// A token delivered in a redirect fragment, optionally preceded by `&` or `#`.
static FRAGMENT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[&#]?token=([0-9a-f]{64})").expect("valid token regex"));

/// A bare token as delivered by the popup callback.
static BARE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{64}$").expect("valid token regex"));

/// Result of scanning a location fragment for a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentToken {
    /// The recovered token.
    pub token: Secret,
    /// The fragment with the matched token substring removed.
    pub remaining: String,
}

/// Find the first `token=<64 hex>` in `fragment`.
///
/// The matched substring (including a leading `&` or `#`) is cut out of the
/// fragment; everything else is left as it was.
pub fn extract_fragment_token(fragment: &str) -> Option<FragmentToken> {
    let captures = FRAGMENT_TOKEN.captures(fragment)?;
    let whole = captures.get(0)?;
    let token = captures.get(1)?.as_str();

    let mut remaining = String::with_capacity(fragment.len() - whole.len());
    remaining.push_str(&fragment[..whole.start()]);
    remaining.push_str(&fragment[whole.end()..]);

    Some(FragmentToken {
        token: Secret::new(token),
        remaining,
    })
}

/// Whether `value` is exactly one token: 64 lowercase hex characters.
pub fn is_token(value: &str) -> bool {
    BARE_TOKEN.is_match(value)
}

/// Build `{endpoint}/{version}/authorize?` followed by percent-encoded pairs.
pub fn authorize_url<K, V>(endpoint: &str, version: u32, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k.as_ref(), urlencoding::encode(v.as_ref())))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}/{}/authorize?{}", endpoint.trim_end_matches('/'), version, query)
}

/// Join pairs as `key=value&...` without encoding anything.
pub fn raw_query_string<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// `scheme://host[:port]` of an absolute URL, if it has one.
pub fn origin_of(href: &str) -> Option<String> {
    let parsed = url::Url::parse(href).ok()?;
    match parsed.origin() {
        origin @ url::Origin::Tuple(..) => Some(origin.ascii_serialization()),
        url::Origin::Opaque(_) => None,
    }
}
