//! Escaped-fragment URL rewriting and cache key derivation.
//!
//! Crawlers that detect hash-bang (`#!`) routing request a server-rendered
//! page by moving the fragment into a `_escaped_fragment_` query parameter,
//! e.g. `http://example.com/en/?_escaped_fragment_=/projects`. This module
//! recognizes that convention, reconstructs the canonical hash-bang URL the
//! client application expects, and derives the cache key under which the
//! rendered page is stored.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::Error;

/// Query parameter crawlers use to request the rendered page.
pub const ESCAPED_FRAGMENT: &str = "_escaped_fragment_";

/// Fragment prefix used by hash-bang client-side routing.
pub const HASHBANG: &str = "#!";

/// Namespace prefix keeping rendered pages apart from unrelated cache users.
pub const CACHE_PREFIX: &str = "_share_";

/// Characters that are unsafe in a cache key, each replaced by `_`.
static KEY_UNSAFE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[/\-#!]").expect("static pattern"));

/// A matched escaped-fragment request, ready to render.
///
/// Immutable after construction; one instance exists per inbound matching
/// request and is discarded once the response is produced.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// The inbound request URL, as received.
    pub original_url: Url,

    /// The reconstructed hash-bang URL the browser will navigate to.
    pub canonical_url: Url,

    /// Deterministic cache key derived from the hash-bang path.
    pub cache_key: String,

    /// Whether the scheme was forced to https by configuration.
    pub forced_https: bool,
}

/// Rewrite an escaped-fragment request URL into a [`RenderRequest`].
///
/// Returns `Ok(None)` when the URL does not carry the escaped-fragment
/// parameter; such requests pass through to the rest of the serving stack.
///
/// The rewrite:
/// 1. extracts the `_escaped_fragment_` value and removes the parameter from
///    the query string, preserving the remaining parameters;
/// 2. re-attaches the value as a `#!` fragment on the original path;
/// 3. forces the `https` scheme when `force_https` is set (deployments
///    behind TLS-terminating proxies cannot trust the inbound scheme);
/// 4. derives the cache key from the hash-bang path.
///
/// # Errors
///
/// Returns `Error::InvalidUrl` if the scheme cannot be rewritten.
pub fn rewrite(original: &Url, force_https: bool) -> Result<Option<RenderRequest>, Error> {
    let Some(fragment_value) = original
        .query_pairs()
        .find(|(key, _)| key == ESCAPED_FRAGMENT)
        .map(|(_, value)| value.into_owned())
    else {
        return Ok(None);
    };

    let hashbang_path = format!("{}{}{}", original.path(), HASHBANG, fragment_value);

    let mut canonical = original.clone();
    if force_https {
        canonical
            .set_scheme("https")
            .map_err(|()| Error::InvalidUrl(format!("cannot force https on {original}")))?;
    }

    let remaining: Vec<(String, String)> = original
        .query_pairs()
        .filter(|(key, _)| key != ESCAPED_FRAGMENT)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    canonical.set_query(None);
    if !remaining.is_empty() {
        canonical.query_pairs_mut().extend_pairs(remaining);
    }

    // The escaped fragment becomes a real fragment again: `#` + `!<value>`.
    canonical.set_fragment(Some(&format!("!{fragment_value}")));

    Ok(Some(RenderRequest {
        original_url: original.clone(),
        canonical_url: canonical,
        cache_key: derive_cache_key(&hashbang_path),
        forced_https: force_https,
    }))
}

/// Derive the cache key for a hash-bang path.
///
/// `/`, `-`, `#` and `!` are each replaced by `_` and the result is
/// namespaced with [`CACHE_PREFIX`]. The substitution is deterministic, so
/// identical paths always map to the same key.
pub fn derive_cache_key(hashbang_path: &str) -> String {
    format!("{CACHE_PREFIX}{}", KEY_UNSAFE.replace_all(hashbang_path, "_"))
}
