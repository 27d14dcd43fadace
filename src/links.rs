// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTML scanning for source verification.
//!
//! A source page qualifies when one of its anchors, once resolved against
//! the page URL and normalized, equals the normalized target URL.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Longest title we keep, in characters.
pub const MAX_TITLE_CHARS: usize = 200;

/// Opening anchor tags; group 1 is the attribute list. Quoted values may
/// contain `>`.
static ANCHOR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s((?:[^>"']|"[^"]*"|'[^']*')*)>"#).unwrap()
});

/// One attribute: name, then an optional double-quoted, single-quoted or
/// unquoted value.
static ATTR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#).unwrap()
});

static TITLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// Normalize a URL for comparison.
///
/// Parsing into `Url` already canonicalizes scheme, host, default port and
/// empty path. Only the fragment is dropped here.
pub fn normalize(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

/// Extract all anchor hrefs from an HTML document, entity-decoded.
pub fn extract_hrefs(html: &str) -> Vec<String> {
    ANCHOR_REGEX
        .captures_iter(html)
        .filter_map(|cap| cap.get(1).and_then(|m| anchor_href(m.as_str())))
        .map(|href| decode_entities(href.trim()))
        .collect()
}

/// Value of the first `href` attribute in an anchor's attribute list.
fn anchor_href(attrs: &str) -> Option<&str> {
    ATTR_REGEX
        .captures_iter(attrs)
        .find(|attr| attr[1].eq_ignore_ascii_case("href"))
        .and_then(|attr| attr.get(2).or_else(|| attr.get(3)).or_else(|| attr.get(4)))
        .map(|value| value.as_str())
}

/// Whether `html`, served from `base`, links to `target`.
pub fn contains_link(html: &str, base: &Url, target: &Url) -> bool {
    let target = normalize(target);
    extract_hrefs(html)
        .iter()
        .filter_map(|href| base.join(href).ok())
        .any(|resolved| normalize(&resolved) == target)
}

/// Best-effort page title; empty when the page has none.
pub fn extract_title(html: &str) -> String {
    let Some(cap) = TITLE_REGEX.captures(html) else {
        return String::new();
    };

    let stripped = TAG_REGEX.replace_all(&cap[1], "");
    let collapsed = decode_entities(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    collapsed.chars().take(MAX_TITLE_CHARS).collect()
}

/// Decode the handful of entities that show up in hrefs and titles.
fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some(' '),
                _ => numeric_entity(entity),
            };
            c.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn numeric_entity(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}
