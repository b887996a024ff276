//! Defensive URI decomposition.
//!
//! Splits a URI reference into scheme, authority, host, port, path and query
//! without allocating. Input that would not be accepted as a URI (illegal
//! characters, bad escapes, malformed scheme) is rejected so the templater can
//! fall back to raw-string templating. The fragment is always discarded.

use std::borrow::Cow;

use crate::error::{CallTallyError, Result};

/// Characters never allowed anywhere in a URI.
const ILLEGAL: &[char] = &[' ', '"', '<', '>', '\\', '^', '`', '{', '|', '}'];

/// Components of a parsed URI reference. All slices borrow from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UriParts<'a> {
    pub scheme: Option<&'a str>,
    /// Scheme-specific part of an opaque URI (e.g. `mailto:`).
    pub opaque: Option<&'a str>,
    /// Raw authority, set whenever `//authority` is present and non-empty.
    pub authority: Option<&'a str>,
    /// Host, only for server-based authorities. IPv6 hosts keep their brackets.
    pub host: Option<&'a str>,
    pub port: Option<u32>,
    pub path: &'a str,
    pub query: Option<&'a str>,
}

impl<'a> UriParts<'a> {
    pub fn parse(input: &'a str) -> Result<Self> {
        check_chars(input)?;

        let body = match input.find('#') {
            Some(i) => &input[..i],
            None => input,
        };

        let (scheme, rest) = split_scheme(input, body)?;
        if let Some(scheme) = scheme {
            if rest.is_empty() {
                return Err(CallTallyError::invalid_uri(input, "expected scheme-specific part"));
            }
            if !rest.starts_with('/') {
                reject_brackets(input, rest)?;
                return Ok(Self { scheme: Some(scheme), opaque: Some(rest), ..Self::default() });
            }
        }

        let (authority, rest) = match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find(|c: char| c == '/' || c == '?').unwrap_or(after.len());
                (Some(&after[..end]), &after[end..])
            }
            None => (None, rest),
        };

        let (path, query) = match rest.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (rest, None),
        };
        reject_brackets(input, path)?;
        if let Some(q) = query {
            reject_brackets(input, q)?;
        }

        let authority = authority.filter(|a| !a.is_empty());
        let (host, port) = match authority {
            Some(a) => server_parts(input, a)?,
            None => (None, None),
        };

        Ok(Self { scheme, opaque: None, authority, host, port, path, query })
    }

    pub fn is_opaque(&self) -> bool {
        self.opaque.is_some()
    }
}

/// Decode `%xx` escapes; invalid UTF-8 becomes U+FFFD.
///
/// Components keep their escapes while parsing; the templater decodes path,
/// query and scheme-specific part before applying its rules.
pub fn decode(raw: &str) -> Cow<'_, str> {
    if !raw.contains('%') {
        return Cow::Borrowed(raw);
    }
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = match (bytes[i], bytes.get(i + 1..i + 3)) {
            (b'%', Some(hex)) => std::str::from_utf8(hex).ok().and_then(|h| u8::from_str_radix(h, 16).ok()),
            _ => None,
        };
        match escaped {
            Some(b) => {
                out.push(b);
                i += 3;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

fn check_chars(input: &str) -> Result<()> {
    let mut fragments = 0;
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c.is_control() || ILLEGAL.contains(&c) {
            return Err(CallTallyError::invalid_uri(input, "illegal character"));
        }
        match c {
            '#' => {
                fragments += 1;
                if fragments > 1 {
                    return Err(CallTallyError::invalid_uri(input, "second fragment marker"));
                }
            }
            '%' => {
                let escape_ok = matches!(
                    (chars.next(), chars.next()),
                    (Some(a), Some(b)) if a.is_ascii_hexdigit() && b.is_ascii_hexdigit()
                );
                if !escape_ok {
                    return Err(CallTallyError::invalid_uri(input, "malformed escape"));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Returns the scheme (if any) and everything after its colon.
fn split_scheme<'a>(input: &str, body: &'a str) -> Result<(Option<&'a str>, &'a str)> {
    let Some(i) = body.find(|c: char| c == ':' || c == '/' || c == '?') else {
        return Ok((None, body));
    };
    if !body[i..].starts_with(':') {
        return Ok((None, body));
    }
    let scheme = &body[..i];
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid {
        return Err(CallTallyError::invalid_uri(input, "malformed scheme"));
    }
    Ok((Some(scheme), &body[i + 1..]))
}

fn reject_brackets(input: &str, component: &str) -> Result<()> {
    if component.contains(|c: char| c == '[' || c == ']') {
        return Err(CallTallyError::invalid_uri(input, "bracket outside authority"));
    }
    Ok(())
}

/// Host and port of a server-based authority. A registry-based authority
/// (one that is not a valid host[:port]) yields `(None, None)`.
fn server_parts<'a>(input: &str, authority: &'a str) -> Result<(Option<&'a str>, Option<u32>)> {
    let hostport = match authority.rfind('@') {
        Some(i) => &authority[i + 1..],
        None => authority,
    };

    if hostport.starts_with('[') {
        let Some(end) = hostport.find(']') else {
            return Err(CallTallyError::invalid_uri(input, "unterminated IPv6 host"));
        };
        let inner = &hostport[1..end];
        if inner.is_empty() || !inner.chars().all(|c| c.is_ascii_hexdigit() || c == ':' || c == '.') {
            return Err(CallTallyError::invalid_uri(input, "malformed IPv6 host"));
        }
        let host = &hostport[..=end];
        let rest = &hostport[end + 1..];
        if rest.is_empty() {
            return Ok((Some(host), None));
        }
        return match rest.strip_prefix(':').map(parse_port) {
            Some(Some(port)) => Ok((Some(host), port)),
            _ => Err(CallTallyError::invalid_uri(input, "malformed port")),
        };
    }

    if authority.contains(|c: char| c == '[' || c == ']') {
        return Err(CallTallyError::invalid_uri(input, "bracket outside IPv6 host"));
    }

    let (host, port) = match hostport.rsplit_once(':') {
        Some((h, p)) => (h, parse_port(p)),
        None => (hostport, Some(None)),
    };
    match port {
        Some(port) if is_hostname(host) => Ok((Some(host), port)),
        _ => Ok((None, None)),
    }
}

/// `Some(None)` for an empty port, `None` when the port is not numeric.
fn parse_port(raw: &str) -> Option<Option<u32>> {
    if raw.is_empty() {
        return Some(None);
    }
    if !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok().map(Some)
}

fn is_hostname(host: &str) -> bool {
    !host.is_empty()
        && host.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}
