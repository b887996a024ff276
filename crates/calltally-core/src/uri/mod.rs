//! URI templating: dynamic URIs to low-cardinality metric labels.
//!
//! `https://server.example.com:666/path/7897?field=74289` becomes
//! `server:666/path/{}?field={}`. The host is reduced to its first label,
//! ids in the path and values in the query are replaced by placeholders, and
//! the fragment is dropped. Percent escapes are decoded before the rules run.
//! Templating never fails: input that does not parse as a URI is templated as
//! a raw string with the digit rules only.

pub mod parse;
pub mod rules;

pub use parse::{decode, UriParts};
pub use rules::{DigitRules, QueryRules, DOCUMENT_ID_PLACEHOLDER, PLACEHOLDER};

use serde::Deserialize;

/// Templater with a fixed choice of digit and query rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UriTemplater {
    #[serde(default)]
    pub digits: DigitRules,
    #[serde(default)]
    pub query: QueryRules,
}

impl UriTemplater {
    pub const fn new(digits: DigitRules, query: QueryRules) -> Self {
        Self { digits, query }
    }

    /// Multi-rule templating (hex ids, idents, country codes).
    pub const fn extended() -> Self {
        Self::new(DigitRules::Extended, QueryRules::PerPair)
    }

    /// Single-rule templating (2+ digit runs).
    pub const fn simplified() -> Self {
        Self::new(DigitRules::Simplified, QueryRules::WholeQuery)
    }

    /// Template a URI given as a string.
    pub fn template(&self, uri: &str) -> String {
        match UriParts::parse(uri) {
            Ok(parts) => self.template_parts(&parts),
            Err(e) => {
                tracing::trace!(error = %e, "uri not parseable, templating raw string");
                self.digits.apply(uri)
            }
        }
    }

    /// Template an already decomposed URI.
    pub fn template_parts(&self, parts: &UriParts<'_>) -> String {
        if let Some(ssp) = parts.opaque {
            return self.digits.apply(&decode(ssp));
        }

        let mut out = String::new();
        if let Some(host) = parts.host {
            let host = host.replace('[', "").replace(']', "");
            let label = host.split(':').next().unwrap_or_default();
            out.push_str(label.split('.').next().unwrap_or_default());
            out.push(':');
            if let Some(port) = parts.port {
                out.push_str(&port.to_string());
            }
        } else if let Some(authority) = parts.authority {
            out.push_str(&decode(authority));
        }

        if !parts.path.is_empty() {
            out.push_str(&self.digits.apply(&decode(parts.path)));
        }

        if let Some(query) = parts.query {
            out.push('?');
            out.push_str(&self.query.apply(&decode(query)));
        }
        out
    }
}

/// Template a URI with the extended rules.
pub fn template_uri(uri: &str) -> String {
    UriTemplater::extended().template(uri)
}
