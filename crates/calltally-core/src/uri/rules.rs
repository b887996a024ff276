//! Placeholder rules for paths and query strings.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

/// Placeholder replacing a variable value.
pub const PLACEHOLDER: &str = "{}";
/// Placeholder replacing a 32 character hex document id.
pub const DOCUMENT_ID_PLACEHOLDER: &str = "{documentid}";

/// Id rules, applied in order over the whole input. Each match starts at a
/// `/` so only segment starts are considered; earlier rules win.
const ID_RULES: [(&str, &str); 5] = [
    (r"/[0-9a-f]{33,}", "/{}"),
    (r"/[0-9a-f]{32}", "/{documentid}"),
    // person idents
    (r"/[A-X][0-9]{6}", "/{}"),
    (r"/[0-9a-f]{20,}", "/{}"),
    // country codes
    (r"/[A-X]{2}\b", "/{}"),
];

/// How digit runs and id-like path segments are collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigitRules {
    /// Hex ids, document ids, person idents and country codes after a `/`,
    /// then any run of 3+ digits.
    #[default]
    Extended,
    /// Any run of 2+ digits, nothing else.
    Simplified,
}

/// How query values are collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryRules {
    /// `key=value` becomes `key={}`; a bare `key` stays as is.
    #[default]
    PerPair,
    /// If any pair has `=`, every segment becomes `key={}`; otherwise every
    /// segment is kept as a bare key.
    WholeQuery,
}

struct Compiled {
    ids: Vec<(Regex, &'static str)>,
    digits_3: Regex,
    digits_2: Regex,
}

impl Compiled {
    // Patterns are constants exercised by the unit tests below.
    #[allow(clippy::expect_used)]
    fn new() -> Self {
        let re = |p: &str| Regex::new(p).expect("static templating pattern");
        Self {
            ids: ID_RULES.iter().map(|(p, to)| (re(p), *to)).collect(),
            digits_3: re("[0-9]{3,}"),
            digits_2: re("[0-9]{2,}"),
        }
    }
}

fn compiled() -> &'static Compiled {
    static COMPILED: OnceLock<Compiled> = OnceLock::new();
    COMPILED.get_or_init(Compiled::new)
}

impl DigitRules {
    /// Collapse ids in a path, scheme-specific part or raw string.
    pub fn apply(self, input: &str) -> String {
        let c = compiled();
        match self {
            DigitRules::Simplified => c.digits_2.replace_all(input, PLACEHOLDER).into_owned(),
            DigitRules::Extended => {
                let mut out = input.to_owned();
                for (re, to) in &c.ids {
                    out = re.replace_all(&out, *to).into_owned();
                }
                c.digits_3.replace_all(&out, PLACEHOLDER).into_owned()
            }
        }
    }
}

impl QueryRules {
    pub fn apply(self, query: &str) -> String {
        let keep_values = match self {
            QueryRules::PerPair => None,
            QueryRules::WholeQuery => Some(query.contains('=')),
        };
        query
            .split('&')
            .map(|seg| {
                let (key, has_value) = match seg.split_once('=') {
                    Some((k, _)) => (k, true),
                    None => (seg, false),
                };
                if keep_values.unwrap_or(has_value) {
                    Cow::Owned(format!("{key}={PLACEHOLDER}"))
                } else {
                    Cow::Borrowed(key)
                }
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}
