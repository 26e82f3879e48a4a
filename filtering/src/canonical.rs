//! Locator canonicalization.
//!
//! A locator is a route plus query string as captured from navigation, for
//! example `Simulations?filters=Owner=bob,State=Failed&count=20`. Two locators
//! naming the same clause set must map to the same canonical hash no matter
//! how the keys or clauses were ordered or escaped.

use once_cell::sync::Lazy;
use percent_encoding::AsciiSet;
use percent_encoding::CONTROLS;
use percent_encoding::percent_decode_str;
use percent_encoding::utf8_percent_encode;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;

pub const FILTERS_KEY: &str = "filters";
pub const TAG_FILTERS_KEY: &str = "tagFilters";
pub const ORDERBY_KEY: &str = "orderby";
pub const OFFSET_KEY: &str = "offset";
pub const COUNT_KEY: &str = "count";

const CLAUSE_SEPARATOR: char = ',';
const DEFAULT_ENTITY: &str = "Query";
const SORT_TOKENS: &[&str] = &["asc", "desc"];
const ENCODED_PLUS: &str = "%2B";

/// Characters escaped inside a query component. Space is handled separately
/// and always written as `+`.
const COMPONENT: &AsciiSet = &CONTROLS
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'?')
    .add(b'`');

/// The entity is a single route segment, so `/` is escaped as well.
const ENTITY: &AsciiSet = &COMPONENT.add(b'/');

static SUBSECOND: Lazy<Regex> = Lazy::new(|| compile_regex(r"(\d{2}:\d{2}:\d{2})\.\d+Z?"));

fn compile_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid regex literal {pattern}: {err}"))
}

/// Parameters recovered from a locator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Last route segment, e.g. `Simulations`.
    #[serde(default)]
    pub entity: Option<String>,
    /// Filter clauses in reverse-lexicographic order.
    #[serde(default)]
    pub filters: Vec<String>,
    /// Tag clauses in reverse-lexicographic order.
    #[serde(default)]
    pub tag_filters: Vec<String>,
    #[serde(default)]
    pub orderby: Option<String>,
    #[serde(default)]
    pub offset: Option<String>,
    #[serde(default)]
    pub count: Option<String>,
    /// Keys the grid does not understand. Kept for inspection, never hashed.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl FilterParams {
    /// Whether the locator narrows the grid at all.
    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty() || !self.tag_filters.is_empty()
    }

    /// Recognized, non-empty parameters in canonical key order.
    pub fn recognized(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if !self.filters.is_empty() {
            pairs.push((FILTERS_KEY, join_clauses(&self.filters)));
        }
        if !self.tag_filters.is_empty() {
            pairs.push((TAG_FILTERS_KEY, join_clauses(&self.tag_filters)));
        }
        // orderby > offset > count, i.e. reverse-lexicographic.
        for (key, value) in [
            (ORDERBY_KEY, &self.orderby),
            (OFFSET_KEY, &self.offset),
            (COUNT_KEY, &self.count),
        ] {
            if let Some(value) = value {
                pairs.push((key, value.clone()));
            }
        }
        pairs
    }
}

/// Decodes a locator into its parameters.
pub fn deparam(locator: &str) -> FilterParams {
    let locator = locator.trim();
    let (route, query) = locator.split_once('?').unwrap_or((locator, ""));
    let mut params = FilterParams {
        entity: route_entity(route),
        ..FilterParams::default()
    };

    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(raw_key);
        let value = decode_component(raw_value);
        match key.as_str() {
            FILTERS_KEY => params.filters.extend(split_clauses(&value)),
            TAG_FILTERS_KEY => params.tag_filters.extend(split_clauses(&value)),
            ORDERBY_KEY => params.orderby = non_empty(value),
            OFFSET_KEY => params.offset = non_empty(value),
            COUNT_KEY => params.count = non_empty(value),
            _ => {
                params.extra.insert(key, value);
            }
        }
    }

    canonicalize_clauses(&mut params.filters);
    canonicalize_clauses(&mut params.tag_filters);
    params
}

/// Rebuilds the deterministic locator string used as an entry's identity.
pub fn rehash(params: &FilterParams) -> String {
    let query = params
        .recognized()
        .into_iter()
        .map(|(key, value)| format!("{key}={}", encode_component(&value)))
        .collect::<Vec<_>>()
        .join("&");
    let entity = params
        .entity
        .as_deref()
        .map(|entity| encode_with(entity, ENTITY))
        .unwrap_or_default();
    if query.is_empty() {
        entity
    } else {
        format!("{entity}?{query}")
    }
}

/// Canonical hash of a locator, or `None` when it carries no filters.
pub fn canonical_hash(locator: &str) -> Option<String> {
    let params = deparam(locator);
    params.has_filters().then(|| rehash(&params))
}

/// Label for an entry the user has not named.
pub fn auto_name(params: &FilterParams) -> String {
    let entity = params
        .entity
        .as_deref()
        .filter(|entity| !entity.is_empty())
        .unwrap_or(DEFAULT_ENTITY);
    let clauses = params
        .filters
        .iter()
        .cloned()
        .chain(params.tag_filters.iter().map(|tag| format!("TAG {tag}")))
        .collect::<Vec<_>>();
    let name = format!("{entity} WHERE {}", clauses.join(" AND "));
    SUBSECOND.replace_all(&name, "$1").into_owned()
}

fn route_entity(route: &str) -> Option<String> {
    route
        .trim_start_matches('#')
        .split('/')
        .rev()
        .find(|segment| !segment.is_empty())
        .map(decode_component)
        .and_then(non_empty)
}

fn split_clauses(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(CLAUSE_SEPARATOR)
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(str::to_string)
}

fn canonicalize_clauses(clauses: &mut Vec<String>) {
    clauses.sort_unstable();
    clauses.dedup();
    clauses.reverse();
}

fn join_clauses(clauses: &[String]) -> String {
    clauses.join(&CLAUSE_SEPARATOR.to_string())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

fn encode_component(value: &str) -> String {
    encode_with(value, COMPONENT)
}

fn encode_with(value: &str, set: &'static AsciiSet) -> String {
    let encoded = utf8_percent_encode(value, set)
        .to_string()
        .replace(' ', "+");
    restore_sort_plus(encoded)
}

/// `Name+desc` keeps its plus: the sort direction suffix is never escaped.
fn restore_sort_plus(encoded: String) -> String {
    if !encoded.contains(ENCODED_PLUS) {
        return encoded;
    }
    let mut out = String::with_capacity(encoded.len());
    let mut rest = encoded.as_str();
    while let Some(pos) = rest.find(ENCODED_PLUS) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + ENCODED_PLUS.len()..];
        if starts_with_sort_token(tail) {
            out.push('+');
        } else {
            out.push_str(ENCODED_PLUS);
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}

fn starts_with_sort_token(tail: &str) -> bool {
    SORT_TOKENS.iter().any(|token| {
        tail.get(..token.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(token))
            && !tail[token.len()..].starts_with(|c: char| c.is_ascii_alphanumeric())
    })
}
