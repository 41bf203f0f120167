//! Route definitions as submitted by the administrative surface.
//!
//! # Wire Shape
//! ```text
//! {
//!   "id": "r1",
//!   "predicates": ["Path=/consumer/**", { "name": "Method", "args": { "methods": "GET" } }],
//!   "filters": ["StripPrefix=1"],
//!   "uri": "lb://nacos-consumer",
//!   "order": 0
//! }
//! ```
//!
//! Predicates and filters accept either the full `{name, args}` object or the
//! `Name=arg1,arg2` shortcut. Shortcut arguments are keyed `_genkey_0`,
//! `_genkey_1`, ... in the order they were written.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Key prefix for positional (shortcut) arguments.
pub const GENERATED_KEY_PREFIX: &str = "_genkey_";

/// A routing rule: predicates over the request plus a forwarding target.
///
/// The `id` is the store key and never changes; updates replace the whole
/// definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// Unique route identifier.
    pub id: String,

    /// Conditions that must all hold for the route to apply.
    #[serde(default)]
    pub predicates: Vec<PredicateDefinition>,

    /// Request/response transformations, carried but never interpreted here.
    #[serde(default)]
    pub filters: Vec<FilterDefinition>,

    /// Destination the request is forwarded to (e.g. `lb://nacos-consumer`).
    #[serde(rename = "uri", alias = "targetUri", alias = "target_uri")]
    pub target_uri: String,

    /// Evaluation order (lower first). Ties keep insertion order.
    #[serde(default)]
    pub order: i32,

    /// Free-form metadata for downstream collaborators.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl RouteDefinition {
    /// Create a definition with no predicates, filters or metadata.
    pub fn new(id: impl Into<String>, target_uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            predicates: Vec::new(),
            filters: Vec::new(),
            target_uri: target_uri.into(),
            order: 0,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_predicate(mut self, predicate: PredicateDefinition) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn with_filter(mut self, filter: FilterDefinition) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

/// A named predicate with string arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ShortcutOrFull")]
pub struct PredicateDefinition {
    pub name: String,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

impl PredicateDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: BTreeMap::new(),
        }
    }

    /// Parse the `Name=arg1,arg2` shortcut form.
    pub fn shortcut(text: &str) -> Self {
        let (name, args) = parse_shortcut(text);
        Self { name, args }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// First non-empty value among the named keys.
    pub fn arg(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.args.get(*k))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }

    /// Positional arguments in shortcut order.
    pub fn positional(&self) -> Vec<&str> {
        let mut indexed: Vec<(usize, &str)> = self
            .args
            .iter()
            .filter_map(|(k, v)| {
                let index = k.strip_prefix(GENERATED_KEY_PREFIX)?.parse().ok()?;
                Some((index, v.as_str()))
            })
            .collect();
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, v)| v.trim()).collect()
    }

    /// All values of a list-valued argument: the named keys and every
    /// positional argument, each split on commas.
    pub fn values(&self, keys: &[&str]) -> Vec<String> {
        keys.iter()
            .filter_map(|k| self.args.get(*k).map(String::as_str))
            .chain(self.positional())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl fmt::Display for PredicateDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_definition(f, &self.name, &self.args)
    }
}

/// A named filter with string arguments. Opaque to the routing core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ShortcutOrFull")]
pub struct FilterDefinition {
    pub name: String,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

impl FilterDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: BTreeMap::new(),
        }
    }

    pub fn shortcut(text: &str) -> Self {
        let (name, args) = parse_shortcut(text);
        Self { name, args }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for FilterDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_definition(f, &self.name, &self.args)
    }
}

/// Either accepted input form for predicates and filters.
#[derive(Deserialize)]
#[serde(untagged)]
enum ShortcutOrFull {
    Shortcut(String),
    Full {
        name: String,
        #[serde(default)]
        args: BTreeMap<String, String>,
    },
}

impl ShortcutOrFull {
    fn into_parts(self) -> (String, BTreeMap<String, String>) {
        match self {
            ShortcutOrFull::Shortcut(text) => parse_shortcut(&text),
            ShortcutOrFull::Full { name, args } => (name, args),
        }
    }
}

impl From<ShortcutOrFull> for PredicateDefinition {
    fn from(raw: ShortcutOrFull) -> Self {
        let (name, args) = raw.into_parts();
        Self { name, args }
    }
}

impl From<ShortcutOrFull> for FilterDefinition {
    fn from(raw: ShortcutOrFull) -> Self {
        let (name, args) = raw.into_parts();
        Self { name, args }
    }
}

/// Split `Name=a,b` into its name and generated positional keys.
/// A missing `=` yields a name with no arguments.
fn parse_shortcut(text: &str) -> (String, BTreeMap<String, String>) {
    let Some((name, rest)) = text.split_once('=') else {
        return (text.trim().to_string(), BTreeMap::new());
    };

    let args = rest
        .split(',')
        .map(str::trim)
        .enumerate()
        .map(|(i, v)| (format!("{GENERATED_KEY_PREFIX}{i}"), v.to_string()))
        .collect();

    (name.trim().to_string(), args)
}

fn write_definition(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    args: &BTreeMap<String, String>,
) -> fmt::Result {
    write!(f, "{}", name)?;
    for (i, (key, value)) in args.iter().enumerate() {
        let sep = if i == 0 { '=' } else { ',' };
        if key.starts_with(GENERATED_KEY_PREFIX) {
            write!(f, "{}{}", sep, value)?;
        } else {
            write!(f, "{}{}:{}", sep, key, value)?;
        }
    }
    Ok(())
}
