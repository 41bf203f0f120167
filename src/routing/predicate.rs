//! Request predicates.
//!
//! # Responsibilities
//! - Match path patterns (segment globs, case-sensitive) and raw prefixes
//! - Match host header (exact or subdomain wildcard, case-insensitive)
//! - Match header presence/value, method set and query parameters
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Host matching is case-insensitive (RFC 9110), port ignored
//! - Path matching is case-sensitive
//! - Empty condition set = always matches (wildcard)
//! - No regex to guarantee O(n) matching

use std::fmt;

use axum::http::{HeaderMap, HeaderName, Method, Request, Uri};
use thiserror::Error;

use crate::routing::definition::PredicateDefinition;

/// The parts of a request that predicates look at.
#[derive(Debug, Clone, Copy)]
pub struct RequestHead<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
}

impl<'a> RequestHead<'a> {
    pub fn new(method: &'a Method, uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        Self { method, uri, headers }
    }

    pub fn from_request<B>(req: &'a Request<B>) -> Self {
        Self::new(req.method(), req.uri(), req.headers())
    }

    /// Host from the Host header, falling back to the URI authority.
    fn host(&self) -> Option<&'a str> {
        self.headers
            .get("host")
            .and_then(|h| h.to_str().ok())
            .or_else(|| self.uri.host())
            .map(strip_port)
    }
}

/// Errors raised while building a predicate from its definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    #[error("unknown predicate `{0}`")]
    Unknown(String),

    #[error("predicate `{predicate}` requires argument `{argument}`")]
    MissingArgument {
        predicate: &'static str,
        argument: &'static str,
    },

    #[error("predicate `{predicate}`: {reason}")]
    Invalid {
        predicate: &'static str,
        reason: String,
    },
}

/// Trait for matching requests against conditions.
pub trait RequestPredicate: Send + Sync + fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &RequestHead<'_>) -> bool;
}

/// Build an evaluator for one predicate definition.
pub fn build_predicate(
    def: &PredicateDefinition,
) -> Result<Box<dyn RequestPredicate>, PredicateError> {
    match def.name.to_ascii_lowercase().as_str() {
        "path" => Ok(Box::new(PathMatcher::from_definition(def)?)),
        "pathprefix" => Ok(Box::new(PathPrefixMatcher::from_definition(def)?)),
        "host" => Ok(Box::new(HostMatcher::from_definition(def)?)),
        "header" => Ok(Box::new(HeaderMatcher::from_definition(def)?)),
        "method" => Ok(Box::new(MethodMatcher::from_definition(def)?)),
        "query" => Ok(Box::new(QueryMatcher::from_definition(def)?)),
        _ => Err(PredicateError::Unknown(def.name.clone())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`: exactly one segment.
    Any,
    /// A segment with embedded `*` wildcards, e.g. `*.html`.
    Glob(String),
}

impl Segment {
    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Literal(lit) => lit == segment,
            Segment::Any => true,
            Segment::Glob(pattern) => wildcard_match(pattern, segment),
        }
    }
}

/// One compiled path pattern.
#[derive(Debug, Clone)]
struct PathPattern {
    segments: Vec<Segment>,
    /// Trailing `/**`: the base path and everything below it.
    open_ended: bool,
}

impl PathPattern {
    fn parse(pattern: &str) -> Result<Self, PredicateError> {
        if !pattern.starts_with('/') {
            return Err(PredicateError::Invalid {
                predicate: "Path",
                reason: format!("pattern `{}` must start with `/`", pattern),
            });
        }

        let mut raw: Vec<&str> = split_segments(pattern).collect();
        let open_ended = raw.last() == Some(&"**");
        if open_ended {
            raw.pop();
        }

        let segments = raw
            .into_iter()
            .map(|s| match s {
                "**" => Err(PredicateError::Invalid {
                    predicate: "Path",
                    reason: format!("`**` is only allowed as the last segment of `{}`", pattern),
                }),
                "*" => Ok(Segment::Any),
                s if s.contains('*') => Ok(Segment::Glob(s.to_string())),
                s => Ok(Segment::Literal(s.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { segments, open_ended })
    }

    fn matches(&self, path: &str) -> bool {
        let mut actual = split_segments(path);
        for expected in &self.segments {
            match actual.next() {
                Some(segment) if expected.matches(segment) => {}
                _ => return false,
            }
        }
        self.open_ended || actual.next().is_none()
    }
}

/// Matches the request path against segment glob patterns (any may match).
#[derive(Debug, Clone)]
pub struct PathMatcher {
    patterns: Vec<PathPattern>,
}

impl PathMatcher {
    pub fn new<I, S>(patterns: I) -> Result<Self, PredicateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| PathPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if patterns.is_empty() {
            return Err(PredicateError::MissingArgument {
                predicate: "Path",
                argument: "patterns",
            });
        }
        Ok(Self { patterns })
    }

    fn from_definition(def: &PredicateDefinition) -> Result<Self, PredicateError> {
        Self::new(def.values(&["pattern", "patterns"]))
    }
}

impl RequestPredicate for PathMatcher {
    fn matches(&self, req: &RequestHead<'_>) -> bool {
        let path = req.uri.path();
        self.patterns.iter().any(|p| p.matches(path))
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Result<Self, PredicateError> {
        let prefix = prefix.into();
        if !prefix.starts_with('/') {
            return Err(PredicateError::Invalid {
                predicate: "PathPrefix",
                reason: format!("prefix `{}` must start with `/`", prefix),
            });
        }
        Ok(Self { prefix })
    }

    fn from_definition(def: &PredicateDefinition) -> Result<Self, PredicateError> {
        let prefix = def
            .arg(&["prefix"])
            .or_else(|| def.positional().into_iter().find(|v| !v.is_empty()))
            .ok_or(PredicateError::MissingArgument {
                predicate: "PathPrefix",
                argument: "prefix",
            })?;
        Self::new(prefix)
    }
}

impl RequestPredicate for PathPrefixMatcher {
    fn matches(&self, req: &RequestHead<'_>) -> bool {
        req.uri.path().starts_with(&self.prefix)
    }
}

#[derive(Debug, Clone)]
enum HostPattern {
    Exact(String),
    /// Stored with its leading dot, e.g. `.example.com`.
    Subdomain(String),
}

/// Matches the Host header.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    patterns: Vec<HostPattern>,
}

impl HostMatcher {
    /// Hosts are normalized to lowercase for case-insensitive matching.
    pub fn new<I, S>(hosts: I) -> Result<Self, PredicateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<HostPattern> = hosts
            .into_iter()
            .map(|h| {
                let host = h.as_ref().to_lowercase();
                match host.strip_prefix("**").or_else(|| host.strip_prefix('*')) {
                    Some(suffix) if suffix.starts_with('.') && suffix.len() > 1 => {
                        HostPattern::Subdomain(suffix.to_string())
                    }
                    _ => HostPattern::Exact(host),
                }
            })
            .collect();
        if patterns.is_empty() {
            return Err(PredicateError::MissingArgument {
                predicate: "Host",
                argument: "patterns",
            });
        }
        Ok(Self { patterns })
    }

    fn from_definition(def: &PredicateDefinition) -> Result<Self, PredicateError> {
        Self::new(def.values(&["pattern", "patterns"]))
    }
}

impl RequestPredicate for HostMatcher {
    fn matches(&self, req: &RequestHead<'_>) -> bool {
        let Some(host) = req.host() else {
            return false;
        };
        let host = host.to_lowercase();
        self.patterns.iter().any(|p| match p {
            HostPattern::Exact(expected) => &host == expected,
            HostPattern::Subdomain(suffix) => host.ends_with(suffix.as_str()),
        })
    }
}

/// Matches a header's presence, or one of its values exactly.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: HeaderName,
    value: Option<String>,
}

impl HeaderMatcher {
    pub fn new(name: &str, value: Option<String>) -> Result<Self, PredicateError> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| PredicateError::Invalid {
            predicate: "Header",
            reason: format!("`{}` is not a valid header name", name),
        })?;
        Ok(Self { name, value })
    }

    fn from_definition(def: &PredicateDefinition) -> Result<Self, PredicateError> {
        let positional = def.positional();
        let name = def
            .arg(&["header", "name"])
            .or_else(|| positional.first().copied().filter(|v| !v.is_empty()))
            .ok_or(PredicateError::MissingArgument {
                predicate: "Header",
                argument: "header",
            })?;
        let value = def
            .arg(&["value"])
            .or_else(|| positional.get(1).copied().filter(|v| !v.is_empty()))
            .map(str::to_string);
        Self::new(name, value)
    }
}

impl RequestPredicate for HeaderMatcher {
    fn matches(&self, req: &RequestHead<'_>) -> bool {
        let mut values = req.headers.get_all(&self.name).iter().peekable();
        match &self.value {
            None => values.peek().is_some(),
            Some(expected) => values.any(|v| v.as_bytes() == expected.as_bytes()),
        }
    }
}

/// Matches the request method against a set.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    methods: Vec<Method>,
}

impl MethodMatcher {
    pub fn new<I, S>(methods: I) -> Result<Self, PredicateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let methods = methods
            .into_iter()
            .map(|m| {
                let token = m.as_ref().to_ascii_uppercase();
                Method::from_bytes(token.as_bytes()).map_err(|_| PredicateError::Invalid {
                    predicate: "Method",
                    reason: format!("`{}` is not a valid method", m.as_ref()),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if methods.is_empty() {
            return Err(PredicateError::MissingArgument {
                predicate: "Method",
                argument: "methods",
            });
        }
        Ok(Self { methods })
    }

    fn from_definition(def: &PredicateDefinition) -> Result<Self, PredicateError> {
        Self::new(def.values(&["method", "methods"]))
    }
}

impl RequestPredicate for MethodMatcher {
    fn matches(&self, req: &RequestHead<'_>) -> bool {
        self.methods.contains(req.method)
    }
}

/// Matches a query parameter's presence, or its value.
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    param: String,
    value: Option<String>,
}

impl QueryMatcher {
    pub fn new(param: impl Into<String>, value: Option<String>) -> Self {
        Self {
            param: param.into(),
            value,
        }
    }

    fn from_definition(def: &PredicateDefinition) -> Result<Self, PredicateError> {
        let positional = def.positional();
        let param = def
            .arg(&["param"])
            .or_else(|| positional.first().copied().filter(|v| !v.is_empty()))
            .ok_or(PredicateError::MissingArgument {
                predicate: "Query",
                argument: "param",
            })?;
        let value = def
            .arg(&["value"])
            .or_else(|| positional.get(1).copied().filter(|v| !v.is_empty()))
            .map(str::to_string);
        Ok(Self::new(param, value))
    }
}

impl RequestPredicate for QueryMatcher {
    fn matches(&self, req: &RequestHead<'_>) -> bool {
        let Some(query) = req.uri.query() else {
            return false;
        };
        url::form_urlencoded::parse(query.as_bytes()).any(|(k, v)| {
            k == self.param.as_str() && self.value.as_deref().map_or(true, |expected| v == expected)
        })
    }
}

/// Combines multiple predicates with AND semantics.
#[derive(Debug, Default)]
pub struct AndMatcher {
    predicates: Vec<Box<dyn RequestPredicate>>,
}

impl AndMatcher {
    pub fn new(predicates: Vec<Box<dyn RequestPredicate>>) -> Self {
        Self { predicates }
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl RequestPredicate for AndMatcher {
    fn matches(&self, req: &RequestHead<'_>) -> bool {
        // All predicates must pass (AND)
        self.predicates.iter().all(|p| p.matches(req))
    }
}

/// Non-empty path segments; repeated and trailing slashes are ignored.
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port))
            if !name.is_empty()
                && port.bytes().all(|b| b.is_ascii_digit())
                && (!name.contains(':') || name.ends_with(']')) =>
        {
            name
        }
        _ => host,
    }
}

/// `*` matches any run of characters within a single segment.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == b'*' {
            star = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|b| *b == b'*')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, uri: &str, headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap()
    }

    fn matches(p: &dyn RequestPredicate, req: &Request<()>) -> bool {
        p.matches(&RequestHead::from_request(req))
    }

    #[test]
    fn test_host_matcher() {
        let matcher = HostMatcher::new(["example.com"]).unwrap();

        let req1 = request("GET", "/", &[("Host", "example.com")]);
        assert!(matches(&matcher, &req1));

        let req2 = request("GET", "/", &[("Host", "EXAMPLE.COM:8080")]);
        assert!(matches(&matcher, &req2)); // Case insensitive, port ignored

        let req3 = request("GET", "/", &[("Host", "other.com")]);
        assert!(!matches(&matcher, &req3));
    }

    #[test]
    fn test_host_subdomain_wildcard() {
        let matcher = HostMatcher::new(["**.example.com"]).unwrap();
        assert!(matches(&matcher, &request("GET", "/", &[("Host", "api.example.com")])));
        assert!(!matches(&matcher, &request("GET", "/", &[("Host", "example.com")])));
        assert!(!matches(&matcher, &request("GET", "/", &[])));
    }

    #[test]
    fn test_path_prefix_matcher() {
        let matcher = PathPrefixMatcher::new("/api").unwrap();
        assert!(matches(&matcher, &request("GET", "http://example.com/api/v1", &[])));
        assert!(!matches(&matcher, &request("GET", "http://example.com/images", &[])));
        assert!(PathPrefixMatcher::new("api").is_err());
    }

    #[test]
    fn test_path_patterns() {
        let matcher = PathMatcher::new(["/consumer/**"]).unwrap();
        assert!(matches(&matcher, &request("GET", "/consumer", &[])));
        assert!(matches(&matcher, &request("GET", "/consumer/sayHello/Tom", &[])));
        assert!(!matches(&matcher, &request("GET", "/consumers", &[])));

        let single = PathMatcher::new(["/users/*/orders", "/static/*.css"]).unwrap();
        assert!(matches(&single, &request("GET", "/users/42/orders", &[])));
        assert!(!matches(&single, &request("GET", "/users/42/orders/7", &[])));
        assert!(matches(&single, &request("GET", "/static/site.css", &[])));
        assert!(!matches(&single, &request("GET", "/static/site.js", &[])));
    }

    #[test]
    fn test_invalid_path_patterns() {
        assert!(PathMatcher::new(["no-slash"]).is_err());
        assert!(PathMatcher::new(["/a/**/b"]).is_err());
        assert!(PathMatcher::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_header_matcher() {
        let present = HeaderMatcher::new("x-canary", None).unwrap();
        let valued = HeaderMatcher::new("x-canary", Some("on".into())).unwrap();

        let req = request("GET", "/", &[("X-Canary", "on")]);
        assert!(matches(&present, &req));
        assert!(matches(&valued, &req));

        let off = request("GET", "/", &[("X-Canary", "off")]);
        assert!(matches(&present, &off));
        assert!(!matches(&valued, &off));

        assert!(HeaderMatcher::new("bad header", None).is_err());
    }

    #[test]
    fn test_method_matcher() {
        let matcher = MethodMatcher::new(["get", "POST"]).unwrap();
        assert!(matches(&matcher, &request("GET", "/", &[])));
        assert!(matches(&matcher, &request("POST", "/", &[])));
        assert!(!matches(&matcher, &request("DELETE", "/", &[])));
        assert!(MethodMatcher::new(["G ET"]).is_err());
    }

    #[test]
    fn test_query_matcher() {
        let matcher = QueryMatcher::new("name", Some("Tom Cat".into()));
        assert!(matches(&matcher, &request("GET", "/?name=Tom+Cat&x=1", &[])));
        assert!(!matches(&matcher, &request("GET", "/?name=Jerry", &[])));
        assert!(!matches(&matcher, &request("GET", "/", &[])));
    }

    #[test]
    fn test_build_from_definitions() {
        let def = PredicateDefinition::shortcut("Header=X-Env,prod");
        let p = build_predicate(&def).unwrap();
        assert!(matches(p.as_ref(), &request("GET", "/", &[("x-env", "prod")])));

        let unknown = PredicateDefinition::shortcut("Weight=group,5");
        assert_eq!(
            build_predicate(&unknown).unwrap_err(),
            PredicateError::Unknown("Weight".into())
        );

        let missing = PredicateDefinition::new("Header");
        assert!(matches!(
            build_predicate(&missing),
            Err(PredicateError::MissingArgument { predicate: "Header", .. })
        ));
    }

    #[test]
    fn test_and_matcher() {
        let and = AndMatcher::new(vec![
            Box::new(PathPrefixMatcher::new("/api").unwrap()),
            Box::new(MethodMatcher::new(["GET"]).unwrap()),
        ]);
        assert!(matches(&and, &request("GET", "/api/x", &[])));
        assert!(!matches(&and, &request("POST", "/api/x", &[])));
        assert!(matches(&AndMatcher::default(), &request("PUT", "/anything", &[])));
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*.html", "index.html"));
        assert!(wildcard_match("a*b*c", "axxbyyc"));
        assert!(!wildcard_match("a*b", "ac"));
    }
}
