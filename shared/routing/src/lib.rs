//! Method-aware path router with `{param}` captures.
use http::Method;
use std::collections::HashMap;

#[derive(Debug)]
enum PathSegment {
    Static(String),
    Param(String),
}

/// A path pattern such as `/api/contentful/{store_id}`. Leading and trailing
/// slashes are not significant.
#[derive(Debug)]
struct PathPattern {
    segments: Vec<PathSegment>,
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.trim().trim_matches('/');
    trimmed.split('/').filter(move |_| !trimmed.is_empty())
}

impl PathPattern {
    fn parse(pattern: &str) -> Self {
        let segments = split_path(pattern)
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => PathSegment::Param(name.to_string()),
                None => PathSegment::Static(s.to_string()),
            })
            .collect();

        PathPattern { segments }
    }

    /// Captured parameters when `request_path` matches segment for segment.
    fn matches<'a>(&self, request_path: &'a str) -> Option<HashMap<String, &'a str>> {
        let request_segments: Vec<&'a str> = split_path(request_path).collect();
        if request_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (pattern, segment) in self.segments.iter().zip(request_segments) {
            match pattern {
                PathSegment::Static(expected) if expected == segment => {}
                PathSegment::Static(_) => return None,
                // An empty segment ("//") never binds a parameter
                PathSegment::Param(_) if segment.is_empty() => return None,
                PathSegment::Param(name) => {
                    params.insert(name.clone(), segment);
                }
            }
        }
        Some(params)
    }
}

#[derive(Debug, PartialEq)]
pub struct RouteMatch<'a, A> {
    pub params: HashMap<String, &'a str>,
    pub action: &'a A,
}

/// Outcome of resolving a request against the route table.
#[derive(Debug, PartialEq)]
pub enum Resolution<'a, A> {
    Matched(RouteMatch<'a, A>),
    /// A route matched the path but none of them accepts the method.
    MethodNotAllowed,
    NotFound,
}

#[derive(Debug)]
pub struct Route<A> {
    path: PathPattern,
    method: Option<Method>,
    action: A,
}

impl<A> Route<A> {
    /// A route accepting any method on `path`.
    pub fn new(path: &str, action: A) -> Self {
        Route {
            path: PathPattern::parse(path),
            method: None,
            action,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn matches<'a>(&'a self, request_path: &'a str) -> Option<RouteMatch<'a, A>> {
        let params = self.path.matches(request_path)?;
        Some(RouteMatch {
            params,
            action: &self.action,
        })
    }

    fn accepts(&self, method: &Method) -> bool {
        self.method.as_ref().is_none_or(|m| m == method)
    }
}

pub struct RouteActions<A> {
    routes: Vec<Route<A>>,
}

impl<A> RouteActions<A> {
    pub fn new(routes: Vec<Route<A>>) -> Self {
        Self { routes }
    }

    /// First route matching both path and method.
    pub fn resolve<'a, B>(&'a self, request: &'a http::Request<B>) -> Resolution<'a, A> {
        let path = request.uri().path();
        let mut method_mismatch = false;

        for route in &self.routes {
            if let Some(route_match) = route.matches(path) {
                if route.accepts(request.method()) {
                    return Resolution::Matched(route_match);
                }
                method_mismatch = true;
            }
        }

        if method_mismatch {
            Resolution::MethodNotAllowed
        } else {
            Resolution::NotFound
        }
    }
}
