use std::fmt;
use std::path::Path;

use axum::routing::MethodFilter;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{Action, ControllerResolver};
use crate::error::RouteDecodeError;

/// One route mapping value: a single `module.action` or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteTarget {
    One(String),
    Many(Vec<String>),
}

impl RouteTarget {
    pub fn references(&self) -> &[String] {
        match self {
            RouteTarget::One(r) => std::slice::from_ref(r),
            RouteTarget::Many(list) => list,
        }
    }
}

/// A route mapping as written in `conf.json`, in declaration order.
pub type RouteSpec = IndexMap<String, RouteTarget>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Delete,
    All,
}

impl RouteMethod {
    /// Case-insensitive. `all` is accepted for symmetry with the default.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "get" => Some(RouteMethod::Get),
            "post" => Some(RouteMethod::Post),
            "put" => Some(RouteMethod::Put),
            "delete" => Some(RouteMethod::Delete),
            "all" => Some(RouteMethod::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Delete => "DELETE",
            RouteMethod::All => "ALL",
        }
    }

    /// `None` for [`RouteMethod::All`], which is registered as a method fallback.
    pub fn filter(&self) -> Option<MethodFilter> {
        match self {
            RouteMethod::Get => Some(MethodFilter::GET),
            RouteMethod::Post => Some(MethodFilter::POST),
            RouteMethod::Put => Some(MethodFilter::PUT),
            RouteMethod::Delete => Some(MethodFilter::DELETE),
            RouteMethod::All => None,
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved `(method, path, handler)` triple.
#[derive(Debug, Clone)]
pub struct RouteRecord {
    pub method: RouteMethod,
    pub path: String,
    pub action: Action,
}

/// Split a route key `"[METHOD ]/path"` into its method and path.
///
/// The separating space is optional (`"get/test"`). The method defaults to
/// [`RouteMethod::All`]; the path must start with `/` and keeps its case.
pub fn parse_route_key(key: &str) -> Result<(RouteMethod, String), RouteDecodeError> {
    let missing_path = || RouteDecodeError::MissingPath { key: key.to_string() };
    let trimmed = key.trim();

    let (method, path) = match trimmed.split_once(char::is_whitespace) {
        Some((method, rest)) => {
            let method = RouteMethod::parse(method).ok_or_else(|| RouteDecodeError::UnknownMethod {
                key: key.to_string(),
                method: method.to_string(),
            })?;
            (method, rest.trim())
        }
        // A bare method such as `"get"` carries no path.
        None if RouteMethod::parse(trimmed).is_some() => return Err(missing_path()),
        None => split_glued_method(trimmed).unwrap_or((RouteMethod::All, trimmed)),
    };

    if path.is_empty() || path.contains(char::is_whitespace) {
        return Err(missing_path());
    }
    if !path.starts_with('/') {
        return Err(RouteDecodeError::RelativePath {
            key: key.to_string(),
            path: path.to_string(),
        });
    }
    Ok((method, path.to_string()))
}

/// `"get/test"` -> `(Get, "/test")`.
fn split_glued_method(key: &str) -> Option<(RouteMethod, &str)> {
    let slash = key.find('/').filter(|&i| i > 0)?;
    let method = RouteMethod::parse(&key[..slash])?;
    Some((method, &key[slash..]))
}

/// Split `module.action`; exactly one dot is allowed.
fn split_reference(reference: &str) -> Result<(&str, &str), RouteDecodeError> {
    let mut parts = reference.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(module), Some(action), None) if !module.trim().is_empty() && !action.trim().is_empty() => {
            Ok((module.trim(), action.trim()))
        }
        _ => Err(RouteDecodeError::MalformedReference {
            reference: reference.to_string(),
        }),
    }
}

/// Decode a route mapping into records, in declaration order.
///
/// Entries that cannot be decoded are logged and skipped; a bad reference in
/// a list does not drop its siblings.
pub fn decode_routes(
    base_path: &Path,
    spec: &RouteSpec,
    resolver: &dyn ControllerResolver,
) -> Vec<RouteRecord> {
    let mut records = Vec::with_capacity(spec.len());

    for (key, target) in spec {
        let (method, path) = match parse_route_key(key) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(route = %key, base = %base_path.display(), error = %err, "Skipping invalid route key");
                continue;
            }
        };

        let references = target.references();
        if references.is_empty() {
            let err = RouteDecodeError::EmptyTarget { key: key.clone() };
            tracing::warn!(route = %key, base = %base_path.display(), error = %err, "Skipping route without handler");
            continue;
        }

        for reference in references {
            match resolve_reference(base_path, reference, resolver) {
                Ok(action) => records.push(RouteRecord {
                    method,
                    path: path.clone(),
                    action,
                }),
                Err(err) => {
                    tracing::warn!(
                        route = %key,
                        action = %reference,
                        base = %base_path.display(),
                        error = %err,
                        "Skipping unresolvable route action"
                    );
                }
            }
        }
    }

    records
}

fn resolve_reference(
    base_path: &Path,
    reference: &str,
    resolver: &dyn ControllerResolver,
) -> Result<Action, RouteDecodeError> {
    let (module, action) = split_reference(reference)?;
    Ok(resolver.resolve_action(base_path, module, action)?)
}
