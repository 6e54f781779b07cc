use crate::models::AccessRequirement;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

/// MatrixError
///
/// Configuration problems detected while building a matrix. These surface at
/// startup (or in tests), never while handling a request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatrixError {
    #[error("route template {0:?} must start with '/'")]
    InvalidTemplate(String),
    #[error("route {method} {template} is registered twice")]
    Duplicate { method: String, template: String },
    #[error("routes {method} {first} and {method} {second} can match the same path")]
    Ambiguous {
        method: String,
        first: String,
        second: String,
    },
    #[error("failed to parse route matrix: {0}")]
    Parse(String),
    #[error("failed to read route matrix file: {0}")]
    Io(String),
}

/// MatrixEntry
///
/// One `(method, pathTemplate)` registration. Template segments starting with
/// `:` match exactly one path segment of any value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MatrixEntry {
    #[schema(example = "GET")]
    pub method: String,
    #[schema(example = "/api/nav/:id")]
    pub path_template: String,
    /// `None` admits any caller with a context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub requirement: Option<AccessRequirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub description: Option<String>,
}

impl MatrixEntry {
    pub fn new(
        method: impl Into<String>,
        path_template: impl Into<String>,
        requirement: AccessRequirement,
    ) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path_template: path_template.into(),
            requirement: Some(requirement),
            description: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn segments(&self) -> Vec<&str> {
        self.path_template.split('/').collect()
    }

    fn is_templated(&self) -> bool {
        self.segments().iter().any(|s| is_param(s))
    }

    fn matches(&self, method: &str, path_segments: &[&str]) -> bool {
        if !self.method.eq_ignore_ascii_case(method) {
            return false;
        }
        let template = self.segments();
        template.len() == path_segments.len()
            && template
                .iter()
                .zip(path_segments)
                .all(|(t, p)| {
                    if is_param(t) {
                        !p.is_empty()
                    } else {
                        t == p
                    }
                })
    }
}

fn is_param(segment: &str) -> bool {
    segment.len() > 1 && segment.starts_with(':')
}

/// Two templated routes overlap when some concrete path matches both.
fn overlaps(a: &MatrixEntry, b: &MatrixEntry) -> bool {
    let (a_segments, b_segments) = (a.segments(), b.segments());
    a.method == b.method
        && a_segments.len() == b_segments.len()
        && a_segments
            .iter()
            .zip(&b_segments)
            .all(|(x, y)| is_param(x) || is_param(y) || x == y)
}

/// RoutePermissionMatrix
///
/// The ordered, immutable route table. Constructed once at startup and handed
/// to the authorizer; it is never mutated afterwards.
#[derive(Debug, Default)]
pub struct RoutePermissionMatrix {
    entries: Vec<MatrixEntry>,
    exact: HashMap<(String, String), usize>,
}

impl RoutePermissionMatrix {
    pub fn builder() -> MatrixBuilder {
        MatrixBuilder::default()
    }

    /// from_json_str
    ///
    /// Parses a JSON array of entries and builds a strict matrix, or a lenient
    /// one when `allow_ambiguous` is set.
    pub fn from_json_str(json: &str, allow_ambiguous: bool) -> Result<Self, MatrixError> {
        let entries: Vec<MatrixEntry> =
            serde_json::from_str(json).map_err(|e| MatrixError::Parse(e.to_string()))?;
        let mut builder = entries
            .into_iter()
            .fold(Self::builder(), |builder, entry| builder.entry(entry));
        if allow_ambiguous {
            builder = builder.allow_ambiguous();
        }
        builder.build()
    }

    pub fn from_file(path: impl AsRef<Path>, allow_ambiguous: bool) -> Result<Self, MatrixError> {
        let json = std::fs::read_to_string(path).map_err(|e| MatrixError::Io(e.to_string()))?;
        Self::from_json_str(&json, allow_ambiguous)
    }

    pub fn entries(&self) -> &[MatrixEntry] {
        &self.entries
    }

    /// match_route
    ///
    /// Finds the entry for a request. The query string is ignored. A
    /// parameter-free template equal to the path always wins; otherwise the
    /// first templated entry in registration order whose method, segment count
    /// and literal segments agree is returned.
    pub fn match_route(&self, method: &str, path: &str) -> Option<&MatrixEntry> {
        let path = path.split_once('?').map_or(path, |(path, _)| path);
        let method = method.to_ascii_uppercase();

        if let Some(&index) = self.exact.get(&(method.clone(), path.to_string())) {
            return Some(&self.entries[index]);
        }

        let segments: Vec<&str> = path.split('/').collect();
        self.entries
            .iter()
            .filter(|entry| entry.is_templated())
            .find(|entry| entry.matches(&method, &segments))
    }
}

/// MatrixBuilder
#[derive(Debug, Default)]
pub struct MatrixBuilder {
    entries: Vec<MatrixEntry>,
    allow_ambiguous: bool,
}

impl MatrixBuilder {
    pub fn entry(mut self, mut entry: MatrixEntry) -> Self {
        entry.method.make_ascii_uppercase();
        self.entries.push(entry);
        self
    }

    pub fn route(
        self,
        method: &str,
        path_template: &str,
        requirement: AccessRequirement,
    ) -> Self {
        self.entry(MatrixEntry::new(method, path_template, requirement))
    }

    pub fn get(self, path_template: &str, requirement: AccessRequirement) -> Self {
        self.route("GET", path_template, requirement)
    }

    pub fn post(self, path_template: &str, requirement: AccessRequirement) -> Self {
        self.route("POST", path_template, requirement)
    }

    pub fn put(self, path_template: &str, requirement: AccessRequirement) -> Self {
        self.route("PUT", path_template, requirement)
    }

    pub fn patch(self, path_template: &str, requirement: AccessRequirement) -> Self {
        self.route("PATCH", path_template, requirement)
    }

    pub fn delete(self, path_template: &str, requirement: AccessRequirement) -> Self {
        self.route("DELETE", path_template, requirement)
    }

    /// Keeps order-dependent first-match semantics for overlapping templates
    /// instead of rejecting them. Each overlap is still logged.
    pub fn allow_ambiguous(mut self) -> Self {
        self.allow_ambiguous = true;
        self
    }

    /// build
    ///
    /// Validates the table and freezes it.
    pub fn build(self) -> Result<RoutePermissionMatrix, MatrixError> {
        let mut exact = HashMap::new();
        let mut templated: Vec<&MatrixEntry> = Vec::new();

        for (index, entry) in self.entries.iter().enumerate() {
            if !entry.path_template.starts_with('/') {
                return Err(MatrixError::InvalidTemplate(entry.path_template.clone()));
            }

            if entry.is_templated() {
                if templated.iter().any(|other| {
                    other.method == entry.method && other.path_template == entry.path_template
                }) {
                    return Err(MatrixError::Duplicate {
                        method: entry.method.clone(),
                        template: entry.path_template.clone(),
                    });
                }
                if let Some(previous) = templated.iter().find(|other| overlaps(other, entry)) {
                    if !self.allow_ambiguous {
                        return Err(MatrixError::Ambiguous {
                            method: entry.method.clone(),
                            first: previous.path_template.clone(),
                            second: entry.path_template.clone(),
                        });
                    }
                    tracing::warn!(
                        method = %entry.method,
                        first = %previous.path_template,
                        second = %entry.path_template,
                        "overlapping route templates, first registration wins"
                    );
                }
                templated.push(entry);
            } else {
                let key = (entry.method.clone(), entry.path_template.clone());
                if exact.insert(key, index).is_some() {
                    return Err(MatrixError::Duplicate {
                        method: entry.method.clone(),
                        template: entry.path_template.clone(),
                    });
                }
            }
        }

        tracing::debug!(routes = self.entries.len(), "route matrix built");

        Ok(RoutePermissionMatrix {
            entries: self.entries,
            exact,
        })
    }
}
