use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{AppError, Result};

const SUPPORTED_METHODS: [&str; 5] = ["get", "post", "put", "delete", "patch"];

// ============================================================================
// Reduced Specification
// ============================================================================

/// Condensed view of an OpenAPI document: just enough for a language model
/// to pick endpoints, and for the planner to validate what it picked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReducedSpec {
    pub title: String,
    pub description: String,
    pub base_url: String,
    pub operations: Vec<ReducedOperation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReducedOperation {
    pub method: String,
    pub path: String,
    pub summary: String,
    pub parameters: Vec<ParamSpec>,
}

impl ReducedOperation {
    /// Segment-wise path match where `{param}` segments accept any value.
    pub fn matches_path(&self, concrete: &str) -> bool {
        let template: Vec<&str> = self.path.trim_matches('/').split('/').collect();
        let given: Vec<&str> = concrete.trim_matches('/').split('/').collect();
        template.len() == given.len()
            && template
                .iter()
                .zip(&given)
                .all(|(t, g)| (t.starts_with('{') && t.ends_with('}')) || t == g)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub location: String,
    pub required: bool,
    pub description: String,
}

impl ReducedSpec {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::spec(format!("cannot read {}: {}", path, e)))?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let doc: Value = serde_yaml::from_str(raw)?;
        reduce(&doc)
    }

    pub fn find_operation(&self, method: &str, path: &str) -> Option<&ReducedOperation> {
        self.operations
            .iter()
            .find(|op| op.method.eq_ignore_ascii_case(method) && op.path == path)
    }

    /// Like [`find_operation`](Self::find_operation), but a concrete path such
    /// as `/movie/550` also matches a templated one like `/movie/{movie_id}`.
    pub fn resolve_operation(&self, method: &str, path: &str) -> Option<&ReducedOperation> {
        self.find_operation(method, path).or_else(|| {
            self.operations
                .iter()
                .find(|op| op.method.eq_ignore_ascii_case(method) && op.matches_path(path))
        })
    }

    /// Renders the reduction as prompt text: the service description, then
    /// one operation per line with its parameters indented below.
    pub fn endpoint_catalog(&self) -> String {
        let mut out = String::new();
        if !self.description.is_empty() {
            out.push_str(&self.description);
            out.push_str("\n\n");
        }
        for op in &self.operations {
            out.push_str(&format!("{} {} - {}\n", op.method, op.path, op.summary));
            for p in &op.parameters {
                let req = if p.required { "required" } else { "optional" };
                out.push_str(&format!(
                    "    {} ({}, {}): {}\n",
                    p.name, p.location, req, p.description
                ));
            }
        }
        out
    }
}

// ============================================================================
// Reduction
// ============================================================================

fn reduce(doc: &Value) -> Result<ReducedSpec> {
    let info = doc.get("info");
    let title = str_field(info, "title").unwrap_or_else(|| "API".to_string());
    let description = str_field(info, "description").unwrap_or_default();

    let base_url = doc
        .get("servers")
        .and_then(|s| s.as_sequence())
        .and_then(|seq| seq.first())
        .and_then(|srv| srv.get("url"))
        .and_then(|u| u.as_str())
        .unwrap_or_default()
        .trim_end_matches('/')
        .to_string();

    let paths = doc
        .get("paths")
        .and_then(|p| p.as_mapping())
        .ok_or_else(|| AppError::spec("specification has no paths section"))?;

    let mut operations = Vec::new();
    for (path_key, path_item) in paths {
        let Some(path) = path_key.as_str() else {
            continue;
        };
        let Some(methods) = path_item.as_mapping() else {
            continue;
        };

        for (method_key, op) in methods {
            let Some(method) = method_key.as_str() else {
                continue;
            };
            if !SUPPORTED_METHODS.contains(&method.to_ascii_lowercase().as_str()) {
                continue;
            }
            if op
                .get("deprecated")
                .and_then(|d| d.as_bool())
                .unwrap_or(false)
            {
                continue;
            }

            let summary = op
                .get("summary")
                .or_else(|| op.get("description"))
                .and_then(|s| s.as_str())
                .unwrap_or_default()
                .trim()
                .to_string();

            operations.push(ReducedOperation {
                method: method.to_ascii_uppercase(),
                path: path.to_string(),
                summary,
                parameters: reduce_parameters(op.get("parameters")),
            });
        }
    }

    if operations.is_empty() {
        return Err(AppError::spec("specification contains no usable operations"));
    }

    Ok(ReducedSpec {
        title,
        description,
        base_url,
        operations,
    })
}

fn reduce_parameters(params: Option<&Value>) -> Vec<ParamSpec> {
    let Some(seq) = params.and_then(|p| p.as_sequence()) else {
        return Vec::new();
    };

    seq.iter()
        .filter_map(|p| {
            // $ref parameters are dropped rather than resolved
            let name = p.get("name")?.as_str()?.to_string();
            Some(ParamSpec {
                name,
                location: p
                    .get("in")
                    .and_then(|v| v.as_str())
                    .unwrap_or("query")
                    .to_string(),
                required: p
                    .get("required")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
                description: p
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            })
        })
        .collect()
}

fn str_field(value: Option<&Value>, field: &str) -> Option<String> {
    value?
        .get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

// ============================================================================
// Tests
// ============================================================================
