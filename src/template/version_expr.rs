//! Version-expression evaluator: transforms/filters a list of versions
//! using either a named common filter or an arbitrary expression (§4.2).

use crate::template::expr::{self, Value};
use crate::template::{is_expression, Vars};
use crate::version::Version;

/// Applies `version-expr` to a list of versions, producing the filtered
/// and possibly-transformed list. Unknown/empty expressions pass versions
/// through unchanged.
pub fn apply(expr_src: &str, versions: Vec<Version>) -> Vec<Version> {
    if expr_src.trim().is_empty() {
        return versions;
    }
    if let Some(named) = named_filter(expr_src) {
        return named(versions);
    }

    versions
        .into_iter()
        .filter_map(|v| apply_one(expr_src, v))
        .collect()
}

fn apply_one(expr_src: &str, v: Version) -> Option<Version> {
    let published = v.published.clone().unwrap_or_default();
    let sha = v.sha.clone().unwrap_or_default();
    let prerelease_str = v.prerelease.to_string();
    let mut vars = Vars::new();
    vars.insert("tag", &v.tag);
    vars.insert("version", &v.normalized);
    vars.insert("sha", &sha);
    vars.insert("published", &published);
    vars.insert("prerelease", &prerelease_str);

    let result = if is_expression(expr_src) {
        expr::eval(expr_src, &vars).ok()?
    } else {
        // Treated as a JSON object template or bare transform string,
        // rendered through the same variable bindings first.
        let rendered = crate::template::render(expr_src, &vars).ok()?;
        Value::Str(rendered)
    };

    interpret(result, v)
}

fn interpret(result: Value, mut v: Version) -> Option<Version> {
    match result {
        Value::Bool(true) => Some(v),
        Value::Bool(false) => None,
        Value::Str(s) if s.is_empty() => None,
        Value::Str(s) => {
            if let Ok(obj) = serde_json::from_str::<serde_json::Value>(&s) {
                if obj.is_object() {
                    return interpret_object(obj, v);
                }
            }
            v.tag = s.clone();
            v.normalized = crate::version::normalize(&s);
            Some(v)
        }
        Value::List(_) => Some(v),
    }
}

fn interpret_object(obj: serde_json::Value, mut v: Version) -> Option<Version> {
    if obj.get("include").and_then(|b| b.as_bool()) == Some(false) {
        return None;
    }
    let tag_changed = if let Some(tag) = obj.get("tag").and_then(|t| t.as_str()) {
        let changed = tag != v.tag;
        v.tag = tag.to_string();
        changed
    } else {
        false
    };
    if let Some(version) = obj.get("version").and_then(|t| t.as_str()) {
        v.normalized = version.to_string();
    } else if tag_changed {
        v.normalized = crate::version::normalize(&v.tag);
    }
    if let Some(sha) = obj.get("sha").and_then(|t| t.as_str()) {
        v.sha = Some(sha.to_string());
    }
    if let Some(pre) = obj.get("prerelease").and_then(|t| t.as_bool()) {
        v.prerelease = pre;
    }
    Some(v)
}

type Filter = fn(Vec<Version>) -> Vec<Version>;

fn named_filter(name: &str) -> Option<Filter> {
    match name.trim() {
        "no-prerelease" => Some(|versions| versions.into_iter().filter(|v| !v.prerelease).collect()),
        "only-prerelease" => Some(|versions| versions.into_iter().filter(|v| v.prerelease).collect()),
        "v-prefix" | "add-v-prefix" => Some(|versions| {
            versions
                .into_iter()
                .map(|mut v| {
                    if !v.tag.starts_with('v') {
                        v.tag = format!("v{}", v.tag);
                    }
                    v
                })
                .collect()
        }),
        "no-v-prefix" | "remove-v-prefix" => Some(|versions| {
            versions
                .into_iter()
                .map(|mut v| {
                    v.tag = v.tag.trim_start_matches('v').to_string();
                    v
                })
                .collect()
        }),
        "remove-go-prefix" | "normalize-go" => Some(|versions| {
            versions
                .into_iter()
                .map(|mut v| {
                    v.tag = v.tag.trim_start_matches("go").to_string();
                    v.normalized = crate::version::normalize(&v.tag);
                    v
                })
                .collect()
        }),
        _ => None,
    }
}
