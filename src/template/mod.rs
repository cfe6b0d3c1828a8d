//! Template rendering: braced-variable substitution and a small expression
//! language, plus the version-expression evaluator (§4.2).

pub mod expr;
pub mod version_expr;

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Variables available to a template/expression: `{version, tag, os, arch, asset}`.
pub type Vars<'a> = HashMap<&'a str, &'a str>;

static VAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\s*\.(\w+)\s*\}\}").unwrap());

/// Detects whether a string should be treated as an expression rather than
/// a braced-variable template (§4.2 "Detection heuristic").
pub fn is_expression(s: &str) -> bool {
    s.contains('\n')
        || (s.contains('?') && s.contains(':'))
        || s.contains(" in ")
        || s.contains("==")
        || s.contains("!=")
}

/// Renders a braced-variable template against `vars`. Fails if the
/// template references a variable not present in `vars`.
pub fn render(template: &str, vars: &Vars) -> Result<String> {
    let mut err = None;
    let rendered = VAR_RE.replace_all(template, |caps: &regex::Captures| {
        let name = &caps[1];
        match vars.get(name) {
            Some(value) => value.to_string(),
            None => {
                err = Some(name.to_string());
                String::new()
            }
        }
    });

    match err {
        Some(name) => Err(Error::Template {
            template: template.to_string(),
            message: format!("unknown variable {name:?}"),
        }),
        None => Ok(rendered.into_owned()),
    }
}

/// Dispatches to [`render`] or [`expr::eval`] depending on [`is_expression`].
pub fn render_auto(template: &str, vars: &Vars) -> Result<String> {
    if is_expression(template) {
        expr::eval(template, vars).map(|v| v.to_display_string())
    } else {
        render(template, vars)
    }
}

/// If a URL ends in `/` and does not already reference `{{.asset}}`,
/// appends it (§4.3 `NormalizeURLTemplate`).
pub fn normalize_url_template(url: &str) -> String {
    if url.ends_with('/') && !url.contains("{{.asset}}") {
        format!("{url}{{{{.asset}}}}")
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_known_variables() {
        let mut vars = Vars::new();
        vars.insert("version", "4.35.1");
        vars.insert("os", "darwin");
        vars.insert("arch", "arm64");
        let out = render("yq_{{.os}}_{{.arch}}.tar.gz", &vars).unwrap();
        assert_eq!(out, "yq_darwin_arm64.tar.gz");
    }

    #[test]
    fn fails_on_unknown_variable() {
        let vars = Vars::new();
        assert!(render("{{.missing}}", &vars).is_err());
    }

    #[test]
    fn detects_expression_vs_template() {
        assert!(!is_expression("https://x/{{.version}}/{{.os}}"));
        assert!(is_expression("a == b"));
        assert!(is_expression("a ? b : c"));
        assert!(is_expression("a in list"));
    }

    #[test]
    fn normalizes_trailing_slash_url() {
        assert_eq!(
            normalize_url_template("https://example.com/dl/"),
            "https://example.com/dl/{{.asset}}"
        );
        assert_eq!(
            normalize_url_template("https://example.com/dl/{{.asset}}"),
            "https://example.com/dl/{{.asset}}"
        );
    }
}
