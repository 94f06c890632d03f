use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::error::ValidationError;

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
}

/// One template as written in `templates.yaml`.
///
/// Exactly one of `template` or the `starts-with`/`ends-with` pair must be
/// present. This is checked by [`CompiledTemplate::compile`], not by serde,
/// so the error names the offending template.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TemplateDefinition {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default, alias = "startsWith")]
    pub starts_with: Option<String>,
    #[serde(default, alias = "endsWith")]
    pub ends_with: Option<String>,
}

impl TemplateDefinition {
    pub fn single_line(id: &str, template: &str) -> TemplateDefinition {
        TemplateDefinition {
            id: Some(id.to_string()),
            template: Some(template.to_string()),
            ..Default::default()
        }
    }

    pub fn multiline(id: &str, starts_with: &str, ends_with: &str) -> TemplateDefinition {
        TemplateDefinition {
            id: Some(id.to_string()),
            starts_with: Some(starts_with.to_string()),
            ends_with: Some(ends_with.to_string()),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: &str) -> TemplateDefinition {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> TemplateDefinition {
        self.tags = tags.iter().map(|tag| tag.to_string()).collect();
        self
    }
}

#[derive(Debug)]
enum Form {
    SingleLine { prefix: String },
    Multiline { start: String, end: String },
}

/// A template turned into a matcher. Built once at load time and shared by
/// every entry it produces.
#[derive(Debug)]
pub struct CompiledTemplate {
    id: String,
    label: Option<String>,
    tags: Vec<String>,
    matcher: Regex,
    field_names: Vec<String>,
    form: Form,
}

/// Pattern text for one template string, before anchoring.
struct Body {
    pattern: String,
    fields: Vec<String>,
    leading_literal: String,
}

impl CompiledTemplate {
    pub fn compile(definition: &TemplateDefinition) -> Result<CompiledTemplate, ValidationError> {
        let id = match definition.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(ValidationError::MissingId),
        };

        let (pattern, field_names, form) = match (
            definition.template.as_deref(),
            definition.starts_with.as_deref(),
            definition.ends_with.as_deref(),
        ) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(ValidationError::BothForms(id))
            }
            (None, None, None) => return Err(ValidationError::NoForm(id)),
            (None, Some(_), None) => {
                return Err(ValidationError::UnpairedMarker {
                    id,
                    present: "starts-with",
                    missing: "ends-with",
                })
            }
            (None, None, Some(_)) => {
                return Err(ValidationError::UnpairedMarker {
                    id,
                    present: "ends-with",
                    missing: "starts-with",
                })
            }
            (Some(template), None, None) => {
                let body = compile_body(template.trim());
                let pattern = format!("^{}$", body.pattern);
                let form = Form::SingleLine {
                    prefix: body.leading_literal.to_ascii_lowercase(),
                };
                (pattern, body.fields, form)
            }
            (None, Some(start), Some(end)) => {
                let start = compile_body(start.trim());
                let end = compile_body(end.trim());
                if start.leading_literal.trim().is_empty() {
                    return Err(ValidationError::MarkerWithoutLiteral {
                        id,
                        marker: "starts-with",
                    });
                }
                if end.leading_literal.trim().is_empty() {
                    return Err(ValidationError::MarkerWithoutLiteral {
                        id,
                        marker: "ends-with",
                    });
                }
                // The closing marker may sit anywhere on the last line, so
                // whatever precedes it is absorbed by the interior span.
                let pattern = format!("^{}\\n(?s:.*?){}$", start.pattern, end.pattern);
                let mut fields = start.fields;
                fields.extend(end.fields);
                let form = Form::Multiline {
                    start: start.leading_literal.to_ascii_lowercase(),
                    end: end.leading_literal.to_ascii_lowercase(),
                };
                (pattern, fields, form)
            }
        };

        let mut seen = Vec::with_capacity(field_names.len());
        for name in &field_names {
            if seen.contains(&name) {
                return Err(ValidationError::DuplicatePlaceholder {
                    id,
                    name: name.clone(),
                });
            }
            seen.push(name);
        }

        let matcher = Regex::new(&pattern)
            .map_err(|source| ValidationError::Pattern { id: id.clone(), source })?;

        let mut tags: Vec<String> = Vec::with_capacity(definition.tags.len());
        for tag in &definition.tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }

        Ok(CompiledTemplate {
            id,
            label: definition.label.clone(),
            tags,
            matcher,
            field_names,
            form,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Placeholder names in the order they appear in the template.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn is_multiline(&self) -> bool {
        matches!(self.form, Form::Multiline { .. })
    }

    pub fn pattern(&self) -> &str {
        self.matcher.as_str()
    }

    /// Cheap literal test run before the full pattern. It may accept lines
    /// the full pattern later rejects, never the other way around.
    pub fn pre_match(&self, line: &str) -> bool {
        match &self.form {
            Form::SingleLine { prefix } => starts_with_ignore_case(line, prefix),
            Form::Multiline { .. } => self.matches_start(line) || self.matches_end(line),
        }
    }

    pub fn matches_start(&self, line: &str) -> bool {
        match &self.form {
            Form::Multiline { start, .. } => starts_with_ignore_case(line, start),
            Form::SingleLine { .. } => false,
        }
    }

    pub fn matches_end(&self, line: &str) -> bool {
        match &self.form {
            Form::Multiline { end, .. } => line.to_ascii_lowercase().contains(end.as_str()),
            Form::SingleLine { .. } => false,
        }
    }

    /// Runs the full pattern. Multi-line templates expect the block's lines
    /// joined with `\n`.
    pub fn try_match(&self, text: &str) -> Option<HashMap<String, String>> {
        let caps = self.matcher.captures(text)?;
        let fields = self
            .field_names
            .iter()
            .map(|name| {
                let value = caps.name(name).map(|m| m.as_str()).unwrap_or_default();
                (name.clone(), value.to_string())
            })
            .collect();
        Some(fields)
    }
}

fn compile_body(template: &str) -> Body {
    let mut pattern = String::new();
    let mut fields = Vec::new();
    let mut leading_literal = None;
    let mut pos = 0;

    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let literal = &template[pos..whole.start()];
        if leading_literal.is_none() {
            leading_literal = Some(literal.to_string());
        }
        push_escaped(&mut pattern, literal);

        let before = template[..whole.start()].chars().next_back();
        let after = template[whole.end()..].chars().next();
        pattern.push_str("(?P<");
        pattern.push_str(name.as_str());
        pattern.push('>');
        pattern.push_str(capture_rule(before, after));
        pattern.push(')');
        fields.push(name.as_str().to_string());

        pos = whole.end();
    }
    push_escaped(&mut pattern, &template[pos..]);

    Body {
        pattern,
        fields,
        leading_literal: leading_literal.unwrap_or_else(|| template.to_string()),
    }
}

/// Picks the capture for a placeholder from the characters around it, so a
/// quoted or bracketed value stops at its closing delimiter instead of
/// running into the next field.
fn capture_rule(before: Option<char>, after: Option<char>) -> &'static str {
    match (before, after) {
        (Some('"'), Some('"')) => r#"[^"]+"#,
        (Some('\''), Some('\'')) => r"[^']+",
        (Some('['), Some(']')) => r"[^\]]+",
        (Some('{'), Some('}')) => r"[^}]+",
        _ => ".*?",
    }
}

// Spaces are kept as they are.
fn push_escaped(pattern: &mut String, literal: &str) {
    for c in literal.chars() {
        if is_special_for_re(c) {
            pattern.push('\\');
        }
        pattern.push(c);
    }
}

fn is_special_for_re(c: char) -> bool {
    match c {
        '.' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => true,
        _ => false,
    }
}

/// `prefix` must already be lowercase.
fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.len() >= prefix.len()
        && line.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}
