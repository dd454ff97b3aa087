use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::{
    application::services::renderer::{RenderContext, RenderedContent, TemplateRenderer},
    domain::{errors::RenderError, models::Template},
};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("placeholder pattern is valid"));

/// Substitutes `{{ path }}` placeholders.
///
/// Recognized paths:
/// - `subscriber.id`, `subscriber.uuid`, `subscriber.email`, `subscriber.name`,
///   `subscriber.status`
/// - `subscriber.attribs.<key>[.<key>...]`
/// - `tx.data.<key>[.<key>...]`
///
/// Missing attribute or data keys render as an empty string. Any other path
/// is a render error.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderRenderer;

impl PlaceholderRenderer {
    pub fn new() -> Self {
        Self
    }

    fn render_str(&self, source: &str, context: RenderContext<'_>) -> Result<String, RenderError> {
        let mut out = String::with_capacity(source.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(source) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let literal = &source[last..whole.start];
            if let Some(pos) = literal.find("{{") {
                return Err(RenderError::Unterminated(last + pos));
            }
            out.push_str(literal);

            let path = caps.get(1).map_or("", |m| m.as_str()).trim();
            out.push_str(&resolve(path, context)?);
            last = whole.end;
        }

        let rest = &source[last..];
        if let Some(pos) = rest.find("{{") {
            return Err(RenderError::Unterminated(last + pos));
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl TemplateRenderer for PlaceholderRenderer {
    fn render(
        &self,
        template: &Template,
        subject: Option<&str>,
        context: RenderContext<'_>,
    ) -> Result<RenderedContent, RenderError> {
        let subject = subject
            .filter(|s| !s.is_empty())
            .unwrap_or(&template.subject);

        Ok(RenderedContent {
            subject: self.render_str(subject, context)?,
            body: self.render_str(&template.body, context)?,
        })
    }
}

fn resolve(path: &str, context: RenderContext<'_>) -> Result<String, RenderError> {
    let unknown = || RenderError::UnknownVariable(path.to_string());
    let mut parts = path.split('.');

    match (parts.next(), parts.next()) {
        (Some("subscriber"), Some(field)) => {
            let sub = context.subscriber;
            let value = match field {
                "id" => sub.id.to_string(),
                "uuid" => sub.uuid.to_string(),
                "email" => sub.email.clone(),
                "name" => sub.name.clone(),
                "status" => sub.status.as_str().to_string(),
                "attribs" => {
                    let root = sub.attribs.get(parts.next().ok_or_else(unknown)?);
                    lookup(root, parts)
                }
                _ => return Err(unknown()),
            };
            Ok(value)
        }
        (Some("tx"), Some("data")) => {
            let root = context.data.get(parts.next().ok_or_else(unknown)?);
            Ok(lookup(root, parts))
        }
        _ => Err(unknown()),
    }
}

fn lookup<'a>(mut value: Option<&Value>, keys: impl Iterator<Item = &'a str>) -> String {
    for key in keys {
        value = value.and_then(|v| v.get(key));
    }
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
