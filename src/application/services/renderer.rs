use serde_json::Value;

use crate::domain::{
    errors::RenderError,
    models::{Subscriber, Template},
};

/// Variables available to a template while rendering for one subscriber.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub subscriber: &'a Subscriber,
    pub data: &'a Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    pub subject: String,
    pub body: String,
}

pub trait TemplateRenderer: Send + Sync {
    /// Renders the template body and subject. `subject` replaces the
    /// template's own subject when present; it is rendered the same way.
    fn render(
        &self,
        template: &Template,
        subject: Option<&str>,
        context: RenderContext<'_>,
    ) -> Result<RenderedContent, RenderError>;
}
