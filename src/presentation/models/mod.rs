use poem_openapi::Enum;

use crate::domain::models::ContentType;

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum ContentTypeKind {
    #[default]
    #[oai(rename = "html")]
    Html,
    #[oai(rename = "markdown")]
    Markdown,
    #[oai(rename = "plain")]
    Plain,
}

impl From<ContentTypeKind> for ContentType {
    fn from(value: ContentTypeKind) -> Self {
        match value {
            ContentTypeKind::Html => ContentType::Html,
            ContentTypeKind::Markdown => ContentType::Markdown,
            ContentTypeKind::Plain => ContentType::Plain,
        }
    }
}
