use serde::{Deserialize, Serialize};

/// A transactional template. Both `subject` and `body` may contain
/// placeholders that are resolved per subscriber at render time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    pub name: String,
    pub subject: String,
    pub body: String,
}
