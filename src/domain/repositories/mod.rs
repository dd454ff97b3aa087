use async_trait::async_trait;

use crate::domain::models::{Subscriber, SubscriberList, Template};

/// Subscriber lookups. `Ok(None)` means the subscriber does not exist and is
/// distinct from a query failure.
#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    /// Subscribers of the given lists in any subscription status, ordered by
    /// subscriber id ascending.
    async fn query_by_list_ids(&self, list_ids: &[i64]) -> anyhow::Result<Vec<Subscriber>>;
    async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Subscriber>>;
    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<Subscriber>>;
}

#[async_trait]
pub trait ListRepository: Send + Sync {
    /// Lists whose name matches exactly, ordered by name then id.
    async fn query_by_name(&self, name: &str) -> anyhow::Result<Vec<SubscriberList>>;
}

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn get(&self, id: i64) -> anyhow::Result<Option<Template>>;
}
