use std::sync::Arc;

use tracing::debug;

use crate::domain::{
    errors::TxError,
    models::Subscriber,
    repositories::{ListRepository, SubscriberRepository},
    value_objects::RecipientSpec,
};

/// Subscribers produced by one resolution call, in selection order, plus a
/// description of every selector that matched nothing.
#[derive(Debug, Default, Clone)]
pub struct Resolution {
    pub recipients: Vec<Subscriber>,
    pub not_found: Vec<String>,
}

/// Turns a recipient spec into concrete subscribers. Repeated selectors are
/// not collapsed: the same subscriber selected twice is returned twice.
pub struct RecipientResolver {
    subscribers: Arc<dyn SubscriberRepository>,
    lists: Arc<dyn ListRepository>,
}

impl RecipientResolver {
    pub fn new(subscribers: Arc<dyn SubscriberRepository>, lists: Arc<dyn ListRepository>) -> Self {
        Self { subscribers, lists }
    }

    pub async fn resolve(&self, spec: &RecipientSpec) -> Result<Resolution, TxError> {
        let resolution = match spec {
            RecipientSpec::ListIds(ids) => self.by_list_ids(ids).await?,
            RecipientSpec::ListNames(names) => self.by_list_names(names).await?,
            RecipientSpec::SubscriberIds(ids) => self.by_subscriber_ids(ids).await?,
            RecipientSpec::Emails(emails) => self.by_emails(emails).await?,
        };

        debug!(
            selector = spec.kind(),
            recipients = resolution.recipients.len(),
            not_found = resolution.not_found.len(),
            "resolved recipients"
        );
        Ok(resolution)
    }

    async fn by_list_ids(&self, ids: &[i64]) -> Result<Resolution, TxError> {
        let recipients = self
            .subscribers
            .query_by_list_ids(ids)
            .await
            .map_err(|e| TxError::resolution(format!("list {ids:?} subscribers"), e))?;

        Ok(Resolution {
            recipients,
            not_found: Vec::new(),
        })
    }

    async fn by_list_names(&self, names: &[String]) -> Result<Resolution, TxError> {
        let mut resolution = Resolution::default();

        for name in names {
            let lists = self
                .lists
                .query_by_name(name)
                .await
                .map_err(|e| TxError::resolution(format!("list '{name}'"), e))?;

            let Some(list) = lists.first() else {
                resolution.not_found.push(format!("List '{name}' not found"));
                continue;
            };

            let subscribers = self
                .subscribers
                .query_by_list_ids(&[list.id])
                .await
                .map_err(|e| TxError::resolution(format!("list '{name}' subscribers"), e))?;
            resolution.recipients.extend(subscribers);
        }

        Ok(resolution)
    }

    async fn by_subscriber_ids(&self, ids: &[i64]) -> Result<Resolution, TxError> {
        let mut resolution = Resolution::default();

        for &id in ids {
            match self.subscribers.get_by_id(id).await {
                Ok(Some(subscriber)) => resolution.recipients.push(subscriber),
                Ok(None) => resolution
                    .not_found
                    .push(format!("Subscriber ID {id} not found")),
                Err(e) => return Err(TxError::resolution(format!("subscriber {id}"), e)),
            }
        }

        Ok(resolution)
    }

    async fn by_emails(&self, emails: &[String]) -> Result<Resolution, TxError> {
        let mut resolution = Resolution::default();

        for email in emails {
            match self.subscribers.get_by_email(email).await {
                Ok(Some(subscriber)) => resolution.recipients.push(subscriber),
                Ok(None) => resolution
                    .not_found
                    .push(format!("Subscriber ({email}) not found")),
                Err(e) => return Err(TxError::resolution(format!("subscriber ({email})"), e)),
            }
        }

        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::in_memory::{
        InMemoryListRepository, InMemorySubscriberRepository,
    };

    async fn fixture() -> (
        Arc<InMemorySubscriberRepository>,
        Arc<InMemoryListRepository>,
        RecipientResolver,
    ) {
        let subscribers = Arc::new(InMemorySubscriberRepository::new());
        let lists = Arc::new(InMemoryListRepository::new());

        subscribers.add(3, "c@example.com", "C").await;
        subscribers.add(1, "a@example.com", "A").await;
        subscribers.add(2, "b@example.com", "B").await;

        lists.add(10, "customers").await;
        lists.add(11, "staff").await;
        lists.add(12, "customers").await;
        subscribers.subscribe(10, 3).await;
        subscribers.subscribe(10, 1).await;
        subscribers.subscribe(11, 2).await;
        subscribers.subscribe(12, 2).await;

        let resolver = RecipientResolver::new(subscribers.clone(), lists.clone());
        (subscribers, lists, resolver)
    }

    fn ids(resolution: &Resolution) -> Vec<i64> {
        resolution.recipients.iter().map(|s| s.id).collect()
    }

    #[tokio::test]
    async fn list_ids_are_ordered_by_subscriber_id() {
        let (_, _, resolver) = fixture().await;

        let resolution = resolver
            .resolve(&RecipientSpec::ListIds(vec![10, 11]))
            .await
            .unwrap();

        assert_eq!(ids(&resolution), vec![1, 2, 3]);
        assert!(resolution.not_found.is_empty());
    }

    #[tokio::test]
    async fn list_id_query_failure_is_fatal() {
        let (subscribers, _, resolver) = fixture().await;
        subscribers.fail_with("connection reset").await;

        let err = resolver
            .resolve(&RecipientSpec::ListIds(vec![10]))
            .await
            .unwrap_err();

        assert!(matches!(err, TxError::Resolution { .. }));
    }

    #[tokio::test]
    async fn unknown_list_name_is_a_soft_miss() {
        let (_, _, resolver) = fixture().await;

        let resolution = resolver
            .resolve(&RecipientSpec::ListNames(vec![
                "ghosts".to_string(),
                "staff".to_string(),
            ]))
            .await
            .unwrap();

        assert_eq!(ids(&resolution), vec![2]);
        assert_eq!(resolution.not_found, vec!["List 'ghosts' not found"]);
    }

    #[tokio::test]
    async fn only_the_first_matching_list_is_used() {
        let (_, _, resolver) = fixture().await;

        let resolution = resolver
            .resolve(&RecipientSpec::ListNames(vec!["customers".to_string()]))
            .await
            .unwrap();

        // list 12 is also named "customers" but only list 10 is expanded
        assert_eq!(ids(&resolution), vec![1, 3]);
    }

    #[tokio::test]
    async fn list_name_query_failure_is_fatal() {
        let (_, lists, resolver) = fixture().await;
        lists.fail_with("timeout").await;

        let err = resolver
            .resolve(&RecipientSpec::ListNames(vec!["staff".to_string()]))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "error fetching list 'staff'");
    }

    #[tokio::test]
    async fn subscriber_ids_keep_duplicates_and_record_misses() {
        let (_, _, resolver) = fixture().await;

        let resolution = resolver
            .resolve(&RecipientSpec::SubscriberIds(vec![2, 99, 2]))
            .await
            .unwrap();

        assert_eq!(ids(&resolution), vec![2, 2]);
        assert_eq!(resolution.not_found, vec!["Subscriber ID 99 not found"]);
    }

    #[tokio::test]
    async fn emails_record_misses() {
        let (_, _, resolver) = fixture().await;

        let resolution = resolver
            .resolve(&RecipientSpec::Emails(vec![
                "a@example.com".to_string(),
                "nobody@example.com".to_string(),
            ]))
            .await
            .unwrap();

        assert_eq!(ids(&resolution), vec![1]);
        assert_eq!(
            resolution.not_found,
            vec!["Subscriber (nobody@example.com) not found"]
        );
    }

    #[tokio::test]
    async fn subscriber_lookup_failure_is_fatal() {
        let (subscribers, _, resolver) = fixture().await;
        subscribers.fail_with("pool exhausted").await;

        let result = resolver
            .resolve(&RecipientSpec::Emails(vec!["a@example.com".to_string()]))
            .await;

        assert!(matches!(result, Err(TxError::Resolution { .. })));
    }
}
