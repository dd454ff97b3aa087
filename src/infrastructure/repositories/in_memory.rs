use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    models::{Subscriber, SubscriberList, SubscriberStatus, Template},
    repositories::{ListRepository, SubscriberRepository, TemplateRepository},
};

#[derive(Default)]
pub struct InMemorySubscriberRepository {
    subscribers: Arc<RwLock<BTreeMap<i64, Subscriber>>>,
    memberships: Arc<RwLock<HashMap<i64, Vec<i64>>>>,
    failure: Arc<RwLock<Option<String>>>,
}

impl InMemorySubscriberRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, subscriber: Subscriber) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(subscriber.id, subscriber);
    }

    /// Creates an enabled subscriber with the given id and email.
    pub async fn add(&self, id: i64, email: &str, name: &str) -> Subscriber {
        let now = Utc::now();
        let subscriber = Subscriber {
            id,
            uuid: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            attribs: Default::default(),
            status: SubscriberStatus::Enabled,
            created_at: now,
            updated_at: now,
        };
        self.insert(subscriber.clone()).await;
        subscriber
    }

    pub async fn subscribe(&self, list_id: i64, subscriber_id: i64) {
        let mut memberships = self.memberships.write().await;
        memberships.entry(list_id).or_default().push(subscriber_id);
    }

    /// Makes every subsequent query fail with `reason`.
    pub async fn fail_with(&self, reason: &str) {
        *self.failure.write().await = Some(reason.to_string());
    }

    async fn check_failure(&self) -> anyhow::Result<()> {
        match self.failure.read().await.as_deref() {
            Some(reason) => anyhow::bail!("{reason}"),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SubscriberRepository for InMemorySubscriberRepository {
    async fn query_by_list_ids(&self, list_ids: &[i64]) -> anyhow::Result<Vec<Subscriber>> {
        self.check_failure().await?;
        let memberships = self.memberships.read().await;
        let subscribers = self.subscribers.read().await;
        // BTreeMap iteration keeps id ascending; a subscriber on several
        // of the lists is still returned once, as the SQL query would.
        Ok(subscribers
            .values()
            .filter(|s| {
                list_ids.iter().any(|list_id| {
                    memberships
                        .get(list_id)
                        .is_some_and(|members| members.contains(&s.id))
                })
            })
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Subscriber>> {
        self.check_failure().await?;
        let subscribers = self.subscribers.read().await;
        Ok(subscribers.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<Subscriber>> {
        self.check_failure().await?;
        let subscribers = self.subscribers.read().await;
        Ok(subscribers
            .values()
            .find(|s| s.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryListRepository {
    lists: Arc<RwLock<Vec<SubscriberList>>>,
    failure: Arc<RwLock<Option<String>>>,
}

impl InMemoryListRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, id: i64, name: &str) -> SubscriberList {
        let now = Utc::now();
        let list = SubscriberList {
            id,
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.lists.write().await.push(list.clone());
        list
    }

    pub async fn fail_with(&self, reason: &str) {
        *self.failure.write().await = Some(reason.to_string());
    }
}

#[async_trait]
impl ListRepository for InMemoryListRepository {
    async fn query_by_name(&self, name: &str) -> anyhow::Result<Vec<SubscriberList>> {
        if let Some(reason) = self.failure.read().await.as_deref() {
            anyhow::bail!("{reason}");
        }
        let lists = self.lists.read().await;
        let mut matches: Vec<SubscriberList> =
            lists.iter().filter(|l| l.name == name).cloned().collect();
        matches.sort_by_key(|l| l.id);
        Ok(matches)
    }
}

#[derive(Default)]
pub struct InMemoryTemplateRepository {
    templates: Arc<RwLock<HashMap<i64, Template>>>,
}

impl InMemoryTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, id: i64, subject: &str, body: &str) -> Template {
        let template = Template {
            id,
            name: format!("template-{id}"),
            subject: subject.to_string(),
            body: body.to_string(),
        };
        self.templates.write().await.insert(id, template.clone());
        template
    }
}

#[async_trait]
impl TemplateRepository for InMemoryTemplateRepository {
    async fn get(&self, id: i64) -> anyhow::Result<Option<Template>> {
        let templates = self.templates.read().await;
        Ok(templates.get(&id).cloned())
    }
}
