use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{FromRow, Pool, Postgres, types::Json};
use uuid::Uuid;

use crate::domain::{
    models::{Subscriber, SubscriberList, SubscriberStatus, Template},
    repositories::{ListRepository, SubscriberRepository, TemplateRepository},
};

pub type PgPool = Pool<Postgres>;

const SUBSCRIBER_COLUMNS: &str =
    "subscribers.id, subscribers.uuid, subscribers.email, subscribers.name, subscribers.attribs, \
     subscribers.status, subscribers.created_at, subscribers.updated_at";

#[derive(Clone)]
pub struct PostgresSubscriberRepository {
    pool: PgPool,
}

impl PostgresSubscriberRepository {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl SubscriberRepository for PostgresSubscriberRepository {
    async fn query_by_list_ids(&self, list_ids: &[i64]) -> anyhow::Result<Vec<Subscriber>> {
        let query = format!(
            r#"
            SELECT {SUBSCRIBER_COLUMNS}
            FROM subscribers
            WHERE subscribers.id IN (
                SELECT subscriber_id FROM subscriber_lists WHERE list_id = ANY($1)
            )
            ORDER BY subscribers.id ASC
            "#
        );
        let rows = sqlx::query_as::<_, SubscriberRecord>(&query)
            .bind(list_ids)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(|record| record.try_into()).collect()
    }

    async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Subscriber>> {
        let query = format!("SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE id = $1");
        let record = sqlx::query_as::<_, SubscriberRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        record.map(|record| record.try_into()).transpose()
    }

    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<Subscriber>> {
        let query =
            format!("SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE LOWER(email) = LOWER($1)");
        let record = sqlx::query_as::<_, SubscriberRecord>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        record.map(|record| record.try_into()).transpose()
    }
}

#[derive(Clone)]
pub struct PostgresListRepository {
    pool: PgPool,
}

impl PostgresListRepository {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl ListRepository for PostgresListRepository {
    async fn query_by_name(&self, name: &str) -> anyhow::Result<Vec<SubscriberList>> {
        let rows = sqlx::query_as::<_, ListRecord>(
            r#"
            SELECT id, uuid, name, created_at, updated_at
            FROM lists
            WHERE name = $1
            ORDER BY name ASC, id ASC
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SubscriberList::from).collect())
    }
}

#[derive(Clone)]
pub struct PostgresTemplateRepository {
    pool: PgPool,
}

impl PostgresTemplateRepository {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl TemplateRepository for PostgresTemplateRepository {
    async fn get(&self, id: i64) -> anyhow::Result<Option<Template>> {
        let record = sqlx::query_as::<_, TemplateRecord>(
            r#"SELECT id, name, subject, body FROM templates WHERE id = $1 AND type = 'tx'"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record.map(Template::from))
    }
}

#[derive(FromRow)]
struct SubscriberRecord {
    id: i64,
    uuid: Uuid,
    email: String,
    name: String,
    attribs: Json<Map<String, Value>>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriberRecord> for Subscriber {
    type Error = anyhow::Error;

    fn try_from(value: SubscriberRecord) -> Result<Self, Self::Error> {
        let status = value.status.parse::<SubscriberStatus>()?;
        Ok(Self {
            id: value.id,
            uuid: value.uuid,
            email: value.email,
            name: value.name,
            attribs: value.attribs.0,
            status,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ListRecord {
    id: i64,
    uuid: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ListRecord> for SubscriberList {
    fn from(value: ListRecord) -> Self {
        Self {
            id: value.id,
            uuid: value.uuid,
            name: value.name,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TemplateRecord {
    id: i64,
    name: String,
    subject: String,
    body: String,
}

impl From<TemplateRecord> for Template {
    fn from(value: TemplateRecord) -> Self {
        Self {
            id: value.id,
            name: value.name,
            subject: value.subject,
            body: value.body,
        }
    }
}
