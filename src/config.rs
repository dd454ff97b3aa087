use std::env::var;

use dotenvy::dotenv;

use crate::domain::models::EMAIL_MESSENGER;

pub struct Config {
    pub port: u16,
    pub scheme: String,
    pub host: String,
    pub database_url: String,
    pub nats_url: String,
    pub nats_stream: String,
    pub nats_subject_prefix: String,
    /// Messengers that get a sink. `email` is always included.
    pub messengers: Vec<String>,
    pub dispatch: DispatchConfig,
}

/// Defaults applied to every transactional send.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub default_from_email: String,
    pub default_messenger: String,
    pub max_concurrent_pushes: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_from_email: "noreply@localhost".to_string(),
            default_messenger: EMAIL_MESSENGER.to_string(),
            max_concurrent_pushes: 16,
        }
    }
}

impl Config {
    pub fn try_parse() -> Result<Config, &'static str> {
        let _ = dotenv();

        let mut messengers = vec![EMAIL_MESSENGER.to_string()];
        if let Ok(list) = var("MESSENGERS") {
            for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                if !messengers.iter().any(|m| m == name) {
                    messengers.push(name.to_string());
                }
            }
        }

        let max_concurrent_pushes = match var("MAX_CONCURRENT_PUSHES") {
            Ok(value) => value
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or("An error occured while parsing MAX_CONCURRENT_PUSHES env param")?,
            Err(_) => DispatchConfig::default().max_concurrent_pushes,
        };

        Ok(Config {
            port: var("PORT")
                .map_err(|_| "An error occured while getting PORT env param")?
                .parse::<u16>()
                .map_err(|_| "An error occured while parsing PORT env param")?,
            scheme: var("SCHEME").map_err(|_| "An error occured while getting SCHEME env param")?,
            host: var("HOST").map_err(|_| "An error occured while getting HOST env param")?,
            database_url: var("DATABASE_URL")
                .map_err(|_| "An error occured while getting DATABASE_URL env param")?,
            nats_url: var("NATS_URL")
                .map_err(|_| "An error occured while getting NATS_URL env param")?,
            nats_stream: var("NATS_STREAM").unwrap_or_else(|_| "TX_MESSAGES".to_string()),
            nats_subject_prefix: var("NATS_SUBJECT_PREFIX").unwrap_or_else(|_| "tx".to_string()),
            messengers,
            dispatch: DispatchConfig {
                default_from_email: var("FROM_EMAIL")
                    .map_err(|_| "An error occured while getting FROM_EMAIL env param")?,
                default_messenger: EMAIL_MESSENGER.to_string(),
                max_concurrent_pushes,
            },
        })
    }
}
