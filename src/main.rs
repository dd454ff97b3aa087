use std::{io::Error, sync::Arc};

use poem::{Route, Server, listener::TcpListener};
use poem_openapi::OpenApiService;
use sqlx::postgres::PgPoolOptions;
use tokio::main;
use tracing::info;

use txdispatch::{
    application::{
        handlers::{dispatch_engine::DispatchEngine, recipient_resolver::RecipientResolver},
        services::messenger::MessengerGateway,
        usecases::send_tx_message::SendTxMessageUseCase,
    },
    config::Config,
    infrastructure::{
        messaging::jetstream::{JetstreamConfig, JetstreamSink},
        rendering::placeholder::PlaceholderRenderer,
        repositories::postgres::{
            PostgresListRepository, PostgresSubscriberRepository, PostgresTemplateRepository,
        },
    },
    logging,
    presentation::http::endpoints::{
        health::HealthEndpoints,
        root::ApiState,
        tx::TxEndpoints,
    },
};

#[main]
async fn main() -> Result<(), Error> {
    logging::init();

    let config = Config::try_parse().map_err(Error::other)?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(Error::other)?;
    sqlx::migrate!().run(&pool).await.map_err(Error::other)?;

    let sinks = JetstreamSink::connect(
        &JetstreamConfig {
            url: config.nats_url.clone(),
            stream: config.nats_stream.clone(),
            subject_prefix: config.nats_subject_prefix.clone(),
        },
        &config.messengers,
    )
    .await
    .map_err(Error::other)?;
    let gateway = Arc::new(MessengerGateway::new(sinks));

    let subscribers = PostgresSubscriberRepository::new(pool.clone());
    let lists = PostgresListRepository::new(pool.clone());
    let templates = PostgresTemplateRepository::new(pool);

    let engine = DispatchEngine::new(
        templates.clone(),
        Arc::new(PlaceholderRenderer::new()),
        gateway.clone(),
        config.dispatch.max_concurrent_pushes,
    );
    let send_tx_usecase = Arc::new(SendTxMessageUseCase::new(
        templates,
        RecipientResolver::new(subscribers, lists),
        engine,
        gateway,
        config.dispatch.clone(),
    ));

    let state = Arc::new(ApiState { send_tx_usecase });

    let server_url = format!("{}://{}:{}", config.scheme, config.host, config.port);
    info!(%server_url, "starting server");

    let api_service = OpenApiService::new(
        (HealthEndpoints, TxEndpoints::new(state)),
        "Transactional Dispatch API",
        "0.1.0",
    )
    .server(format!("{}/api", server_url));
    let ui = api_service.swagger_ui();
    let app = Route::new().nest("/api", api_service).nest("/", ui);

    Server::new(TcpListener::bind(format!("0.0.0.0:{}", config.port)))
        .run(app)
        .await
}
