use std::sync::Arc;

use tokio::{
    sync::{Semaphore, watch},
    task::JoinSet,
};
use tracing::{debug, error, info, warn};

use crate::{
    application::{
        handlers::{
            channel_classifier::partition, message_composer::MessageComposer,
            recipient_resolver::Resolution,
        },
        services::{
            messenger::MessengerGateway,
            renderer::{RenderContext, TemplateRenderer},
        },
        usecases::validate_tx_message::ValidatedTx,
    },
    domain::{
        errors::TxError,
        models::{OutboundMessage, Subscriber, Template, TxChannel},
        repositories::TemplateRepository,
    },
};

/// How a dispatch call produces its messages. Chosen once per call.
#[derive(Debug, Clone)]
pub enum DispatchMode {
    /// One template, fetched up front, rendered per recipient and sent
    /// through every messenger.
    Legacy {
        template: Template,
        messengers: Vec<String>,
    },
    /// Per-channel templates fetched per send unit.
    MultiChannel { channels: Vec<TxChannel> },
}

/// A single independent piece of work. Each unit renders at most once.
#[derive(Debug, Clone, Copy)]
enum SendUnit<'a> {
    Legacy {
        recipient: &'a Subscriber,
        template: &'a Template,
        messengers: &'a [String],
    },
    /// Sent once; `context` is the first resolved recipient and only
    /// supplies template variables and the nominal `to` address.
    Broadcast {
        channel: &'a TxChannel,
        context: &'a Subscriber,
    },
    Scoped {
        recipient: &'a Subscriber,
        channel: &'a TxChannel,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    pub subscriber_id: i64,
    pub messenger: String,
    pub reason: String,
}

/// What one dispatch call did. Only `not_found` is ever reported to the
/// caller as an error; the rest is informational.
#[derive(Debug, Default, Clone)]
pub struct DispatchOutcome {
    pub not_found: Vec<String>,
    pub sent: usize,
    /// Units dropped because of a template or render problem, or cancellation.
    pub skipped: usize,
    pub failed: Vec<SendFailure>,
}

impl DispatchOutcome {
    pub fn into_result(self) -> Result<DispatchOutcome, TxError> {
        if self.not_found.is_empty() {
            Ok(self)
        } else {
            Err(TxError::RecipientsNotFound(self.not_found.join("; ")))
        }
    }
}

pub struct DispatchEngine {
    templates: Arc<dyn TemplateRepository>,
    renderer: Arc<dyn TemplateRenderer>,
    gateway: Arc<MessengerGateway>,
    max_concurrent_pushes: usize,
}

impl DispatchEngine {
    pub fn new(
        templates: Arc<dyn TemplateRepository>,
        renderer: Arc<dyn TemplateRenderer>,
        gateway: Arc<MessengerGateway>,
        max_concurrent_pushes: usize,
    ) -> Self {
        Self {
            templates,
            renderer,
            gateway,
            max_concurrent_pushes: max_concurrent_pushes.max(1),
        }
    }

    pub async fn dispatch(
        &self,
        tx: &ValidatedTx,
        mode: &DispatchMode,
        resolution: Resolution,
    ) -> Result<DispatchOutcome, TxError> {
        let (_never_cancelled, cancel) = watch::channel(false);
        self.dispatch_until_cancelled(tx, mode, resolution, cancel)
            .await
    }

    /// Sends every unit it can. Once `cancel` flips to `true` no new units
    /// are started; pushes already in flight are awaited.
    ///
    /// Returns an error only when a legacy render fails, which stops the
    /// remaining units.
    pub async fn dispatch_until_cancelled(
        &self,
        tx: &ValidatedTx,
        mode: &DispatchMode,
        resolution: Resolution,
        cancel: watch::Receiver<bool>,
    ) -> Result<DispatchOutcome, TxError> {
        let Resolution {
            recipients,
            not_found,
        } = resolution;
        let mut outcome = DispatchOutcome {
            not_found,
            ..Default::default()
        };

        let composer = MessageComposer::new(tx);
        let units = plan(mode, &recipients);
        let total = units.len();
        let mut pushes = PushQueue::new(self.gateway.clone(), self.max_concurrent_pushes);

        for (index, unit) in units.into_iter().enumerate() {
            if *cancel.borrow() {
                warn!(remaining = total - index, "dispatch cancelled");
                outcome.skipped += total - index;
                break;
            }

            match self.prepare(unit, tx, &composer).await {
                Ok(messages) if messages.is_empty() => outcome.skipped += 1,
                Ok(messages) => {
                    for message in messages {
                        pushes.push(message, &mut outcome).await;
                    }
                }
                Err(err) => {
                    pushes.drain(&mut outcome).await;
                    return Err(err);
                }
            }
        }

        pushes.drain(&mut outcome).await;

        info!(
            recipients = recipients.len(),
            sent = outcome.sent,
            failed = outcome.failed.len(),
            skipped = outcome.skipped,
            not_found = outcome.not_found.len(),
            "transactional dispatch finished"
        );
        Ok(outcome)
    }

    async fn prepare(
        &self,
        unit: SendUnit<'_>,
        tx: &ValidatedTx,
        composer: &MessageComposer<'_>,
    ) -> Result<Vec<OutboundMessage>, TxError> {
        match unit {
            SendUnit::Legacy {
                recipient,
                template,
                messengers,
            } => {
                let context = RenderContext {
                    subscriber: recipient,
                    data: &tx.data,
                };
                let rendered = self
                    .renderer
                    .render(template, tx.subject.as_deref(), context)
                    .map_err(|source| TxError::Render {
                        subscriber_id: recipient.id,
                        source,
                    })?;

                Ok(messengers
                    .iter()
                    .map(|messenger| composer.compose(rendered.clone(), recipient, messenger, None))
                    .collect())
            }
            SendUnit::Broadcast { channel, context } => Ok(self
                .channel_message(channel, context, tx, composer)
                .await
                .into_iter()
                .collect()),
            SendUnit::Scoped { recipient, channel } => Ok(self
                .channel_message(channel, recipient, tx, composer)
                .await
                .into_iter()
                .collect()),
        }
    }

    /// Renders one channel for one subscriber. Every failure here is logged
    /// and yields `None`; it never stops the dispatch.
    async fn channel_message(
        &self,
        channel: &TxChannel,
        subscriber: &Subscriber,
        tx: &ValidatedTx,
        composer: &MessageComposer<'_>,
    ) -> Option<OutboundMessage> {
        let template = match self.templates.get(channel.template_id).await {
            Ok(Some(template)) => template,
            Ok(None) => {
                warn!(
                    template_id = channel.template_id,
                    channel = %channel.channel,
                    "template not found for channel"
                );
                return None;
            }
            Err(err) => {
                warn!(
                    template_id = channel.template_id,
                    channel = %channel.channel,
                    error = %err,
                    "error getting template for channel"
                );
                return None;
            }
        };

        let context = RenderContext {
            subscriber,
            data: &tx.data,
        };
        let rendered = match self
            .renderer
            .render(&template, tx.subject.as_deref(), context)
        {
            Ok(rendered) => rendered,
            Err(err) => {
                warn!(
                    template_id = channel.template_id,
                    channel = %channel.channel,
                    subscriber_id = subscriber.id,
                    error = %err,
                    "error rendering template for channel"
                );
                return None;
            }
        };

        Some(composer.compose(
            rendered,
            subscriber,
            &channel.channel,
            channel.content.as_deref(),
        ))
    }
}

/// Expands a mode into send units. Broadcast channels come first, then each
/// recipient with every subscriber-scoped channel in turn.
fn plan<'a>(mode: &'a DispatchMode, recipients: &'a [Subscriber]) -> Vec<SendUnit<'a>> {
    match mode {
        DispatchMode::Legacy {
            template,
            messengers,
        } => recipients
            .iter()
            .map(|recipient| SendUnit::Legacy {
                recipient,
                template,
                messengers,
            })
            .collect(),
        DispatchMode::MultiChannel { channels } => {
            let channels = partition(channels);
            let mut units = Vec::new();

            match recipients.first() {
                Some(context) => units.extend(
                    channels
                        .broadcast
                        .iter()
                        .map(|&channel| SendUnit::Broadcast { channel, context }),
                ),
                None if !channels.broadcast.is_empty() => {
                    debug!(
                        channels = channels.broadcast.len(),
                        "no recipients resolved, skipping broadcast channels"
                    );
                }
                None => {}
            }

            for recipient in recipients {
                units.extend(
                    channels
                        .subscriber_scoped
                        .iter()
                        .map(|&channel| SendUnit::Scoped { recipient, channel }),
                );
            }
            units
        }
    }
}

enum PushResult {
    Sent,
    Failed(SendFailure),
}

/// Pushes messages on background tasks, at most `limit` at a time. Results
/// are folded into the outcome by the dispatching task only.
struct PushQueue {
    gateway: Arc<MessengerGateway>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<PushResult>,
}

impl PushQueue {
    fn new(gateway: Arc<MessengerGateway>, limit: usize) -> Self {
        Self {
            gateway,
            permits: Arc::new(Semaphore::new(limit)),
            tasks: JoinSet::new(),
        }
    }

    async fn push(&mut self, message: OutboundMessage, outcome: &mut DispatchOutcome) {
        // The semaphore is never closed, so a permit is always granted.
        let permit = self.permits.clone().acquire_owned().await.ok();
        let gateway = self.gateway.clone();

        self.tasks.spawn(async move {
            let _permit = permit;
            let subscriber_id = message.subscriber.id;
            let messenger = message.messenger.clone();
            let subject = message.subject.clone();

            match gateway.push(message).await {
                Ok(()) => PushResult::Sent,
                Err(err) => {
                    error!(
                        subscriber_id,
                        messenger = %messenger,
                        subject = %subject,
                        error = %err,
                        "error sending message"
                    );
                    PushResult::Failed(SendFailure {
                        subscriber_id,
                        messenger,
                        reason: err.to_string(),
                    })
                }
            }
        });

        while let Some(joined) = self.tasks.try_join_next() {
            record(joined, outcome);
        }
    }

    async fn drain(&mut self, outcome: &mut DispatchOutcome) {
        while let Some(joined) = self.tasks.join_next().await {
            record(joined, outcome);
        }
    }
}

/// Issued pushes outlive the dispatch: when the dispatching future is
/// dropped mid-flight the tasks are detached instead of aborted.
impl Drop for PushQueue {
    fn drop(&mut self) {
        self.tasks.detach_all();
    }
}

fn record(joined: Result<PushResult, tokio::task::JoinError>, outcome: &mut DispatchOutcome) {
    match joined {
        Ok(PushResult::Sent) => outcome.sent += 1,
        Ok(PushResult::Failed(failure)) => outcome.failed.push(failure),
        Err(err) => {
            error!(error = %err, "push task aborted");
            outcome.failed.push(SendFailure {
                subscriber_id: 0,
                messenger: String::new(),
                reason: err.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        application::{
            services::{messenger::MessageSink, renderer::RenderedContent},
            usecases::validate_tx_message::Delivery,
        },
        domain::{errors::RenderError, models::ContentType, value_objects::RecipientSpec},
        infrastructure::{
            messaging::in_memory::RecordingSink,
            repositories::in_memory::{InMemorySubscriberRepository, InMemoryTemplateRepository},
            rendering::placeholder::PlaceholderRenderer,
        },
    };

    struct Harness {
        engine: DispatchEngine,
        templates: Arc<InMemoryTemplateRepository>,
        email: Arc<RecordingSink>,
        sms: Arc<RecordingSink>,
        webhook: Arc<RecordingSink>,
        recipients: Vec<Subscriber>,
    }

    async fn harness(recipient_count: i64) -> Harness {
        let templates = Arc::new(InMemoryTemplateRepository::new());
        templates
            .add(1, "Hello {{ subscriber.name }}", "Body for {{ subscriber.email }}")
            .await;
        templates.add(2, "Hook", "{\"first\":\"{{ subscriber.email }}\"}").await;
        templates.add(3, "Broken", "{{ nope }}").await;

        let subscribers = InMemorySubscriberRepository::new();
        let mut recipients = Vec::new();
        for id in 1..=recipient_count {
            recipients.push(
                subscribers
                    .add(id, &format!("user{id}@example.com"), &format!("User {id}"))
                    .await,
            );
        }

        let email = RecordingSink::new("email");
        let sms = RecordingSink::new("sms");
        let webhook = RecordingSink::new("webhook");
        let gateway = MessengerGateway::new(vec![
            email.clone() as Arc<dyn MessageSink>,
            sms.clone() as Arc<dyn MessageSink>,
            webhook.clone() as Arc<dyn MessageSink>,
        ]);

        let engine = DispatchEngine::new(
            templates.clone(),
            Arc::new(PlaceholderRenderer::new()),
            Arc::new(gateway),
            4,
        );

        Harness {
            engine,
            templates,
            email,
            sms,
            webhook,
            recipients,
        }
    }

    fn tx(delivery: Delivery) -> ValidatedTx {
        ValidatedTx {
            recipients: RecipientSpec::SubscriberIds(vec![1]),
            delivery,
            from_email: "shop@example.com".to_string(),
            subject: None,
            content_type: ContentType::Html,
            headers: Vec::new(),
            attachments: Vec::new(),
            data: json!({}),
        }
    }

    fn legacy_tx() -> ValidatedTx {
        tx(Delivery::Legacy {
            template_id: 1,
            messengers: vec!["email".to_string()],
        })
    }

    fn resolution(recipients: &[Subscriber]) -> Resolution {
        Resolution {
            recipients: recipients.to_vec(),
            not_found: Vec::new(),
        }
    }

    fn channel(name: &str, template_id: i64) -> TxChannel {
        TxChannel {
            channel: name.to_string(),
            template_id,
            content: None,
        }
    }

    async fn legacy_mode(h: &Harness, messengers: &[&str]) -> DispatchMode {
        DispatchMode::Legacy {
            template: h.templates.get(1).await.unwrap().unwrap(),
            messengers: messengers.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn multi(channels: Vec<TxChannel>) -> (ValidatedTx, DispatchMode) {
        (
            tx(Delivery::Channels(channels.clone())),
            DispatchMode::MultiChannel { channels },
        )
    }

    #[tokio::test]
    async fn legacy_default_messenger_sends_once_per_recipient() {
        let h = harness(3).await;
        let mode = legacy_mode(&h, &["email"]).await;

        let outcome = h
            .engine
            .dispatch(&legacy_tx(), &mode, resolution(&h.recipients))
            .await
            .unwrap();

        let sent = h.email.messages().await;
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|m| m.messenger == "email"));
        assert_eq!(outcome.sent, 3);
        assert_eq!(sent.iter().filter(|m| m.subject == "Hello User 2").count(), 1);
    }

    #[tokio::test]
    async fn legacy_multiple_messengers_multiply_sends() {
        let h = harness(2).await;
        let mode = legacy_mode(&h, &["email", "sms"]).await;

        let outcome = h
            .engine
            .dispatch(&legacy_tx(), &mode, resolution(&h.recipients))
            .await
            .unwrap();

        assert_eq!(outcome.sent, 4);
        assert_eq!(h.email.messages().await.len(), 2);
        assert_eq!(h.sms.messages().await.len(), 2);
    }

    /// Renders normally except for one subscriber.
    struct FailFor(i64);

    impl TemplateRenderer for FailFor {
        fn render(
            &self,
            template: &Template,
            subject: Option<&str>,
            context: RenderContext<'_>,
        ) -> Result<RenderedContent, RenderError> {
            if context.subscriber.id == self.0 {
                return Err(RenderError::UnknownVariable("subscriber.attribs".to_string()));
            }
            PlaceholderRenderer.render(template, subject, context)
        }
    }

    #[tokio::test]
    async fn legacy_render_failure_aborts_remaining_recipients() {
        let h = harness(3).await;
        let gateway = MessengerGateway::new(vec![h.email.clone() as Arc<dyn MessageSink>]);
        let engine = DispatchEngine::new(h.templates.clone(), Arc::new(FailFor(2)), Arc::new(gateway), 1);
        let mode = legacy_mode(&h, &["email"]).await;

        let err = engine
            .dispatch(&legacy_tx(), &mode, resolution(&h.recipients))
            .await
            .unwrap_err();

        assert!(matches!(err, TxError::Render { subscriber_id: 2, .. }));
        let sent = h.email.messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subscriber.id, 1);
    }

    #[tokio::test]
    async fn render_failure_in_channel_mode_is_per_item() {
        let h = harness(3).await;
        let gateway = MessengerGateway::new(vec![h.email.clone() as Arc<dyn MessageSink>]);
        let engine = DispatchEngine::new(h.templates.clone(), Arc::new(FailFor(2)), Arc::new(gateway), 1);
        let (tx, mode) = multi(vec![channel("email", 1)]);

        let outcome = engine
            .dispatch(&tx, &mode, resolution(&h.recipients))
            .await
            .unwrap();

        let delivered: Vec<i64> = h.email.messages().await.iter().map(|m| m.subscriber.id).collect();
        assert_eq!(delivered, vec![1, 3]);
        assert_eq!(outcome.skipped, 1);
    }

    #[tokio::test]
    async fn broadcast_channel_sends_once_using_first_recipient() {
        let h = harness(5).await;
        let (tx, mode) = multi(vec![channel("webhook", 2)]);

        h.engine
            .dispatch(&tx, &mode, resolution(&h.recipients))
            .await
            .unwrap();

        let sent = h.webhook.messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["user1@example.com"]);
        assert_eq!(sent[0].body, b"{\"first\":\"user1@example.com\"}");
    }

    #[tokio::test]
    async fn broadcast_without_recipients_is_silent() {
        let h = harness(0).await;
        let (tx, mode) = multi(vec![channel("webhook", 2)]);

        let outcome = h
            .engine
            .dispatch(&tx, &mode, resolution(&[]))
            .await
            .unwrap();

        assert!(h.webhook.messages().await.is_empty());
        assert_eq!(outcome.sent, 0);
        assert!(outcome.failed.is_empty());
    }

    #[tokio::test]
    async fn subscriber_scoped_channel_sends_per_recipient() {
        let h = harness(4).await;
        let (tx, mode) = multi(vec![channel("email", 1), channel("webhook", 2)]);

        let outcome = h
            .engine
            .dispatch(&tx, &mode, resolution(&h.recipients))
            .await
            .unwrap();

        assert_eq!(h.email.messages().await.len(), 4);
        assert_eq!(h.webhook.messages().await.len(), 1);
        assert_eq!(outcome.sent, 5);
    }

    #[tokio::test]
    async fn literal_channel_content_replaces_body() {
        let h = harness(2).await;
        let (tx, mode) = multi(vec![TxChannel {
            channel: "webhook".to_string(),
            template_id: 2,
            content: Some("static payload".to_string()),
        }]);

        h.engine
            .dispatch(&tx, &mode, resolution(&h.recipients))
            .await
            .unwrap();

        assert_eq!(h.webhook.messages().await[0].body, b"static payload");
    }

    #[tokio::test]
    async fn channel_template_problems_skip_only_that_channel() {
        let h = harness(2).await;
        let (tx, mode) = multi(vec![
            channel("webhook", 404),
            channel("webhook", 3),
            channel("email", 3),
            channel("email", 1),
        ]);

        let outcome = h
            .engine
            .dispatch(&tx, &mode, resolution(&h.recipients))
            .await
            .unwrap();

        assert!(h.webhook.messages().await.is_empty());
        assert_eq!(h.email.messages().await.len(), 2);
        assert_eq!(outcome.skipped, 4);
    }

    #[tokio::test]
    async fn sink_failure_does_not_stop_later_sends() {
        let h = harness(3).await;
        h.email.fail_for(1).await;
        let (tx, mode) = multi(vec![channel("email", 1)]);

        let outcome = h
            .engine
            .dispatch(&tx, &mode, resolution(&h.recipients))
            .await
            .unwrap();

        let delivered: Vec<i64> = h.email.messages().await.iter().map(|m| m.subscriber.id).collect();
        assert_eq!(delivered.len(), 2);
        assert!(!delivered.contains(&1));
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].subscriber_id, 1);
        assert!(outcome.into_result().is_ok());
    }

    #[tokio::test]
    async fn duplicate_recipients_are_sent_twice() {
        let h = harness(1).await;
        let twice = vec![h.recipients[0].clone(), h.recipients[0].clone()];
        let (tx, mode) = multi(vec![channel("email", 1)]);

        h.engine
            .dispatch(&tx, &mode, resolution(&twice))
            .await
            .unwrap();

        assert_eq!(h.email.messages().await.len(), 2);
    }

    #[tokio::test]
    async fn not_found_entries_become_one_aggregate_error() {
        let h = harness(1).await;
        let (tx, mode) = multi(vec![channel("email", 1)]);
        let resolution = Resolution {
            recipients: h.recipients.clone(),
            not_found: vec![
                "List 'a' not found".to_string(),
                "List 'b' not found".to_string(),
            ],
        };

        let outcome = h.engine.dispatch(&tx, &mode, resolution).await.unwrap();
        assert_eq!(h.email.messages().await.len(), 1);

        match outcome.into_result() {
            Err(TxError::RecipientsNotFound(msg)) => {
                assert_eq!(msg, "List 'a' not found; List 'b' not found")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_dispatch_starts_no_units() {
        let h = harness(3).await;
        let (tx, mode) = multi(vec![channel("email", 1)]);
        let (cancel_tx, cancel) = watch::channel(false);
        cancel_tx.send(true).unwrap();

        let outcome = h
            .engine
            .dispatch_until_cancelled(&tx, &mode, resolution(&h.recipients), cancel)
            .await
            .unwrap();

        assert!(h.email.messages().await.is_empty());
        assert_eq!(outcome.skipped, 3);
    }

    #[tokio::test]
    async fn headers_from_several_sets_are_all_carried() {
        let h = harness(1).await;
        let (mut tx, mode) = multi(vec![channel("email", 1)]);
        tx.headers = vec![
            [("X-Ref".to_string(), "a".to_string())].into(),
            [("X-Ref".to_string(), "b".to_string())].into(),
        ];

        h.engine
            .dispatch(&tx, &mode, resolution(&h.recipients))
            .await
            .unwrap();

        let sent = h.email.messages().await;
        assert_eq!(sent[0].headers.get_all("X-Ref"), vec!["a", "b"]);
    }
}
