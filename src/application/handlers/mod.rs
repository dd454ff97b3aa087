pub mod channel_classifier;
pub mod dispatch_engine;
pub mod message_composer;
pub mod recipient_resolver;
