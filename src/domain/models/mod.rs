pub mod list;
pub mod message;
pub mod messenger;
pub mod subscriber;
pub mod template;

pub use list::SubscriberList;
pub use message::{Attachment, ContentType, OutboundMessage, TxChannel};
pub use messenger::EMAIL_MESSENGER;
pub use subscriber::{Subscriber, SubscriberStatus};
pub use template::Template;
