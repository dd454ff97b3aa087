/// Reserved messenger name. It is both the default legacy messenger and the
/// only channel that is sent once per subscriber.
pub const EMAIL_MESSENGER: &str = "email";
