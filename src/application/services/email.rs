use mailparse::{MailAddr, addrparse};

use crate::domain::errors::TxError;

const MIN_EMAIL_LEN: usize = 3;
const MAX_EMAIL_LEN: usize = 1000;

/// Normalizes an address to lowercase and rejects anything that is not a
/// single bare address. `Name <a@b.c>` and `<a@b.c>` are both refused.
pub fn sanitize_email(raw: &str) -> Result<String, TxError> {
    let email = raw.trim().to_lowercase();
    if email.len() < MIN_EMAIL_LEN || email.len() > MAX_EMAIL_LEN {
        return Err(invalid(raw));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid(raw));
    }
    match email.rsplit_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => return Err(invalid(raw)),
    }

    let parsed = addrparse(&email).map_err(|_| invalid(raw))?;
    match parsed.first() {
        Some(MailAddr::Single(info))
            if parsed.len() == 1 && info.display_name.is_none() && info.addr == email =>
        {
            Ok(email)
        }
        _ => Err(invalid(raw)),
    }
}

fn invalid(raw: &str) -> TxError {
    TxError::validation(format!("invalid email: {raw}"))
}
