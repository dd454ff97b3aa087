pub mod send_tx_message;
pub mod validate_tx_message;
