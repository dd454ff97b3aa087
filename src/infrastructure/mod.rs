pub mod messaging;
pub mod rendering;
pub mod repositories;
