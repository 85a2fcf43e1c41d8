pub mod messages;
pub mod streaming;
