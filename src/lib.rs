pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod providers;
pub mod proxy;
pub mod reply;
pub mod request_fsm;
pub mod transcript;
pub mod ui;

pub type Result<T> = std::result::Result<T, error::AdvisorChatError>;
