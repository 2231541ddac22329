/// Tweet Scheduler Bot Library
///
/// Scheduled tweet posting with a resilient retry invoker around the
/// Twitter and OpenAI APIs, plus configuration, rotation and status glue.

pub mod agent;
pub mod config;
pub mod error;
pub mod http_server;
pub mod oauth;
pub mod openai;
pub mod publish;
pub mod retry;
pub mod scheduler;
pub mod shutdown;
pub mod status;
pub mod tweets;
pub mod twitter;
