pub mod discord;
pub mod transport;
pub mod vision;

pub use discord::{DiscordConfig, DiscordPublisher};
pub use transport::ReqwestTransport;
pub use vision::OpenAiChartReader;
