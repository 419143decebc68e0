//! Message capture pipeline

pub mod config;
pub mod decoder;
pub mod error;
pub mod hub;
pub mod ingestor;
pub mod record;
pub mod relay;
pub mod subject;

pub use config::{CaptureConfig, LoggingConfig, RelayConfig, ServerConfig, StorageConfig, parse_port};
pub use decoder::{LINE_SEPARATOR, PREAMBLE_LINES, StreamDecoder};
pub use error::ConfigError;
pub use hub::{NotificationHub, Observer, Subscription};
pub use ingestor::{MailIngestor, PublishGuard};
pub use record::{IngestionOutcome, MailRecord};
pub use relay::RelayFilter;
