use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::AppError;
use crate::traits::Publisher;

/// Writes reports to any `Write` sink, one report per call.
pub struct WritePublisher<W> {
    name: String,
    writer: Mutex<W>,
}

impl<W: Write + Send> WritePublisher<W> {
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl WritePublisher<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new("stdout", std::io::stdout())
    }
}

#[async_trait]
impl<W: Write + Send> Publisher for WritePublisher<W> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, text: &str) -> Result<(), AppError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| AppError::PublishError(format!("{} writer poisoned", self.name)))?;
        writeln!(writer, "{text}")
            .and_then(|_| writer.flush())
            .map_err(|e| AppError::PublishError(format!("{}: {e}", self.name)))
    }
}

/// Deliver `text` to every publisher.
///
/// A failing sink is logged and skipped. Returns the number of sinks that
/// accepted the report, or the first error when every sink failed.
pub async fn publish_all(publishers: &[Box<dyn Publisher>], text: &str) -> Result<usize, AppError> {
    let mut delivered = 0;
    let mut first_error = None;

    for publisher in publishers {
        match publisher.publish(text).await {
            Ok(()) => {
                tracing::info!(publisher = publisher.name(), "Report published");
                delivered += 1;
            }
            Err(e) => {
                tracing::warn!(publisher = publisher.name(), error = %e, "Publish failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if delivered == 0 => Err(e),
        _ => Ok(delivered),
    }
}
