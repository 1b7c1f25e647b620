use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::utils::clock::Clock;

use super::{events::DocumentEvent, source::DocumentEventSource};

/// Drives a [DocumentEventSource] on a fixed cadence and feeds whatever it
/// produces into the tracker's channel.
pub struct WatchModule {
    next: mpsc::Sender<DocumentEvent>,
    source: Box<dyn DocumentEventSource>,
    shutdown: CancellationToken,
    poll_frequency: Duration,
    time_provider: Box<dyn Clock>,
}

impl WatchModule {
    pub fn new(
        next: mpsc::Sender<DocumentEvent>,
        source: Box<dyn DocumentEventSource>,
        shutdown: CancellationToken,
        poll_frequency: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            source,
            shutdown,
            poll_frequency,
            time_provider,
        }
    }

    /// Executes the watcher event loop.
    pub async fn run(mut self) -> Result<()> {
        let mut poll_point = self.time_provider.instant();
        loop {
            poll_point += self.poll_frequency;

            match self.source.poll_events().await {
                Ok(events) => {
                    for event in events {
                        debug!("Sending event {:?}", event);
                        self.next
                            .send(event)
                            .await
                            .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
                    }
                }
                Err(e) => {
                    error!("Encountered an error during polling {:?}", e)
                }
            }

            tokio::select! {
                // Cancelation stops the event loop. The sender drops with it,
                // which in turn lets the tracker drain and stop.
                _ = self.shutdown.cancelled() => {
                    info!("Watcher shutting down");
                    return Ok(());
                }
                _ = self.time_provider.sleep_until(poll_point) => {}
            }
        }
    }
}
