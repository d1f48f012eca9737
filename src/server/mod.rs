//! SKU ingest server.
//!
//! Admits connections up to a fixed ceiling, reads one line from each,
//! hands it to the domain handler and tallies the outcome. The run stops
//! admitting on the `terminate` sentinel, caller cancellation, an OS
//! signal, the run deadline or a failed read, then waits for every
//! in-flight connection before emitting the report exactly once.

mod reader;
mod report;
mod slots;

pub use reader::{SkuReader, TcpSkuReader};
pub use report::{FileReportSink, ReportSink, ReportSummary};

use report::{Outcome, Report};
use slots::ConnectionSlots;

use crate::error::ReadError;
use crate::shutdown::{wait_for_shutdown_signal, Shutdown, StopReason};
use crate::sku::{CommandHandler, CreateSku};
use std::sync::Arc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace, warn};

/// Control message that stops admission of further connections
pub const TERMINATE: &str = "terminate";

/// Server instance
pub struct Server {
    reader: Arc<dyn SkuReader>,
    handler: Arc<dyn CommandHandler>,
    sink: Arc<dyn ReportSink>,
    os_signals: bool,
}

impl Server {
    /// Create a new server instance
    pub fn new(
        reader: Arc<dyn SkuReader>,
        handler: Arc<dyn CommandHandler>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Server {
            reader,
            handler,
            sink,
            os_signals: false,
        }
    }

    /// Also stop on SIGINT/SIGTERM/SIGQUIT (Ctrl-C off Unix).
    pub fn with_os_signals(mut self, enabled: bool) -> Self {
        self.os_signals = enabled;
        self
    }

    /// Accept connections until something stops the run, drain, then
    /// emit and return the report.
    pub async fn run(
        self,
        max_connections: usize,
        deadline: Instant,
        cancel: CancellationToken,
    ) -> ReportSummary {
        let slots = ConnectionSlots::new(max_connections);
        let shutdown = Arc::new(Shutdown::new());
        let report = Arc::new(Report::new());
        let tracker = TaskTracker::new();

        if max_connections == 0 {
            shutdown.request_stop(StopReason::NoCapacity);
        }

        let os_signals = self.os_signals;
        let signal = async move {
            if os_signals {
                match wait_for_shutdown_signal().await {
                    Ok(()) => return,
                    Err(e) => warn!(error = %e, "Failed to install signal handlers"),
                }
            }
            std::future::pending::<()>().await
        };
        tokio::pin!(signal);

        info!(max_connections = slots.ceiling(), "Accepting connections");

        while shutdown.is_running() {
            let permit = tokio::select! {
                biased;
                _ = shutdown.stopping() => break,
                _ = cancel.cancelled() => {
                    shutdown.request_stop(StopReason::Cancelled);
                    break;
                }
                _ = &mut signal => {
                    shutdown.request_stop(StopReason::Signal);
                    break;
                }
                _ = sleep_until(deadline) => {
                    shutdown.request_stop(StopReason::DeadlineExceeded);
                    break;
                }
                permit = slots.acquire() => match permit {
                    Some(permit) => permit,
                    None => {
                        shutdown.request_stop(StopReason::NoCapacity);
                        break;
                    }
                },
            };

            let unit = HandlingUnit {
                reader: Arc::clone(&self.reader),
                handler: Arc::clone(&self.handler),
                report: Arc::clone(&report),
                shutdown: Arc::clone(&shutdown),
                deadline,
            };
            tracker.spawn(async move {
                unit.run().await;
                permit.release();
            });
        }

        tracker.close();
        debug!(in_flight = tracker.len(), "Draining in-flight connections");
        tracker.wait().await;
        shutdown.mark_stopped();

        let summary = report.summary();
        info!(
            created = summary.created,
            duplicated = summary.duplicated,
            invalid = summary.invalid,
            peak_connections = slots.peak(),
            "Run finished"
        );
        if let Err(e) = self.sink.emit(&summary) {
            error!(error = %e, "Failed to write report");
        }
        summary
    }
}

/// Everything one spawned connection handler needs
struct HandlingUnit {
    reader: Arc<dyn SkuReader>,
    handler: Arc<dyn CommandHandler>,
    report: Arc<Report>,
    shutdown: Arc<Shutdown>,
    deadline: Instant,
}

impl HandlingUnit {
    /// Read one message and process it.
    async fn run(self) {
        let message = match self.reader.read(self.deadline, self.shutdown.token()).await {
            Ok(message) => message,
            Err(e) => {
                self.on_read_error(e);
                return;
            }
        };

        if message == TERMINATE {
            self.shutdown.request_stop(StopReason::Terminate);
            return;
        }

        let result = self.handler.handle(CreateSku::new(message)).await;
        let outcome = Outcome::classify(&result);
        match &result {
            Ok(()) => trace!(?outcome, "Message processed"),
            Err(e) => debug!(?outcome, error = %e, "Message rejected"),
        }
        self.report.record(outcome);
    }

    fn on_read_error(&self, e: ReadError) {
        match &e {
            ReadError::DeadlineExceeded => debug!("Deadline reached while waiting for a client"),
            ReadError::Fatal(source) => error!(error = %source, "Listener failed"),
            ReadError::Connection(source) => warn!(error = %source, "Failed to read connection"),
            ReadError::Cancelled => trace!(reason = e.as_label(), "Read abandoned"),
        }
        if let Some(reason) = e.stop_reason() {
            self.shutdown.request_stop(reason);
        }
    }
}
