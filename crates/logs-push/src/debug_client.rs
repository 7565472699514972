// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A client that renders what it would push instead of pushing it.
//!
//! ```text
//!    ┌──────────────┐
//!    │ EntrySenders │ (any number of producers)
//!    └──────┬───────┘
//!           │ unbounded channel
//!           v
//!    ┌──────────────┐
//!    │    Worker    │ (single task, owns batches and writer)
//!    └──────┬───────┘
//!           │ encode + render
//!           v
//!    ┌──────────────┐
//!    │    stdout    │
//!    └──────────────┘
//! ```
//!
//! Every entry is encoded on its own and rendered; every
//! [`EVENT_BATCH_SIZE`] entries the accumulated window is encoded and
//! rendered as one batch. Nothing leaves the process.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn, Instrument, Span};

use crate::batch::Batch;
use crate::codec::{EncodedBatch, Encoder, PushRequestEncoder};
use crate::config::ClientConfig;
use crate::constants::{DEBUG_BATCH_MAX_BYTES, EVENT_BATCH_SIZE};
use crate::entry::Entry;
use crate::errors::Creation;
use crate::metrics::Metrics;
use crate::render::{RenderConfig, Renderer};
use crate::transport;

/// Common surface of push clients.
pub trait Client: Send + Sync {
    /// Handle producers use to hand entries to the client.
    fn sender(&self) -> EntrySender;

    /// Stops accepting entries. Safe to call any number of times.
    fn stop(&self);

    /// Same as [`Client::stop`] for clients without a graceful mode.
    fn stop_now(&self);

    fn name(&self) -> &str;
}

/// Write side of the handoff channel.
///
/// Sending after the client was stopped is a caller bug; it is reported as an
/// error carrying the rejected entry.
#[derive(Clone, Debug)]
pub struct EntrySender {
    tx: mpsc::UnboundedSender<Entry>,
}

impl EntrySender {
    pub fn send(&self, entry: Entry) -> Result<(), mpsc::error::SendError<Entry>> {
        self.tx.send(entry)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Running,
    Draining,
    Stopped,
}

struct Worker<W: Write> {
    rx: mpsc::UnboundedReceiver<Entry>,
    shutdown: CancellationToken,
    renderer: Renderer<W>,
    encoder: Arc<dyn Encoder>,
    metrics: Arc<Metrics>,
    multi_batch: Batch,
    batch_count: usize,
    flush_partial_on_drain: bool,
    state: WorkerState,
}

impl<W: Write> Worker<W> {
    async fn run(mut self) {
        debug!("Debug client worker {:?}", self.state);

        while self.state == WorkerState::Running {
            // Queued entries go first so a stop never overtakes them.
            let next = tokio::select! {
                biased;
                entry = self.rx.recv() => entry,
                () = self.shutdown.cancelled() => None,
            };
            match next {
                Some(entry) => self.handle_entry(entry),
                None => self.state = WorkerState::Draining,
            }
        }

        debug!("Debug client worker {:?}", self.state);
        self.rx.close();
        while let Some(entry) = self.rx.recv().await {
            self.handle_entry(entry);
        }

        if self.flush_partial_on_drain && !self.multi_batch.is_empty() {
            let encoded = self.encode(&self.multi_batch, "partial batch");
            if let Err(e) = self.renderer.render_partial_batch(encoded.as_ref()) {
                warn!("Failed to render partial batch: {}", e);
            }
        } else if !self.multi_batch.is_empty() {
            debug!(
                "Discarding {} entries of unfinished batch",
                self.multi_batch.len()
            );
        }

        self.state = WorkerState::Stopped;
        debug!("Debug client worker {:?}", self.state);
    }

    fn handle_entry(&mut self, entry: Entry) {
        self.metrics.record_entry();

        let single = Batch::with_entries(DEBUG_BATCH_MAX_BYTES, [entry.clone()]);
        let encoded = self.encode(&single, "single event");
        if let Err(e) = self.renderer.render_single(&entry, encoded.as_ref()) {
            warn!("Failed to render entry: {}", e);
        }

        self.multi_batch.add(entry);
        self.batch_count += 1;
        if self.batch_count == EVENT_BATCH_SIZE {
            self.batch_count = 0;
            let encoded = self.encode(&self.multi_batch, "batch");
            self.multi_batch = Batch::new(DEBUG_BATCH_MAX_BYTES);
            if let Err(e) = self.renderer.render_batch(encoded.as_ref()) {
                warn!("Failed to render batch: {}", e);
            }
        }
    }

    fn encode(&self, batch: &Batch, what: &str) -> Option<EncodedBatch> {
        match batch.encode(self.encoder.as_ref()) {
            Ok(encoded) => {
                self.metrics.record_encoded(encoded.len());
                Some(encoded)
            }
            Err(e) => {
                self.metrics.record_encode_failure();
                debug!("Skipping {} payload: {}", what, e);
                None
            }
        }
    }
}

/// Builder for [`DebugClient`] when stdout and the default encoder don't fit.
pub struct DebugClientBuilder<W> {
    metrics: Arc<Metrics>,
    configs: Vec<ClientConfig>,
    writer: W,
    render_config: RenderConfig,
    encoder: Arc<dyn Encoder>,
    flush_partial_on_drain: bool,
}

impl DebugClientBuilder<io::Stdout> {
    #[must_use]
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            configs: Vec::new(),
            writer: io::stdout(),
            render_config: RenderConfig::detect(),
            encoder: Arc::new(PushRequestEncoder::default()),
            flush_partial_on_drain: false,
        }
    }
}

impl<W: Write + Send + 'static> DebugClientBuilder<W> {
    #[must_use]
    pub fn configs(mut self, configs: Vec<ClientConfig>) -> Self {
        self.configs = configs;
        self
    }

    /// Replaces the output stream.
    pub fn writer<W2: Write + Send + 'static>(self, writer: W2) -> DebugClientBuilder<W2> {
        DebugClientBuilder {
            metrics: self.metrics,
            configs: self.configs,
            writer,
            render_config: self.render_config,
            encoder: self.encoder,
            flush_partial_on_drain: self.flush_partial_on_drain,
        }
    }

    #[must_use]
    pub fn render_config(mut self, render_config: RenderConfig) -> Self {
        self.render_config = render_config;
        self
    }

    #[must_use]
    pub fn encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Render the unfinished multi-entry window on shutdown instead of
    /// dropping it.
    #[must_use]
    pub fn flush_partial_on_drain(mut self, enabled: bool) -> Self {
        self.flush_partial_on_drain = enabled;
        self
    }

    /// Validates every config, prints them and spawns the worker.
    ///
    /// Must be called from within a Tokio runtime. Nothing is spawned when
    /// validation or printing fails.
    pub fn build(self) -> Result<DebugClient, Creation> {
        transport::validate_all(&self.configs)?;

        let mut renderer = Renderer::new(self.writer, self.render_config);
        renderer.render_clients(&self.configs)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let worker = Worker {
            rx,
            shutdown: shutdown.clone(),
            renderer,
            encoder: self.encoder,
            metrics: self.metrics,
            multi_batch: Batch::new(DEBUG_BATCH_MAX_BYTES),
            batch_count: 0,
            flush_partial_on_drain: self.flush_partial_on_drain,
            state: WorkerState::Running,
        };
        let handle = tokio::spawn(worker.run().instrument(Span::current()));

        Ok(DebugClient {
            sender: EntrySender { tx },
            shutdown,
            stopped: AtomicBool::new(false),
            worker: Mutex::new(Some(handle)),
        })
    }
}

/// Client that logs entries and their encoded push requests instead of
/// sending them.
pub struct DebugClient {
    sender: EntrySender,
    shutdown: CancellationToken,
    stopped: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DebugClient {
    /// Validates `configs`, prints them to stdout and starts the worker.
    pub fn new(metrics: Arc<Metrics>, configs: Vec<ClientConfig>) -> Result<Self, Creation> {
        DebugClientBuilder::new(metrics).configs(configs).build()
    }

    #[must_use]
    pub fn builder(metrics: Arc<Metrics>) -> DebugClientBuilder<io::Stdout> {
        DebugClientBuilder::new(metrics)
    }

    /// Closes the handoff channel. Returns `true` only for the call that
    /// actually closed it.
    pub fn shutdown(&self) -> bool {
        if self
            .stopped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        debug!("Debug client shutting down");
        self.shutdown.cancel();
        true
    }

    /// Waits for the worker to drain and exit. Only the first caller waits
    /// on the task; later callers return immediately.
    pub async fn wait(&self) {
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Debug client worker failed: {}", e);
            }
        }
    }
}

impl Client for DebugClient {
    fn sender(&self) -> EntrySender {
        self.sender.clone()
    }

    fn stop(&self) {
        self.shutdown();
    }

    fn stop_now(&self) {
        self.stop();
    }

    fn name(&self) -> &str {
        ""
    }
}
