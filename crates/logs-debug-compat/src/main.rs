// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use logs_push::{
    config::DebugSinkConfig,
    debug_client::{Client, DebugClient, EntrySender},
    entry::{Entry, LabelSet},
    metrics::Metrics,
};

#[tokio::main]
pub async fn main() {
    let config = match DebugSinkConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error creating config on logs debug sink startup: {e}");
            return;
        }
    };

    let env_filter = format!("h2=off,hyper=off,reqwest=off,rustls=off,{}", config.log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let metrics = Arc::new(Metrics::new());
    let client = match DebugClient::builder(Arc::clone(&metrics))
        .configs(config.clients.clone())
        .flush_partial_on_drain(config.flush_partial_on_drain)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            error!("Error creating debug client: {e}");
            return;
        }
    };

    let mut labels = config.labels.clone();
    for client_config in &config.clients {
        labels.merge_missing(&client_config.external_labels);
    }

    info!("Reading log lines from stdin with labels {labels}");
    let (done_tx, done_rx) = oneshot::channel();
    let sender = client.sender();
    // Blocking reads stay off the runtime so an interrupt never waits on them.
    let reader = thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            read_lines(io::stdin().lock(), &sender, &labels);
            let _ = done_tx.send(());
        });
    if let Err(e) = reader {
        error!("Failed to start stdin reader: {e}");
    } else {
        tokio::select! {
            _ = done_rx => debug!("Stdin reader finished"),
            _ = tokio::signal::ctrl_c() => info!("Received interrupt, shutting down"),
        }
    }

    client.stop();
    client.wait().await;

    let snapshot = metrics.snapshot();
    info!(
        "Rendered {} entries, {} payloads ({} bytes), {} encode failures",
        snapshot.entries,
        snapshot.encoded_batches,
        snapshot.encoded_bytes,
        snapshot.encode_failures
    );
}

fn read_lines(input: impl BufRead, sender: &EntrySender, labels: &LabelSet) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read from stdin: {e}");
                return;
            }
        };
        let entry = Entry::new(chrono::Local::now(), labels.clone(), line);
        if sender.send(entry).is_err() {
            debug!("Debug client stopped before stdin was exhausted");
            return;
        }
    }
    debug!("Reached end of stdin");
}

#[cfg(test)]
mod tests {
    use super::*;
    use logs_push::render::RenderConfig;

    fn client(metrics: &Arc<Metrics>) -> DebugClient {
        DebugClient::builder(Arc::clone(metrics))
            .writer(io::sink())
            .render_config(RenderConfig::plain())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_reader_thread_feeds_client_until_eof() {
        let metrics = Arc::new(Metrics::new());
        let client = client(&metrics);
        let sender = client.sender();

        let input = io::Cursor::new("one\ntwo\nthree\n");
        thread::spawn(move || read_lines(input, &sender, &LabelSet::new().with("job", "stdin")))
            .join()
            .unwrap();
        client.stop();
        client.wait().await;

        assert_eq!(metrics.snapshot().entries, 3);
    }

    #[tokio::test]
    async fn test_reader_returns_once_client_stopped() {
        let metrics = Arc::new(Metrics::new());
        let client = client(&metrics);
        let sender = client.sender();
        client.stop();
        client.wait().await;

        read_lines(io::Cursor::new("late\n"), &sender, &LabelSet::new());
        assert_eq!(metrics.snapshot().entries, 0);
    }
}
