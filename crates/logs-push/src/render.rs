// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Human readable rendering of entries and encoded batches.
//!
//! Output layout per entry:
//!
//! ```text
//! Single event:
//! <base64 payload of the 1-entry batch>
//! 2024-01-02T03:04:05.000000007+0000	{job="a"}	line
//! ----------------------------
//! ```
//!
//! and after every third entry:
//!
//! ```text
//! Batch:
//! <base64 payload of the last three entries>
//! ----------------------------
//! ----------------------------
//! ```
//!
//! Colors are cosmetic only; the text is identical with or without them.

use anstyle::{AnsiColor, Color, Style};
use is_terminal::IsTerminal;
use std::io::{self, BufWriter, Write};

use crate::codec::EncodedBatch;
use crate::config::ClientConfig;
use crate::constants::{CLIENT_SEPARATOR, ENTRY_SEPARATOR};
use crate::entry::Entry;
use crate::errors::Creation;

/// Timestamp layout: fixed width, nanoseconds, offset without colon.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9f%z";

const SINGLE_BANNER: &str = "Single event: \n";
const BATCH_BANNER: &str = "Batch: \n";
const PARTIAL_BATCH_BANNER: &str = "Partial batch: \n";
const CLIENTS_BANNER: &str = "Clients configured:\n";

/// Rendering options, decided once when the sink is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    pub enable_color: bool,
}

impl RenderConfig {
    /// Colors only on a non-Windows terminal with `NO_COLOR` unset.
    #[must_use]
    pub fn detect() -> Self {
        let enable_color = !cfg!(windows)
            && std::env::var_os("NO_COLOR").is_none()
            && io::stdout().is_terminal();
        Self { enable_color }
    }

    #[must_use]
    pub fn plain() -> Self {
        Self {
            enable_color: false,
        }
    }
}

struct Palette {
    single: Style,
    timestamp: Style,
    labels: Style,
    batch: Style,
}

impl Palette {
    fn new(enable_color: bool) -> Self {
        let fg = |color: AnsiColor| {
            if enable_color {
                Style::new().fg_color(Some(Color::Ansi(color)))
            } else {
                Style::new()
            }
        };
        Self {
            single: fg(AnsiColor::Cyan),
            timestamp: fg(AnsiColor::Blue),
            labels: fg(AnsiColor::Yellow),
            batch: fg(AnsiColor::Red),
        }
    }
}

/// Writes the debug view of entries and batches. Every public call ends with
/// a flush so output shows up as it happens.
pub struct Renderer<W: Write> {
    writer: BufWriter<W>,
    config: RenderConfig,
    palette: Palette,
}

impl<W: Write> Renderer<W> {
    pub fn new(writer: W, config: RenderConfig) -> Self {
        Self {
            writer: BufWriter::new(writer),
            config,
            palette: Palette::new(config.enable_color),
        }
    }

    /// Lists the configured clients before any entry is rendered.
    pub fn render_clients(&mut self, configs: &[ClientConfig]) -> Result<(), Creation> {
        let labels = self.palette.labels;
        self.write_styled(labels, CLIENTS_BANNER)?;
        for config in configs {
            let body = serde_json::to_string_pretty(config)?;
            self.writer.write_all(CLIENT_SEPARATOR.as_bytes())?;
            self.writer.write_all(body.as_bytes())?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Renders one entry, preceded by its 1-entry payload when it encoded.
    pub fn render_single(&mut self, entry: &Entry, encoded: Option<&EncodedBatch>) -> io::Result<()> {
        let single = self.palette.single;
        if let Some(encoded) = encoded {
            self.write_styled(single, SINGLE_BANNER)?;
            self.write_styled(single, &encoded.to_base64())?;
            self.writer.write_all(b"\n")?;
        }

        let timestamp = entry.timestamp().format(TIMESTAMP_FORMAT).to_string();
        self.write_styled(self.palette.timestamp, &timestamp)?;
        self.writer.write_all(b"\t")?;
        self.write_styled(self.palette.labels, &entry.labels().to_string())?;
        self.writer.write_all(b"\t")?;
        self.writer.write_all(entry.line().as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.write_styled(single, ENTRY_SEPARATOR)?;
        self.writer.flush()
    }

    /// Renders the multi-entry window that just filled up.
    pub fn render_batch(&mut self, encoded: Option<&EncodedBatch>) -> io::Result<()> {
        self.render_window(BATCH_BANNER, encoded)
    }

    /// Renders a window that was cut short by shutdown.
    pub fn render_partial_batch(&mut self, encoded: Option<&EncodedBatch>) -> io::Result<()> {
        self.render_window(PARTIAL_BATCH_BANNER, encoded)
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(io::IntoInnerError::into_error)
    }

    fn render_window(&mut self, banner: &str, encoded: Option<&EncodedBatch>) -> io::Result<()> {
        let batch = self.palette.batch;
        if let Some(encoded) = encoded {
            self.write_styled(batch, banner)?;
            self.write_styled(batch, &encoded.to_base64())?;
            self.writer.write_all(b"\n")?;
        }
        self.write_styled(batch, ENTRY_SEPARATOR)?;
        self.write_styled(batch, ENTRY_SEPARATOR)?;
        self.writer.flush()
    }

    fn write_styled(&mut self, style: Style, text: &str) -> io::Result<()> {
        if self.config.enable_color {
            write!(self.writer, "{}{}{}", style.render(), text, style.render_reset())
        } else {
            self.writer.write_all(text.as_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::LabelSet;
    use chrono::{FixedOffset, TimeZone, Utc};

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Renderer<Vec<u8>>),
    {
        let mut renderer = Renderer::new(Vec::new(), RenderConfig::plain());
        f(&mut renderer);
        String::from_utf8(renderer.into_inner().unwrap()).unwrap()
    }

    fn entry() -> Entry {
        let ts = Utc.timestamp_opt(1_704_164_645, 7).unwrap();
        Entry::new(ts, LabelSet::new().with("job", "a"), "l1")
    }

    fn encoded() -> EncodedBatch {
        EncodedBatch {
            payload: b"hello".to_vec(),
            entries: 1,
        }
    }

    #[test]
    fn test_render_single_with_payload() {
        let out = render(|r| r.render_single(&entry(), Some(&encoded())).unwrap());
        assert_eq!(
            out,
            "Single event: \naGVsbG8=\n\
             2024-01-02T03:04:05.000000007+0000\t{job=\"a\"}\tl1\n\
             ----------------------------\n"
        );
    }

    #[test]
    fn test_render_single_without_payload() {
        let out = render(|r| r.render_single(&entry(), None).unwrap());
        assert_eq!(
            out,
            "2024-01-02T03:04:05.000000007+0000\t{job=\"a\"}\tl1\n\
             ----------------------------\n"
        );
    }

    #[test]
    fn test_timestamp_keeps_offset() {
        let offset = FixedOffset::west_opt(5 * 3600 + 30 * 60).unwrap();
        let ts = offset.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let e = Entry::new(ts, LabelSet::new(), "x");
        let out = render(|r| r.render_single(&e, None).unwrap());
        assert!(out.starts_with("2023-12-31T23:59:59.000000000-0530\t{}\tx\n"));
    }

    #[test]
    fn test_render_batch() {
        let out = render(|r| r.render_batch(Some(&encoded())).unwrap());
        assert_eq!(
            out,
            "Batch: \naGVsbG8=\n\
             ----------------------------\n\
             ----------------------------\n"
        );

        let out = render(|r| r.render_batch(None).unwrap());
        assert_eq!(
            out,
            "----------------------------\n----------------------------\n"
        );
    }

    #[test]
    fn test_render_partial_batch() {
        let out = render(|r| r.render_partial_batch(Some(&encoded())).unwrap());
        assert!(out.starts_with("Partial batch: \naGVsbG8=\n"));
    }

    #[test]
    fn test_render_clients() {
        let configs = vec![ClientConfig::default()];
        let out = render(|r| r.render_clients(&configs).unwrap());

        assert!(out.starts_with("Clients configured:\n----------------------\n{\n"));
        assert!(out.contains("\"url\": \"http://localhost:3100/loki/api/v1/push\""));
        assert!(out.ends_with("}\n"));
    }

    #[test]
    fn test_color_wraps_text_only() {
        let mut renderer = Renderer::new(Vec::new(), RenderConfig { enable_color: true });
        renderer.render_single(&entry(), None).unwrap();
        let out = String::from_utf8(renderer.into_inner().unwrap()).unwrap();

        assert!(out.contains("\u{1b}["));
        assert!(out.contains("\tl1\n"));
    }
}
