//! Output formatting for campaign events and history queries.
//!
//! The [`Emitter`] trait defines callbacks for each stage of a run.
//! Two implementations are provided:
//! - [`HumanReadableEmitter`]: progress lines and aligned tables for a terminal.
//! - [`JsonEmitter`]: one JSON object per line, suitable for machine consumption.

use std::io::Write;

use serde::Serialize;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::info;
use crate::result::{HistoryRecord, ServerStats, SpeedTestResult};
use crate::summary::Summary;

#[derive(Serialize)]
#[serde(tag = "type")]
enum Event<'a> {
    Starting { server: &'a str, url: &'a str },
    Error { server: &'a str, error: &'a str },
    Result { result: &'a SpeedTestResult },
    Saved { id: u64, server: &'a str },
    Summary { summary: &'a Summary },
    History { records: &'a [HistoryRecord] },
    Stats { stats: &'a ServerStats },
}

/// Callbacks for campaign and query events.
pub trait Emitter {
    /// Called before a server is tested.
    fn on_starting(&mut self, server: &ServerConfig) -> Result<()>;
    /// Called when a server fails entirely or its result cannot be saved.
    fn on_error(&mut self, server: &str, err: &str) -> Result<()>;
    /// Called with each server's result record.
    fn on_result(&mut self, result: &SpeedTestResult) -> Result<()>;
    /// Called after a result was persisted.
    fn on_saved(&mut self, record: &HistoryRecord) -> Result<()>;
    /// Called after all servers were tested.
    fn on_summary(&mut self, s: &Summary) -> Result<()>;
    /// Called with the answer to a history query.
    fn on_history(&mut self, records: &[HistoryRecord]) -> Result<()>;
    /// Called with the answer to a stats query.
    fn on_stats(&mut self, stats: &ServerStats) -> Result<()>;
}

fn value(v: Option<f64>, unit: &str) -> String {
    match v {
        Some(v) => format!("{v:>8.2} {unit}"),
        None => format!("{:>8} {unit}", "-"),
    }
}

/// Emits human-readable progress and results to a writer.
pub struct HumanReadableEmitter<W: Write> {
    out: W,
}

impl<W: Write> HumanReadableEmitter<W> {
    /// Create a new emitter writing to `out`.
    pub fn new(out: W) -> Self {
        HumanReadableEmitter { out }
    }
}

impl<W: Write> Emitter for HumanReadableEmitter<W> {
    fn on_starting(&mut self, server: &ServerConfig) -> Result<()> {
        writeln!(
            self.out,
            "testing {} ({})",
            server.display_name(),
            server.url
        )?;
        Ok(())
    }

    fn on_error(&mut self, server: &str, err: &str) -> Result<()> {
        writeln!(self.out, "{server}: {err}")?;
        Ok(())
    }

    fn on_result(&mut self, r: &SpeedTestResult) -> Result<()> {
        writeln!(self.out, "\n{:>10}: {}", "Server", r.server_name)?;
        if let Some(client) = info::processed_string(&r.server_info) {
            writeln!(self.out, "{:>10}: {client}", "Client")?;
        }
        writeln!(self.out, "{:>10}: {}", "Download", value(r.download_speed, "Mbit/s"))?;
        writeln!(self.out, "{:>10}: {}", "Upload", value(r.upload_speed, "Mbit/s"))?;
        writeln!(self.out, "{:>10}: {}", "Ping", value(r.ping, "ms"))?;
        writeln!(self.out, "{:>10}: {}", "Jitter", value(r.jitter, "ms"))?;
        for note in &r.notes {
            writeln!(self.out, "{:>10}: {note}", "Note")?;
        }
        for err in &r.errors {
            writeln!(self.out, "{:>10}: {err}", "Error")?;
        }
        Ok(())
    }

    fn on_saved(&mut self, record: &HistoryRecord) -> Result<()> {
        writeln!(self.out, "{:>10}: #{}", "Saved", record.id)?;
        Ok(())
    }

    fn on_summary(&mut self, s: &Summary) -> Result<()> {
        writeln!(
            self.out,
            "\n{} tested, {} saved, {} failed",
            s.tested, s.saved, s.failed
        )?;
        Ok(())
    }

    fn on_history(&mut self, records: &[HistoryRecord]) -> Result<()> {
        if records.is_empty() {
            writeln!(self.out, "no results")?;
            return Ok(());
        }
        writeln!(
            self.out,
            "{:>6}  {:<20}  {:<24}  {:>15}  {:>15}  {:>11}  {:>11}",
            "ID", "Time", "Server", "Download", "Upload", "Ping", "Jitter"
        )?;
        for record in records {
            let r = &record.result;
            writeln!(
                self.out,
                "{:>6}  {:<20}  {:<24}  {}  {}  {}  {}",
                record.id,
                record.test_timestamp.format("%Y-%m-%d %H:%M:%S"),
                r.server_name,
                value(r.download_speed, "Mbit/s"),
                value(r.upload_speed, "Mbit/s"),
                value(r.ping, "ms"),
                value(r.jitter, "ms"),
            )?;
        }
        Ok(())
    }

    fn on_stats(&mut self, s: &ServerStats) -> Result<()> {
        writeln!(self.out, "{:>10}: {}", "Server", s.server_url)?;
        writeln!(self.out, "{:>10}: {}", "Tests", s.count)?;
        writeln!(self.out, "{:>10}: {}", "Download", value(s.avg_download, "Mbit/s"))?;
        writeln!(self.out, "{:>10}: {}", "Upload", value(s.avg_upload, "Mbit/s"))?;
        writeln!(self.out, "{:>10}: {}", "Ping", value(s.avg_ping, "ms"))?;
        writeln!(self.out, "{:>10}: {}", "Jitter", value(s.avg_jitter, "ms"))?;
        Ok(())
    }
}

/// Emits one JSON object per line for each event.
pub struct JsonEmitter<W: Write> {
    out: W,
}

impl<W: Write> JsonEmitter<W> {
    /// Create a new JSON emitter writing to `out`.
    pub fn new(out: W) -> Self {
        JsonEmitter { out }
    }

    fn emit(&mut self, event: &Event) -> Result<()> {
        let json = serde_json::to_string(event)?;
        writeln!(self.out, "{}", json)?;
        Ok(())
    }
}

impl<W: Write> Emitter for JsonEmitter<W> {
    fn on_starting(&mut self, server: &ServerConfig) -> Result<()> {
        self.emit(&Event::Starting {
            server: server.display_name(),
            url: &server.url,
        })
    }

    fn on_error(&mut self, server: &str, err: &str) -> Result<()> {
        self.emit(&Event::Error { server, error: err })
    }

    fn on_result(&mut self, result: &SpeedTestResult) -> Result<()> {
        self.emit(&Event::Result { result })
    }

    fn on_saved(&mut self, record: &HistoryRecord) -> Result<()> {
        self.emit(&Event::Saved {
            id: record.id,
            server: &record.result.server_name,
        })
    }

    fn on_summary(&mut self, s: &Summary) -> Result<()> {
        self.emit(&Event::Summary { summary: s })
    }

    fn on_history(&mut self, records: &[HistoryRecord]) -> Result<()> {
        self.emit(&Event::History { records })
    }

    fn on_stats(&mut self, stats: &ServerStats) -> Result<()> {
        self.emit(&Event::Stats { stats })
    }
}
