//! Presentation of scan progress and final reports

use crate::proxy::{AnonymityGrade, SpeedReport, ValidationReport};
use crate::Result;
use crossterm::style::{StyledContent, Stylize};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde_json::{Map, Value};
use std::io::{self, IsTerminal, Stdout, Write};
use tabled::{settings::Style, Table, Tabled};

/// Receives progress ticks and the final ordered reports
pub trait PresentationSink {
    fn progress(&mut self, completed: usize, total: usize);
    fn validation_report(&mut self, report: &ValidationReport) -> Result<()>;
    fn speed_report(&mut self, report: &SpeedReport) -> Result<()>;

    /// Flush anything held back until the command is done
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)";

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

#[derive(Tabled)]
struct LatencyRow {
    #[tabled(rename = "Proxy")]
    proxy: String,
    #[tabled(rename = "Ping (ms)")]
    ping: String,
    #[tabled(rename = "Anonymity")]
    anonymity: String,
}

#[derive(Tabled)]
struct SpeedRow {
    #[tabled(rename = "Proxy")]
    proxy: String,
    #[tabled(rename = "Speed (Mbps)")]
    speed: String,
}

/// Tables with optional ANSI colors, plus a progress bar per pass
pub struct ConsoleSink<W: Write> {
    out: W,
    color: bool,
    /// Draw the bar on stderr; otherwise it only tracks state
    show_progress: bool,
    progress: Option<ProgressBar>,
}

impl ConsoleSink<Stdout> {
    /// Tables on stdout, colored when attached to a terminal; progress on stderr
    pub fn stdout() -> Self {
        let out = io::stdout();
        let color = out.is_terminal();
        Self::new(out, color).with_progress(true)
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            show_progress: false,
            progress: None,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, text: String, style: fn(String) -> StyledContent<String>) -> String {
        if self.color {
            style(text).to_string()
        } else {
            text
        }
    }

    fn grade_cell(&self, grade: AnonymityGrade) -> String {
        let text = grade.to_string();
        match grade {
            AnonymityGrade::Transparent => self.paint(text, |t| t.red()),
            AnonymityGrade::Anonymous => self.paint(text, |t| t.yellow()),
            AnonymityGrade::Elite => self.paint(text, |t| t.green()),
            AnonymityGrade::Unknown => self.paint(text, |t| t.dark_grey()),
        }
    }

    /// End the current pass's bar; the next tick starts a new one
    fn close_progress(&mut self) {
        if let Some(bar) = self.progress.take() {
            bar.finish();
        }
    }

    fn write_summary(&mut self, finished: usize, total: usize, cancelled: bool) -> io::Result<()> {
        let line = if cancelled {
            self.paint(
                format!("Scan cancelled: {} of {} proxies checked.", finished, total),
                |t| t.yellow(),
            )
        } else {
            self.paint("Proxy testing finished.".to_string(), |t| t.green())
        };
        writeln!(self.out, "{}", line)
    }

    fn write_table<R: Tabled>(&mut self, rows: Vec<R>) -> io::Result<()> {
        let mut table = Table::new(rows);
        table.with(Style::ascii());
        writeln!(self.out, "{}", table)
    }
}

impl<W: Write> PresentationSink for ConsoleSink<W> {
    fn progress(&mut self, completed: usize, total: usize) {
        let show = self.show_progress;
        let bar = self.progress.get_or_insert_with(|| {
            let target = if show {
                ProgressDrawTarget::stderr()
            } else {
                ProgressDrawTarget::hidden()
            };
            let bar = ProgressBar::with_draw_target(Some(total as u64), target);
            bar.set_style(progress_style());
            bar
        });
        bar.set_length(total as u64);
        bar.set_position(completed as u64);
        if completed >= total {
            bar.finish();
        }
    }

    fn validation_report(&mut self, report: &ValidationReport) -> Result<()> {
        self.close_progress();
        let finished = report.successes.len() + report.failures.len();
        self.write_summary(finished, report.total, report.cancelled)?;
        writeln!(self.out, "    Active proxies found: {}", report.successes.len())?;
        writeln!(self.out, "    Failed proxies: {}", report.failure_count())?;

        if report.successes.is_empty() {
            writeln!(self.out, "\nNo active proxies were found.")?;
            return Ok(());
        }

        let rows: Vec<LatencyRow> = report
            .successes
            .iter()
            .map(|result| LatencyRow {
                proxy: self.paint(result.raw.clone(), |t| t.cyan()),
                ping: result
                    .latency_ms
                    .map_or_else(|| "-".to_string(), |ms| format!("{:.2}", ms)),
                anonymity: self.grade_cell(result.anonymity),
            })
            .collect();

        writeln!(self.out, "\nActive proxies (sorted by lowest ping):")?;
        self.write_table(rows)?;
        Ok(())
    }

    fn speed_report(&mut self, report: &SpeedReport) -> Result<()> {
        self.close_progress();
        self.write_summary(report.ranked.len() + report.failed, report.total, report.cancelled)?;
        writeln!(self.out, "    Speed test failures: {}", report.failed)?;

        if report.ranked.is_empty() {
            writeln!(self.out, "\nNo proxy with a successful speed test was found.")?;
            return Ok(());
        }

        let rows: Vec<SpeedRow> = report
            .ranked
            .iter()
            .map(|result| SpeedRow {
                proxy: self.paint(result.raw.clone(), |t| t.cyan()),
                speed: result
                    .throughput_mbps
                    .map_or_else(|| "-".to_string(), |mbps| format!("{:.2}", mbps)),
            })
            .collect();

        writeln!(self.out, "\nSpeed test results (sorted by highest speed):")?;
        self.write_table(rows)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.close_progress();
        self.out.flush()?;
        Ok(())
    }
}

/// Collects the reports of one command into a single JSON document.
///
/// Keys are `validation` and `speed`, present when the report was produced.
/// Progress is not printed.
pub struct JsonSink<W: Write> {
    out: W,
    document: Map<String, Value>,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            document: Map::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PresentationSink for JsonSink<W> {
    fn progress(&mut self, _completed: usize, _total: usize) {}

    fn validation_report(&mut self, report: &ValidationReport) -> Result<()> {
        self.document
            .insert("validation".to_string(), serde_json::to_value(report)?);
        Ok(())
    }

    fn speed_report(&mut self, report: &SpeedReport) -> Result<()> {
        self.document
            .insert("speed".to_string(), serde_json::to_value(report)?);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let document = Value::Object(std::mem::take(&mut self.document));
        serde_json::to_writer_pretty(&mut self.out, &document)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}
