use anyhow::{Context, Result};
use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    EnvFilter, Layer,
};

/// Target used for connection lifecycle events shown on the console.
pub const WALLET_EVENT_TARGET: &str = "wallet_event";

/// Install console and hourly file logging.
///
/// Console shows `wallet_event` at INFO and everything else at ERROR unless
/// `RUST_LOG` says otherwise. The returned guard must be kept alive.
pub fn setup_logger() -> Option<WorkerGuard> {
    std::fs::create_dir_all("logs").ok();

    let file_appender = tracing_appender::rolling::hourly("logs", "wallet");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter = EnvFilter::new(format!("{}=info,warn", WALLET_EVENT_TARGET));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}=info,error", WALLET_EVENT_TARGET)));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    if tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .is_err()
    {
        return None;
    }

    Some(guard)
}

pub fn setup_logger_with_file(log_path: &str) -> Result<WorkerGuard> {
    let file = File::create(log_path).context("Failed to create log file")?;
    let (non_blocking, guard) = tracing_appender::non_blocking(BufWriter::new(file));

    let subscriber = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .event_format(FileFormatter),
    );

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global subscriber")?;

    Ok(guard)
}

// --- Formatters ---

/// Collects the message plus any structured fields as `key=value`.
#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<String>,
}

impl tracing::field::Visit for EventVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }
}

impl EventVisitor {
    fn render(&self) -> String {
        if self.fields.is_empty() {
            self.message.clone()
        } else {
            format!("{} [{}]", self.message, self.fields.join(" "))
        }
    }
}

/// Highlight lifecycle keywords. `DISCONNECTED` is matched before
/// `CONNECTED`, which it contains.
fn colorize(msg: &str) -> String {
    let red = Style::new().fg(Color::LightRed).bold();
    let green = Style::new().fg(Color::LightGreen).bold();

    if msg.contains("DISCONNECTED") {
        msg.replace("DISCONNECTED", &red.paint("DISCONNECTED").to_string())
    } else if msg.contains("CONNECTED") {
        msg.replace("CONNECTED", &green.paint("CONNECTED").to_string())
    } else if msg.contains("FAILED") {
        msg.replace("FAILED", &red.paint("FAILED").to_string())
    } else {
        msg.to_string()
    }
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        writeln!(writer, "{}", colorize(&visitor.render()))
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let metadata = event.metadata();

        write!(
            writer,
            "{} [{}] {}: ",
            timestamp,
            metadata.level(),
            metadata.target()
        )?;

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        writeln!(writer, "{}", visitor.render())
    }
}
