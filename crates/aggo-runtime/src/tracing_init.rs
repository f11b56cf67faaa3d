use std::fmt::{self as stdfmt, Write as _};
use std::path::Path;

use aggo_config::{LogFormat, LoggingConfig};
use anyhow::Result;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::DefaultFields;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormattedFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

// ---------------------------------------------------------------------------
// FileFields
// ---------------------------------------------------------------------------

/// Field formatter for the file layer. A distinct type keeps its cached span
/// fields apart from the stderr layer's, which may carry ANSI codes.
#[derive(Default)]
pub struct FileFields(DefaultFields);

impl<'writer> fmt::FormatFields<'writer> for FileFields {
    fn format_fields<R: tracing_subscriber::field::RecordFields>(
        &self,
        writer: fmt::format::Writer<'writer>,
        fields: R,
    ) -> stdfmt::Result {
        self.0.format_fields(writer, fields)
    }
}

// ---------------------------------------------------------------------------
// DomainFormat
// ---------------------------------------------------------------------------

/// Plain-text event format that lifts the `domain` field set by the `ag_*!`
/// macros into a `[domain]` prefix:
///
/// ```text
/// 2026-03-02T08:15:44Z  INFO [pipe] window{rule="login" generation=3}: window flushed events=4
/// ```
///
/// Events from dependencies have no domain and get no prefix.
pub struct DomainFormat {
    timer: SystemTime,
}

impl DomainFormat {
    pub fn new() -> Self {
        Self { timer: SystemTime }
    }
}

impl Default for DomainFormat {
    fn default() -> Self {
        Self::new()
    }
}

fn paint(writer: &mut fmt::format::Writer<'_>, ansi: bool, code: &str, text: impl stdfmt::Display) -> stdfmt::Result {
    if ansi {
        write!(writer, "\x1b[{code}m{text}\x1b[0m")
    } else {
        write!(writer, "{text}")
    }
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::ERROR => "31",
        Level::WARN => "33",
        Level::INFO => "32",
        Level::DEBUG => "34",
        Level::TRACE => "35",
    }
}

impl<S, N> FormatEvent<S, N> for DomainFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> fmt::FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: fmt::format::Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        let ansi = writer.has_ansi_escapes();

        if ansi {
            write!(writer, "\x1b[2m")?;
        }
        if self.timer.format_time(&mut writer).is_err() {
            write!(writer, "<unknown time>")?;
        }
        if ansi {
            write!(writer, "\x1b[0m")?;
        }

        let level = *event.metadata().level();
        write!(writer, " ")?;
        paint(&mut writer, ansi, level_color(level), format_args!("{level:>5}"))?;
        write!(writer, " ")?;

        let mut fields = SplitFields::default();
        event.record(&mut fields);

        if let Some(domain) = &fields.domain {
            paint(&mut writer, ansi, "1;36", format_args!("[{domain}]"))?;
            write!(writer, " ")?;
        }

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                paint(&mut writer, ansi, "1", span.name())?;
                write!(writer, "{{")?;
                let ext = span.extensions();
                if let Some(cached) = ext.get::<FormattedFields<N>>()
                    && !cached.is_empty()
                {
                    write!(writer, "{cached}")?;
                }
                write!(writer, "}}: ")?;
            }
        }

        write!(writer, "{}", fields.message)?;
        if !fields.rest.is_empty() {
            write!(writer, " ")?;
            paint(&mut writer, ansi, "3", fields.rest.join(" "))?;
        }
        writeln!(writer)
    }
}

/// Separates `domain` and `message` from the remaining event fields.
#[derive(Default)]
struct SplitFields {
    domain: Option<String>,
    message: String,
    rest: Vec<String>,
}

impl Visit for SplitFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "domain" => self.domain = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            name => self.rest.push(format!("{name}={value:?}")),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        match field.name() {
            "domain" => {
                let s = format!("{value:?}");
                self.domain = Some(s.trim_matches('"').to_string());
            }
            "message" => {
                write!(&mut self.message, "{value:?}").ok();
            }
            name => self.rest.push(format!("{name}={value:?}")),
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.rest.push(format!("{}={value}", field.name()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.rest.push(format!("{}={value}", field.name()));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.rest.push(format!("{}={value}", field.name()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.rest.push(format!("{}={value}", field.name()));
    }
}

// ---------------------------------------------------------------------------
// init_tracing
// ---------------------------------------------------------------------------

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if std::env::var("RUST_LOG").is_ok() {
        return Ok(EnvFilter::from_default_env());
    }
    let mut directives = config.level.clone();
    for (module, level) in &config.modules {
        write!(directives, ",{module}={level}")?;
    }
    EnvFilter::try_new(&directives)
        .map_err(|e| anyhow::anyhow!("invalid log filter '{directives}': {e}"))
}

fn stderr_layer(format: LogFormat) -> BoxedLayer {
    match format {
        // JSON keeps `domain` as a plain field for log processors to query.
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Plain => fmt::layer()
            .event_format(DomainFormat::new())
            .with_writer(std::io::stderr)
            .boxed(),
    }
}

fn file_layer<W>(format: LogFormat, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .fmt_fields(FileFields::default())
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Plain => fmt::layer()
            .event_format(DomainFormat::new())
            .fmt_fields(FileFields::default())
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
    }
}

/// Install the global `tracing` subscriber described by [`LoggingConfig`].
///
/// `RUST_LOG`, when set, replaces the configured level directives. A relative
/// `file` resolves against `base_dir`. The returned guard owns the background
/// file writer and must live until the process exits.
pub fn init_tracing(config: &LoggingConfig, base_dir: &Path) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(config)?;
    let mut layers: Vec<BoxedLayer> = vec![stderr_layer(config.format)];
    let mut guard = None;

    if let Some(file) = &config.file {
        let resolved = if file.is_relative() {
            base_dir.join(file)
        } else {
            file.clone()
        };
        let dir = resolved
            .parent()
            .ok_or_else(|| anyhow::anyhow!("log file path has no parent directory"))?;
        let name = resolved
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("log file path has no file name"))?;
        std::fs::create_dir_all(dir)?;
        let (writer, file_guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
        layers.push(file_layer(config.format, writer));
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers.with_filter(filter))
        .try_init()?;
    Ok(guard)
}
