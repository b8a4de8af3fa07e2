//! CLI entry point: loads the stop table, fetches the GTFS-RT feed and prints
//! the enriched JSON snapshot, once or on a fixed interval.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use chrono_tz::Tz;
use clap::{ArgGroup, Parser};
use gtfs_rt_snapshot::{
    directory::StopDirectory,
    fetch::{
        BasicClient, FeedSource, HttpClient,
        auth::{ApiKey, UrlParam},
    },
    output::{OutputSink, Report},
    pipeline::SnapshotJob,
    timestamp::TimeFormatter,
};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const DEFAULT_FEED: &str = "https://proxy.transport.data.gouv.fr/resource/ilevia-lille-gtfs-rt";

#[derive(Parser)]
#[command(name = "gtfs_rt_snapshot")]
#[command(about = "Prints in-progress trips from a GTFS-RT feed, enriched with stop names", long_about = None)]
#[command(group(ArgGroup::new("key_placement").args(["api_key_header", "api_key_param"])))]
struct Cli {
    /// Feed URL, or path to a captured protobuf payload
    #[arg(long, env = "GTFS_RT_FEED", default_value = DEFAULT_FEED)]
    feed: String,

    /// CSV table with stop_id, stop_name, stop_desc and geom columns
    #[arg(long, env = "GTFS_STOPS_PATH", default_value = "ilevia_arret_point.csv")]
    stops: PathBuf,

    /// Field separator of the stop table
    #[arg(long, default_value = ",", value_parser = parse_delimiter)]
    stops_delimiter: u8,

    /// IANA zone for arrival/departure times (host local time when unset)
    #[arg(long, env = "GTFS_TIMEZONE", value_parser = parse_timezone)]
    timezone: Option<Tz>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Write the JSON document to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print the JSON
    #[arg(long, default_value_t = false)]
    pretty: bool,

    /// Re-fetch every N seconds instead of running once
    #[arg(short, long)]
    interval: Option<u64>,

    /// API key for feeds that require authentication
    #[arg(long, env = "GTFS_RT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Send the API key in this header (default: Authorization: Bearer)
    #[arg(long, requires = "api_key")]
    api_key_header: Option<String>,

    /// Send the API key as this query parameter
    #[arg(long, requires = "api_key")]
    api_key_param: Option<String>,
}

fn parse_delimiter(s: &str) -> Result<u8, String> {
    match s.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(format!("expected a single ASCII character, got {s:?}")),
    }
}

fn parse_timezone(s: &str) -> Result<Tz, String> {
    s.parse::<Tz>().map_err(|e| e.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_tracing()?;

    let cli = Cli::parse();
    let sink = match &cli.output {
        Some(path) => OutputSink::File(path.clone()),
        None => OutputSink::Stdout,
    };

    let directory = match StopDirectory::load(&cli.stops, cli.stops_delimiter) {
        Ok(directory) => directory,
        Err(e) => {
            error!(error = %e, path = %cli.stops.display(), "Stop table could not be loaded");
            sink.write(&Report::from(e), cli.pretty)?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let formatter = cli.timezone.map_or(TimeFormatter::Local, TimeFormatter::Zone);
    let source = FeedSource::parse(&cli.feed);
    let client = match build_client(&cli) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "HTTP client could not be configured");
            sink.write(&client_error_report(&e), cli.pretty)?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let job = SnapshotJob::new(client, source, directory, formatter);
    info!(stops = job.directory().len(), feed = %cli.feed, "Starting");

    match cli.interval {
        Some(secs) => {
            info!(interval_secs = secs, "Polling. Press Ctrl+C to stop.");
            job.poll(&sink, cli.pretty, Duration::from_secs(secs.max(1)))
                .await?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            let report = job.run(&sink, cli.pretty).await?;
            Ok(if report.is_error() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

/// Wraps the base client according to how the API key must be sent.
fn build_client(cli: &Cli) -> Result<Box<dyn HttpClient>> {
    let base = BasicClient::with_timeout(Duration::from_secs(cli.timeout))?;

    let Some(key) = cli.api_key.as_deref() else {
        return Ok(Box::new(base));
    };

    let client: Box<dyn HttpClient> = match (&cli.api_key_param, &cli.api_key_header) {
        (Some(param), _) => Box::new(UrlParam {
            inner: base,
            param_name: param.clone(),
            key: key.to_string(),
        }),
        (None, Some(header)) => Box::new(ApiKey::new(base, header, key)?),
        (None, None) => Box::new(ApiKey::bearer(base, key)?),
    };
    Ok(client)
}

fn client_error_report(err: &anyhow::Error) -> Report {
    Report::error(format!("Erreur de configuration du client HTTP : {err}"))
}

/// Daily-rolling appender for `log_file_path`. Fails instead of panicking when
/// the log directory cannot be created.
fn rolling_file_appender(log_file_path: &str) -> Result<RollingFileAppender, InitError> {
    let log_dir = Path::new(log_file_path)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_rt_snapshot.log"));

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(log_file_name.to_string_lossy())
        .build(log_dir)
}

/// Colored stderr logs plus a daily-rolling JSON log file. stdout carries the
/// JSON output only. Without a usable log directory only stderr is kept.
fn init_tracing() -> Result<Option<WorkerGuard>> {
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/gtfs_rt_snapshot.log".to_string());

    let (non_blocking_file, file_guard, appender_error) =
        match rolling_file_appender(&log_file_path) {
            Ok(appender) => {
                let (writer, guard) = tracing_appender::non_blocking(appender);
                (Some(writer), Some(guard), None)
            }
            Err(e) => (None, None, Some(e)),
        };

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = match non_blocking_file {
        Some(writer) => Some(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(writer)
                .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    if let Some(e) = appender_error {
        warn!(error = %e, path = %log_file_path, "File logging disabled");
    }

    Ok(file_guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(";"), Ok(b';'));
        assert!(parse_delimiter(";;").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("Europe/Paris"), Ok(chrono_tz::Europe::Paris));
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_uncreatable_log_directory_is_an_error() {
        // A directory cannot be created below a regular file.
        let blocker = std::env::temp_dir().join("gtfs_rt_snapshot_log_blocker");
        std::fs::write(&blocker, b"").unwrap();
        let log_path = blocker.join("logs").join("app.log");

        assert!(rolling_file_appender(log_path.to_str().unwrap()).is_err());

        std::fs::remove_file(&blocker).unwrap();
    }

    #[test]
    fn test_log_directory_is_created() {
        let dir = std::env::temp_dir().join("gtfs_rt_snapshot_log_dir");
        let _ = std::fs::remove_dir_all(&dir);
        let log_path = dir.join("app.log");

        assert!(rolling_file_appender(log_path.to_str().unwrap()).is_ok());
        assert!(dir.is_dir());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_invalid_api_key_header_becomes_error_document() {
        let cli = Cli::try_parse_from([
            "gtfs_rt_snapshot",
            "--api-key",
            "k",
            "--api-key-header",
            "bad header",
        ])
        .unwrap();

        let err = build_client(&cli).err().expect("header name must be rejected");
        let report = client_error_report(&err);
        let text = gtfs_rt_snapshot::output::render(&report, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert!(report.is_error());
        assert!(value["error"].as_str().unwrap().contains("bad header"));
        assert!(value.get("trips").is_none());
    }

    #[test]
    fn test_valid_api_key_header_builds_client() {
        let cli = Cli::try_parse_from([
            "gtfs_rt_snapshot",
            "--api-key",
            "k",
            "--api-key-header",
            "X-Api-Key",
        ])
        .unwrap();

        assert!(build_client(&cli).is_ok());
    }

    #[test]
    fn test_api_key_placement_is_exclusive() {
        let res = Cli::try_parse_from([
            "gtfs_rt_snapshot",
            "--api-key",
            "k",
            "--api-key-header",
            "X-Key",
            "--api-key-param",
            "key",
        ]);
        assert!(res.is_err());
    }
}
