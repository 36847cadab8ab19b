use crate::model::{DeskConfig, RecordKind, StoreEvent};
use crate::table::{render_page, SortDirection, SortKey, SortState, ViewState, DEFAULT_PAGE_SIZE};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
#[derive(Debug, Clone, PartialEq)]
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "tickerdesk",
    version,
    about = "Manage stock and broker records over a REST API, with a live table TUI"
)]
pub struct Cli {
    /// Host serving the REST API; used to build the default collection URLs
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Stocks collection URL (default: http://<host>:3000/stocks/)
    #[arg(long)]
    pub stocks_url: Option<String>,

    /// Brokers collection URL (default: https://<host>/api/brokers/)
    #[arg(long)]
    pub brokers_url: Option<String>,

    /// Collection shown first
    #[arg(long, value_enum, default_value_t = RecordKind::Stocks)]
    pub kind: RecordKind,

    /// Rows per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Initial filter text (matches id + name, case-insensitive)
    #[arg(long, default_value = "")]
    pub filter: String,

    /// Initial sort column
    #[arg(long, value_enum)]
    pub sort: Option<SortKey>,

    /// Sort descending instead of ascending
    #[arg(long)]
    pub desc: bool,

    /// Page index to show (0-based)
    #[arg(long, default_value_t = 0)]
    pub page: usize,

    /// Live price tick interval
    #[arg(long, default_value = "1s")]
    pub refresh_interval: humantime::Duration,

    /// Disable the live price simulation
    #[arg(long)]
    pub no_ticks: bool,

    /// Half-width of the random price delta applied on each tick
    #[arg(long, default_value_t = crate::ticker::DEFAULT_JITTER)]
    pub price_jitter: f64,

    /// Seed for the price simulation (reproducible ticks)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Wait before re-fetching after a successful add/edit/delete
    #[arg(long, default_value = "500ms")]
    pub reload_delay: humantime::Duration,

    /// Do not re-fetch after mutations; rely on the local merge only
    #[arg(long)]
    pub no_reload: bool,

    /// Do not merge accepted mutations into the local table; wait for the re-fetch
    #[arg(long)]
    pub no_merge: bool,

    /// HTTP request timeout
    #[arg(long, default_value = "10s")]
    pub request_timeout: humantime::Duration,

    /// Print JSON page and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print text page and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Log file used in TUI mode
    #[arg(long)]
    pub log_file: Option<std::path::PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn is_non_tui(&self) -> bool {
        self.json || self.text
    }

    /// View state requested on the command line.
    pub fn initial_view(&self) -> ViewState {
        let sort = match self.sort {
            Some(key) => SortState::new(
                key,
                if self.desc {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                },
            ),
            None => SortState::default(),
        };
        ViewState {
            filter: self.filter.clone(),
            sort,
            page_index: self.page,
            page_size: self.page_size.max(1),
        }
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if args.json && args.text {
        return Err(anyhow::anyhow!("--json and --text are mutually exclusive"));
    }

    if !args.is_non_tui() {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_once(args, false).await;
        }
    }

    run_once(args.clone(), args.json).await
}

/// Build a `DeskConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> DeskConfig {
    let host = args.host.trim();
    DeskConfig {
        stocks_url: args
            .stocks_url
            .clone()
            .unwrap_or_else(|| format!("http://{host}:3000/stocks/")),
        brokers_url: args
            .brokers_url
            .clone()
            .unwrap_or_else(|| format!("https://{host}/api/brokers/")),
        initial_kind: args.kind,
        user_agent: format!("tickerdesk/{}", env!("CARGO_PKG_VERSION")),
        request_timeout: Duration::from(args.request_timeout),
        page_size: args.page_size.max(1),
        refresh_interval: (!args.no_ticks).then(|| Duration::from(args.refresh_interval)),
        reload_delay: (!args.no_reload).then(|| Duration::from(args.reload_delay)),
        merge_locally: !args.no_merge,
        price_jitter: args.price_jitter,
        seed: args.seed,
    }
}

/// Fetch the chosen collection once and render the requested page as output lines.
async fn render_once(args: &Cli, json: bool) -> Result<Vec<OutputLine>> {
    let cfg = build_config(args);
    let (event_tx, _event_rx) = mpsc::unbounded_channel::<StoreEvent>();
    let stores = crate::orchestrator::spawn_stores(&cfg, event_tx)?;
    let store = stores.get(cfg.initial_kind);

    let records = store
        .fetch_all()
        .await
        .with_context(|| format!("load {}", cfg.base_url(cfg.initial_kind)))?;

    let view = args.initial_view();
    let page = render_page(&records, &view);

    if json {
        let out = serde_json::to_string_pretty(&page)?;
        return Ok(vec![OutputLine::Stdout(out)]);
    }
    let summary = crate::text_summary::build_text_summary(cfg.initial_kind, &view, &page);
    let mut lines: Vec<OutputLine> = summary.lines.into_iter().map(OutputLine::Stdout).collect();
    lines.push(OutputLine::Stderr(format!(
        "Loaded {} record(s) from {}",
        records.len(),
        cfg.base_url(cfg.initial_kind)
    )));
    Ok(lines)
}

async fn run_once(args: Cli, json: bool) -> Result<()> {
    let lines = render_once(&args, json).await?;
    let (out_tx, out_handle) = spawn_output_writer();
    for line in lines {
        let _ = out_tx.send(line);
    }
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_host() {
        let args = Cli::parse_from(["tickerdesk", "--host", "example.org"]);
        let cfg = build_config(&args);
        assert_eq!(cfg.stocks_url, "http://example.org:3000/stocks/");
        assert_eq!(cfg.brokers_url, "https://example.org/api/brokers/");
        assert_eq!(cfg.refresh_interval, Some(Duration::from_secs(1)));
        assert_eq!(cfg.reload_delay, Some(Duration::from_millis(500)));
        assert!(cfg.merge_locally);
        assert_eq!(cfg.initial_kind, RecordKind::Stocks);
    }

    #[test]
    fn switches_disable_features() {
        let args = Cli::parse_from([
            "tickerdesk",
            "--no-ticks",
            "--no-reload",
            "--no-merge",
            "--kind",
            "brokers",
            "--brokers-url",
            "http://127.0.0.1:8080/brokers/",
        ]);
        let cfg = build_config(&args);
        assert_eq!(cfg.refresh_interval, None);
        assert_eq!(cfg.reload_delay, None);
        assert!(!cfg.merge_locally);
        assert_eq!(cfg.base_url(RecordKind::Brokers), "http://127.0.0.1:8080/brokers/");
    }

    #[test]
    fn initial_view_from_flags() {
        let args = Cli::parse_from([
            "tickerdesk", "--sort", "price", "--desc", "--filter", "a", "--page", "2",
            "--page-size", "25",
        ]);
        let view = args.initial_view();
        assert_eq!(view.sort, SortState::new(SortKey::Price, SortDirection::Desc));
        assert_eq!(view.filter, "a");
        assert_eq!(view.page_index, 2);
        assert_eq!(view.page_size, 25);
    }

    #[test]
    fn reload_delay_accepts_humantime() {
        let args = Cli::parse_from(["tickerdesk", "--reload-delay", "0ms"]);
        assert_eq!(build_config(&args).reload_delay, Some(Duration::ZERO));
    }

    mod once {
        use super::*;
        use crate::model::Record;
        use crate::test_support::{spawn_backend, Backend};
        use std::sync::atomic::Ordering;

        fn rec(id: u64, name: &str, price: &str) -> Record {
            Record {
                id,
                name: name.into(),
                price: price.into(),
                amount: "1".into(),
            }
        }

        async fn stocks_url(backend: Backend) -> String {
            spawn_backend(backend, "/stocks/").await
        }

        fn seeded() -> Backend {
            Backend::seeded(vec![
                rec(1, "Alpha", "10.0000"),
                rec(2, "Beta", "20.0000"),
                rec(3, "Gamma", "5.0000"),
            ])
        }

        #[tokio::test]
        async fn text_mode_prints_requested_page() {
            let url = stocks_url(seeded()).await;
            let args = Cli::parse_from([
                "tickerdesk", "--text", "--stocks-url", url.as_str(), "--sort", "price", "--desc",
                "--page-size", "2",
            ]);
            let lines = render_once(&args, false).await.unwrap();

            assert_eq!(
                lines[0],
                OutputLine::Stdout("Stocks: 1 - 2 of 3, sort: Price desc".into())
            );
            let body: Vec<&str> = lines
                .iter()
                .filter_map(|l| match l {
                    OutputLine::Stdout(s) => Some(s.as_str()),
                    OutputLine::Stderr(_) => None,
                })
                .collect();
            assert_eq!(body.len(), 4);
            assert!(body[2].contains("Beta"));
            assert!(body[3].contains("Alpha"));
            assert_eq!(
                lines.last(),
                Some(&OutputLine::Stderr(format!("Loaded 3 record(s) from {url}")))
            );
        }

        #[tokio::test]
        async fn json_mode_prints_page_object() {
            let url = stocks_url(seeded()).await;
            let args = Cli::parse_from([
                "tickerdesk", "--json", "--stocks-url", url.as_str(), "--filter", "a", "--page-size",
                "5",
            ]);
            let lines = render_once(&args, true).await.unwrap();
            assert_eq!(lines.len(), 1);
            let OutputLine::Stdout(out) = &lines[0] else {
                panic!("json goes to stdout");
            };
            let v: serde_json::Value = serde_json::from_str(out).unwrap();
            // "a" matches Alpha, Beta and Gamma by name
            assert_eq!(v["filtered_len"], 3);
            assert_eq!(v["page_size"], 5);
            assert_eq!(v["rows"][0]["id"], 1);
            assert_eq!(v["rows"][2]["price"], "5.0000");
        }

        #[tokio::test]
        async fn backend_failure_is_an_error() {
            let backend = seeded();
            backend.fail.store(true, Ordering::Relaxed);
            let url = stocks_url(backend).await;
            let args = Cli::parse_from(["tickerdesk", "--text", "--stocks-url", url.as_str()]);
            let err = render_once(&args, false).await.unwrap_err();
            let msg = format!("{err:#}");
            assert!(msg.starts_with(&format!("load {url}")), "{msg}");
            assert!(msg.contains("HttpErrorResponse"), "{msg}");
        }

        #[tokio::test]
        async fn json_and_text_together_are_rejected() {
            let args = Cli::parse_from(["tickerdesk", "--json", "--text"]);
            assert!(run(args).await.is_err());
        }
    }
}
