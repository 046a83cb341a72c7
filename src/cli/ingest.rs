//! CLI `ingest` command — route a JSON-lines file of classified links.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tokio::task::{JoinError, JoinSet};

use linkmem::classification::ClassifiedLink;
use linkmem::config::LinkmemConfig;
use linkmem::embedding;
use linkmem::router::{RouteOutcome, TopicRouter};
use linkmem::topics::types::RouteAction;

pub struct IngestOptions {
    pub workers: usize,
    pub append: bool,
    pub threshold: Option<f64>,
    pub dry_run: bool,
}

#[derive(Default)]
struct Tally {
    created: u64,
    appended: u64,
    failed: u64,
}

type RouteResult = (String, linkmem::Result<RouteOutcome>);

/// One non-blank input line, numbered from 1.
type ParsedLine = (usize, serde_json::Result<ClassifiedLink>);

/// Parse every non-blank line of a JSON-lines file.
fn parse_lines(text: &str) -> Vec<ParsedLine> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| (index + 1, serde_json::from_str(line)))
        .collect()
}

/// Route every line of `file`. A document that fails is reported as an error
/// marker on stdout and the batch continues; any other failure stops it.
pub async fn ingest(mut config: LinkmemConfig, file: &Path, options: IngestOptions) -> Result<()> {
    if let Some(threshold) = options.threshold {
        config.routing.similarity_threshold = threshold;
    }

    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let lines = parse_lines(&text);
    if lines.is_empty() {
        println!("No links to ingest.");
        return Ok(());
    }

    if options.dry_run {
        dry_run(&lines);
        return Ok(());
    }

    let provider = embedding::create_provider(&config.embedding)
        .context("failed to create embedding provider")?;
    let router = TopicRouter::open(&config, provider).context("failed to open topic router")?;

    println!(
        "Routing {} links into {} (threshold {})...",
        lines.len(),
        router.topics_dir().display(),
        config.routing.similarity_threshold
    );

    let pb = ProgressBar::new(lines.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")
            .expect("valid template")
            .progress_chars("##-"),
    );

    let workers = options.workers.max(1);
    let mut tasks: JoinSet<RouteResult> = JoinSet::new();
    let mut tally = Tally::default();
    let mut fatal: Option<linkmem::Error> = None;

    for (line_no, parsed) in lines {
        if fatal.is_some() {
            break;
        }

        let link = match parsed {
            Ok(link) => link,
            Err(e) => {
                tally.failed += 1;
                report(&pb, &format!("line {line_no}"), &e.to_string());
                pb.inc(1);
                continue;
            }
        };

        while tasks.len() >= workers {
            if let Some(joined) = tasks.join_next().await {
                record(joined, &pb, &mut tally, &mut fatal)?;
            }
        }

        let url = link.url.clone();
        let mut request = link.into_request();
        request.append = options.append;
        let router = router.clone();
        tasks.spawn(async move { (url, router.route(request).await) });
    }

    while let Some(joined) = tasks.join_next().await {
        record(joined, &pb, &mut tally, &mut fatal)?;
    }
    pb.finish_and_clear();

    println!(
        "Routed {} links: {} appended, {} new topics, {} failed.",
        tally.created + tally.appended,
        tally.appended,
        tally.created,
        tally.failed
    );

    match fatal {
        Some(e) => Err(e).context("ingest stopped after a fatal routing error"),
        None => Ok(()),
    }
}

fn record(
    joined: std::result::Result<RouteResult, JoinError>,
    pb: &ProgressBar,
    tally: &mut Tally,
    fatal: &mut Option<linkmem::Error>,
) -> Result<()> {
    let (url, result) = joined.context("routing task panicked")?;
    pb.inc(1);
    match result {
        Ok(outcome) => match outcome.action {
            RouteAction::Created => tally.created += 1,
            RouteAction::Appended => tally.appended += 1,
        },
        Err(e) => {
            tally.failed += 1;
            report(pb, &url, &e.to_string());
            if !e.is_document_level() && fatal.is_none() {
                tracing::error!(url = %url, error = %e, "{}, stopping ingest", stop_reason(&e));
                *fatal = Some(e);
            }
        }
    }
    Ok(())
}

fn stop_reason(e: &linkmem::Error) -> &'static str {
    if e.is_storage() {
        "storage failure"
    } else {
        "fatal routing error"
    }
}

/// Print what would be routed without opening the index or the provider.
fn dry_run(lines: &[ParsedLine]) {
    let mut valid = 0;
    for (line_no, parsed) in lines {
        match parsed {
            Ok(link) => {
                valid += 1;
                println!("  [dry run] would route: {}", link.url);
            }
            Err(e) => {
                let url = format!("line {line_no}");
                println!("{}", serde_json::json!({ "url": url, "error": e.to_string() }));
            }
        }
    }
    println!(
        "Dry run: {valid} links parsed, {} invalid; nothing written.",
        lines.len() - valid
    );
}

/// Error marker: one JSON object per failed document.
fn report(pb: &ProgressBar, url: &str, error: &str) {
    let marker = serde_json::json!({ "url": url, "error": error });
    pb.suspend(|| println!("{marker}"));
}
