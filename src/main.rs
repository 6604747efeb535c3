mod fetch;
mod model;
mod parser;
mod sink;
mod summary;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use fetch::{Document, FileFetcher, HttpFetcher};
use model::Course;
use parser::courses::ParseReport;
use parser::DialectChoice;
use sink::DEFAULT_OUTPUT;

const LOGIN_WAIT_SECS: u64 = 30;

#[derive(Parser)]
#[command(name = "timetable_scraper", about = "Course timetable pages to JSON")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for login, fetch the timetable pages and save their courses
    Scrape {
        /// Pages to fetch (default: the LE and SC FW2024 timetables)
        urls: Vec<String>,
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,
        #[arg(short, long, value_enum, default_value_t = DialectChoice::Structural)]
        dialect: DialectChoice,
        /// Seconds to wait for the browser login before fetching
        #[arg(long, default_value_t = LOGIN_WAIT_SECS)]
        login_wait: u64,
        /// File holding the session cookie (default: $TIMETABLE_COOKIE)
        #[arg(long)]
        cookie_file: Option<PathBuf>,
    },
    /// Parse timetable pages saved from a browser
    Parse {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,
        #[arg(short, long, value_enum, default_value_t = DialectChoice::Structural)]
        dialect: DialectChoice,
    },
    /// Show counts for a saved course file
    Stats {
        #[arg(default_value = DEFAULT_OUTPUT)]
        input: PathBuf,
    },
    /// Courses overview table
    Overview {
        #[arg(default_value = DEFAULT_OUTPUT)]
        input: PathBuf,
        /// Filter by department (e.g. EECS)
        #[arg(short, long)]
        dept: Option<String>,
        /// Filter by term (F, W, Y, ...)
        #[arg(short, long)]
        term: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scrape {
            urls,
            output,
            dialect,
            login_wait,
            cookie_file,
        } => {
            let urls: Vec<String> = if urls.is_empty() {
                fetch::TARGET_URLS.iter().map(|u| u.to_string()).collect()
            } else {
                urls
            };

            fetch::wait_for_login(&urls[0], Duration::from_secs(login_wait)).await?;
            let cookie = fetch::load_cookie(cookie_file.as_deref())?;
            if cookie.is_none() {
                warn!(
                    "No session cookie (use --cookie-file or ${}); pages behind the login will fail",
                    fetch::COOKIE_ENV
                );
            }

            let fetcher = HttpFetcher::new(cookie.as_deref())?;
            let docs = fetch::fetch_all(&fetcher, &urls).await?;
            let (courses, report) = process_documents(&docs, dialect);
            sink::write_courses(&output, &courses)?;
            print_saved(&output, &courses, &report);
            Ok(())
        }
        Commands::Parse {
            files,
            output,
            dialect,
        } => {
            let targets: Vec<String> = files
                .iter()
                .map(|f| f.to_string_lossy().into_owned())
                .collect();
            let docs = fetch::fetch_all(&FileFetcher, &targets).await?;
            let (courses, report) = process_documents(&docs, dialect);
            sink::write_courses(&output, &courses)?;
            print_saved(&output, &courses, &report);
            Ok(())
        }
        Commands::Stats { input } => {
            let courses = sink::read_courses(&input)?;
            let s = summary::stats(&courses);
            println!("Courses:          {}", s.courses);
            println!("  no meetings:    {}", s.without_meetings);
            println!("Meetings:         {}", s.meetings);
            for (kind, n) in &s.by_type {
                println!("  {:<14}  {}", kind, n);
            }
            println!("Non-numeric Meet: {}", s.raw_meet);
            println!("Non-numeric Dur:  {}", s.raw_duration);
            Ok(())
        }
        Commands::Overview {
            input,
            dept,
            term,
            limit,
        } => {
            let courses = sink::read_courses(&input)?;
            let rows = summary::filter(&courses, dept.as_deref(), term.as_deref(), limit);
            if rows.is_empty() {
                println!("No courses found.");
                return Ok(());
            }

            println!(
                "{:>4} | {:<3} | {:<5} | {:<4} | {:<6} | {:<40} | {:>5}",
                "#", "Fac", "Dept", "Term", "ID", "Course", "Hours"
            );
            println!("{}", "-".repeat(85));

            for (i, c) in rows.iter().enumerate() {
                println!(
                    "{:>4} | {:<3} | {:<5} | {:<4} | {:<6} | {:<40} | {:>5}",
                    i + 1,
                    c.faculty,
                    c.department,
                    c.term,
                    c.course_id.as_deref().unwrap_or("-"),
                    truncate(&c.name, 40),
                    c.meetings.len()
                );
            }

            println!("\n{} of {} courses", rows.len(), courses.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Parse every document (in parallel) and concatenate the courses in input order.
fn process_documents(docs: &[Document], dialect: DialectChoice) -> (Vec<Course>, ParseReport) {
    use rayon::prelude::*;

    let parsed: Vec<_> = docs
        .par_iter()
        .map(|doc| (doc.source.as_str(), parser::parse_document(&doc.html, dialect)))
        .collect();

    let mut courses = Vec::new();
    let mut report = ParseReport::default();
    for (source, doc) in parsed {
        info!("{}: {} courses ({:?} layout)", source, doc.courses.len(), doc.dialect);
        courses.extend(doc.courses);
        report.merge(doc.report);
    }
    (courses, report)
}

fn print_saved(output: &std::path::Path, courses: &[Course], report: &ParseReport) {
    if output == std::path::Path::new("-") {
        return;
    }
    println!(
        "Saved {} courses, {} meetings to '{}' ({} rows, {} in meeting tables, {} skipped).",
        courses.len(),
        report.meetings,
        output.display(),
        report.rows,
        report.sub_rows,
        report.anomalies.len() + report.orphaned,
    );
    if report.orphaned > 0 {
        println!("  before any course header: {}", report.orphaned);
    }
    for (reason, rows) in report.breakdown() {
        let shown: Vec<String> = rows.iter().take(10).map(|r| r.to_string()).collect();
        let more = if rows.len() > 10 { ", ..." } else { "" };
        println!("  {}: {} (rows {}{})", reason, rows.len(), shown.join(", "), more);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max - 3).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
