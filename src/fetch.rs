use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{StatusCode, Url};
use tracing::{info, warn};

/// Timetable pages fetched when none are given on the command line.
/// LE = Lassonde School of Engineering, SC = Faculty of Science.
pub const TARGET_URLS: &[&str] = &[
    "https://apps1.sis.yorku.ca/WebObjects/cdm.woa/Contents/WebServerResources/FW2024LE.html",
    "https://apps1.sis.yorku.ca/WebObjects/cdm.woa/Contents/WebServerResources/FW2024SC.html",
];

pub const COOKIE_ENV: &str = "TIMETABLE_COOKIE";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_secs(2);

/// One rendered page and where it came from.
pub struct Document {
    pub source: String,
    pub html: String,
}

/// Yields the rendered HTML of one target page.
pub trait Fetch {
    fn fetch(&self, target: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Fetches pages over HTTP, sending the session cookie of an earlier login.
pub struct HttpFetcher {
    client: reqwest::Client,
    /// First retry delay, doubled on each further attempt.
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new(cookie: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = cookie {
            let mut value = HeaderValue::from_str(cookie.trim())
                .context("Session cookie is not a valid header value")?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpFetcher {
            client,
            backoff: BASE_BACKOFF,
        })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            let resp = self
                .client
                .get(url)
                .send()
                .await
                .with_context(|| format!("Failed to fetch {}", url))?;
            let status = resp.status();

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < MAX_RETRIES {
                let backoff = self.backoff * 2u32.pow(attempt);
                warn!(
                    "HTTP {} on {} (attempt {}/{}), backing off {:.1}s",
                    status,
                    url,
                    attempt + 1,
                    MAX_RETRIES,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            if !status.is_success() {
                bail!("HTTP {} for {}", status, url);
            }
            if is_login_redirect(url, resp.url()) {
                bail!(
                    "{} redirected to {}; the session is not logged in",
                    url,
                    resp.url()
                );
            }
            return resp
                .text()
                .await
                .with_context(|| format!("Failed to read body of {}", url));
        }
    }
}

/// Reads pages saved from a browser session.
pub struct FileFetcher;

impl Fetch for FileFetcher {
    async fn fetch(&self, path: &str) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path))
    }
}

/// Fetch every target in order. Any failure aborts the whole run.
pub async fn fetch_all<F: Fetch>(fetcher: &F, targets: &[String]) -> Result<Vec<Document>> {
    let pb = ProgressBar::new(targets.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut docs = Vec::with_capacity(targets.len());
    for target in targets {
        pb.set_message(target.clone());
        info!("Fetching: {}", target);
        let html = fetcher.fetch(target).await?;
        docs.push(Document {
            source: target.clone(),
            html,
        });
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(docs)
}

/// Gives the operator time to finish the single sign-on in a browser and
/// store the session cookie before any page is requested.
pub async fn wait_for_login(url: &str, wait: Duration) -> Result<()> {
    if wait.is_zero() {
        return Ok(());
    }

    eprintln!("Log in at {} and save the session cookie.", url);
    eprintln!("Continuing in {}s...", wait.as_secs());

    let pb = ProgressBar::new(wait.as_secs());
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Waiting for login [{bar:40}] {pos}/{len}s")?
            .progress_chars("=> "),
    );
    for _ in 0..wait.as_secs() {
        tokio::time::sleep(Duration::from_secs(1)).await;
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(())
}

/// Session cookie from `file`, or from `TIMETABLE_COOKIE` when no file is given.
pub fn load_cookie(file: Option<&Path>) -> Result<Option<String>> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cookie file {}", path.display()))?,
        None => std::env::var(COOKIE_ENV).unwrap_or_default(),
    };
    let cookie = raw.trim();
    Ok((!cookie.is_empty()).then(|| cookie.to_string()))
}

/// True when the response came back from another host, i.e. the login page.
fn is_login_redirect(requested: &str, landed: &Url) -> bool {
    match Url::parse(requested) {
        Ok(req) => req.host_str() != landed.host_str(),
        Err(_) => false,
    }
}
