//! Artifact and catalog fetching.
//!
//! The engine talks to the network through the [`Fetcher`] trait so tests
//! can substitute local fakes. [`HttpFetcher`] is the production
//! implementation:
//!
//! - Blocking HTTP(S) downloads with a progress line on stderr
//! - Automatic retry with exponential backoff (3 attempts)
//! - Downloads to a `.part` file, then renames on success
//! - `file://` URIs and bare local paths are copied instead of downloaded

use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use rand::Rng;

use super::Result;
use crate::errors::VodkaError;

/// Fetches a URI to a local file.
pub trait Fetcher {
    /// Fetches `uri` and stores it at `dest`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::DownloadFailed`] on transport failure. `dest`
    /// is never left half-written.
    fn fetch(&self, uri: &str, dest: &Path) -> Result<()>;
}

/// Maximum number of download attempts.
const MAX_RETRIES: u32 = 3;

/// Base delay between retries in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Minimum interval between progress updates in milliseconds.
const PROGRESS_INTERVAL_MS: u128 = 250;

/// Fetcher backed by a blocking `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    progress: bool,
}

impl HttpFetcher {
    /// Creates a fetcher that prints download progress to stderr.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("vodka/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            progress: true,
        })
    }

    /// Disables the progress line.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.progress = false;
        self
    }

    fn fetch_inner(&self, uri: &str, dest: &Path) -> anyhow::Result<()> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        if let Some(local) = local_source(uri) {
            tracing::debug!("Copying {} to {}", local.display(), dest.display());
            let part = part_path(dest);
            std::fs::copy(&local, &part)
                .with_context(|| format!("Failed to copy {}", local.display()))?;
            return std::fs::rename(&part, dest).with_context(|| {
                format!("Failed to rename {} to {}", part.display(), dest.display())
            });
        }

        download_file(&self.client, uri, dest, self.progress)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, uri: &str, dest: &Path) -> Result<()> {
        self.fetch_inner(uri, dest)
            .map_err(|e| VodkaError::download_failed(uri, format!("{e:#}")))
    }
}

/// Returns the local path for `file://` URIs and plain filesystem paths.
fn local_source(uri: &str) -> Option<PathBuf> {
    if let Some(rest) = uri.strip_prefix("file://") {
        return Some(PathBuf::from(rest));
    }
    if uri.contains("://") {
        return None;
    }
    Some(PathBuf::from(uri))
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_else(|| OsString::from("download"));
    name.push(".part");
    dest.with_file_name(name)
}

/// Downloads `url` to `dest` with retries.
fn download_file(
    client: &reqwest::blocking::Client,
    url: &str,
    dest: &Path,
    progress: bool,
) -> anyhow::Result<()> {
    let temp_path = part_path(dest);
    let mut last_error = None;

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            let delay = calculate_retry_delay(attempt);
            tracing::warn!(
                "Retrying download of {url} (attempt {}/{MAX_RETRIES})",
                attempt + 1
            );
            std::thread::sleep(Duration::from_millis(delay));
        }

        match download_with_progress(client, url, &temp_path, progress) {
            Ok(()) => {
                std::fs::rename(&temp_path, dest).with_context(|| {
                    format!(
                        "Failed to rename {} to {}",
                        temp_path.display(),
                        dest.display()
                    )
                })?;
                return Ok(());
            }
            Err(e) => {
                tracing::debug!("Download attempt {} failed: {e:#}", attempt + 1);
                last_error = Some(e);
                let _ = std::fs::remove_file(&temp_path);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| anyhow::anyhow!("Download failed after {MAX_RETRIES} attempts")))
}

fn download_with_progress(
    client: &reqwest::blocking::Client,
    url: &str,
    dest: &Path,
    progress: bool,
) -> anyhow::Result<()> {
    let mut response = client
        .get(url)
        .send()
        .with_context(|| format!("Failed to connect to {url}"))?;

    if !response.status().is_success() {
        bail!("HTTP error {}: {url}", response.status());
    }

    let mut line = progress.then(|| ProgressLine::new(response.content_length()));
    let mut file = std::fs::File::create(dest)
        .with_context(|| format!("Failed to create file: {}", dest.display()))?;
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let read = response
            .read(&mut buffer)
            .with_context(|| format!("Failed to read response body from {url}"))?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])
            .with_context(|| format!("Failed to write to {}", dest.display()))?;
        if let Some(line) = &mut line {
            line.advance(read as u64);
        }
    }

    file.flush()
        .with_context(|| format!("Failed to flush {}", dest.display()))?;
    if let Some(line) = &mut line {
        line.finish();
    }
    Ok(())
}

/// Single-line download progress on stderr, redrawn at most every
/// [`PROGRESS_INTERVAL_MS`].
struct ProgressLine {
    total: Option<u64>,
    received: u64,
    started: Instant,
    drawn: Instant,
}

impl ProgressLine {
    fn new(total: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            total,
            received: 0,
            started: now,
            drawn: now,
        }
    }

    fn advance(&mut self, bytes: u64) {
        self.received += bytes;
        if self.drawn.elapsed().as_millis() >= PROGRESS_INTERVAL_MS {
            self.draw();
            self.drawn = Instant::now();
        }
    }

    fn finish(&mut self) {
        self.draw();
        eprintln!();
    }

    #[allow(clippy::cast_precision_loss)]
    fn draw(&self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.received as f64 / elapsed
        } else {
            0.0
        };
        let done = human_size(self.received as f64, "B");
        let speed = human_size(rate, "B/s");
        let mut stderr = std::io::stderr();
        let _ = match self.total.filter(|total| *total > 0) {
            Some(total) => write!(
                stderr,
                "\r{done} / {} ({}%) {speed}     ",
                human_size(total as f64, "B"),
                self.received * 100 / total
            ),
            None => write!(stderr, "\r{done} {speed}     "),
        };
        let _ = stderr.flush();
    }
}

/// Formats a quantity of bytes with a 1024-based prefix, e.g. `2.00 KB`.
fn human_size(value: f64, unit: &str) -> String {
    const STEP: f64 = 1024.0;
    if value < STEP {
        return format!("{value:.0} {unit}");
    }
    let mut scaled = value / STEP;
    for prefix in ["K", "M"] {
        if scaled < STEP {
            return format!("{scaled:.2} {prefix}{unit}");
        }
        scaled /= STEP;
    }
    format!("{scaled:.2} G{unit}")
}

/// Calculates the retry delay with exponential backoff and jitter.
///
/// The delay doubles with each attempt (1s, 2s, 4s) with +/- 25% jitter.
fn calculate_retry_delay(attempt: u32) -> u64 {
    let base_delay = BASE_RETRY_DELAY_MS * 2u64.pow(attempt);
    let jitter_range = base_delay / 4;
    let jitter = rand::rng().random_range(0..=jitter_range * 2);
    base_delay - jitter_range + jitter
}
