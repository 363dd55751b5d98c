use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://cornellbigred.com";

pub const DEFAULT_CATEGORIES: &[&str] = &[
    // Men's
    "baseball",
    "mens-basketball",
    "mens-cross-country",
    "football",
    "mens-golf",
    "mens-ice-hockey",
    "mens-lacrosse",
    "rowing",
    "mens-rowing",
    "mens-soccer",
    "sprint-football",
    "mens-squash",
    "mens-swimming-and-diving",
    "mens-tennis",
    "mens-track-and-field",
    "wrestling",
    // Women's
    "womens-basketball",
    "womens-cross-country",
    "equestrian",
    "fencing",
    "field-hockey",
    "womens-gymnastics",
    "womens-ice-hockey",
    "womens-lacrosse",
    "womens-rowing",
    "womens-sailing",
    "womens-soccer",
    "softball",
    "womens-squash",
    "womens-swimming-and-diving",
    "womens-tennis",
    "womens-track-and-field",
    "womens-volleyball",
];

/// Upper bound on concurrent workers, and so on live HTTP clients, per run.
pub const MAX_WORKERS: usize = 64;

/// Latest roster year a plan may ask for.
pub const MAX_YEAR: u16 = 2100;

/// HTTP behaviour of a single fetch client.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
        }
    }
}

/// Everything needed to enumerate and schedule one run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub categories: Vec<String>,
    pub start_year: u16,
    pub end_year: u16,
    pub workers: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub progress_every: usize,
}

impl Default for RunPlan {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            start_year: 1970,
            end_year: 2025,
            workers: 5,
            min_delay: Duration::from_millis(300),
            max_delay: Duration::from_millis(600),
            progress_every: 50,
        }
    }
}

impl RunPlan {
    /// Rejects plans that cannot describe a meaningful run.
    pub fn check(&self) -> Result<()> {
        if self.categories.is_empty() {
            bail!("run plan has no categories");
        }
        if self.workers == 0 {
            bail!("run plan needs at least one worker");
        }
        if self.workers > MAX_WORKERS {
            bail!("run plan asks for {} workers, at most {} allowed", self.workers, MAX_WORKERS);
        }
        if self.end_year > MAX_YEAR {
            bail!("end year {} is past {}", self.end_year, MAX_YEAR);
        }
        if self.start_year > self.end_year {
            bail!(
                "start year {} is after end year {}",
                self.start_year,
                self.end_year
            );
        }
        if self.min_delay > self.max_delay {
            bail!("minimum jitter is larger than maximum jitter");
        }
        Ok(())
    }

    pub fn task_count(&self) -> usize {
        self.categories.len() * (self.end_year as usize + 1 - self.start_year as usize)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub plan: RunPlan,
    pub fetch: FetchSettings,
    pub output: PathBuf,
    pub output_dir: PathBuf,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = RunPlan::default();
        let fetch_defaults = FetchSettings::default();

        let base_url = env::var("ROSTER_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let categories = match env::var("ROSTER_CATEGORIES") {
            Ok(raw) => parse_list(&raw),
            Err(_) => defaults.categories.clone(),
        };

        let plan = RunPlan {
            categories,
            start_year: parse_var("ROSTER_START_YEAR", defaults.start_year)?,
            end_year: parse_var("ROSTER_END_YEAR", defaults.end_year)?,
            workers: parse_var("ROSTER_WORKERS", defaults.workers)?,
            min_delay: Duration::from_millis(parse_var("ROSTER_MIN_DELAY_MS", 300u64)?),
            max_delay: Duration::from_millis(parse_var("ROSTER_MAX_DELAY_MS", 600u64)?),
            progress_every: parse_var("ROSTER_PROGRESS_EVERY", defaults.progress_every)?,
        };
        plan.check()?;

        let fetch = FetchSettings {
            timeout: Duration::from_secs(parse_var(
                "ROSTER_TIMEOUT_SECS",
                fetch_defaults.timeout.as_secs(),
            )?),
            max_attempts: parse_var("ROSTER_MAX_ATTEMPTS", fetch_defaults.max_attempts)?.max(1),
            base_backoff: Duration::from_millis(parse_var("ROSTER_BACKOFF_MS", 1000u64)?),
        };

        Ok(Self {
            base_url,
            plan,
            fetch,
            output: env::var("ROSTER_OUTPUT")
                .unwrap_or_else(|_| "roster_records.csv".to_string())
                .into(),
            output_dir: env::var("ROSTER_OUTPUT_DIR")
                .unwrap_or_else(|_| "output".to_string())
                .into(),
            port: parse_var("PORT", 3000u16)?,
        })
    }
}

/// Comma separated, blanks dropped.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}
