//! # Configuration Resolver
//!
//! Merges layered configuration into a single immutable [`EffectiveConfig`].
//!
//! Layers, lowest precedence first:
//! 1. [`Defaults`]
//! 2. config file (TOML, parsed by the binary into [`ConfigOverrides`])
//! 3. environment (`WIKIFORGE_*`, see [`ConfigOverrides::from_lookup`])
//! 4. command line flags
//!
//! Layers 2-4 are all [`ConfigOverrides`]; combine them with
//! [`ConfigOverrides::layered`] and hand the result to [`resolve`].

use crate::primitives::{
    DEFAULT_DATA_PATH, DEFAULT_DOWNLOAD_JOBS, DEFAULT_MIRROR_URL, DEFAULT_SKIP_TOLERANCE_PPM,
    DEFAULT_WIKI, PPM,
};
use crate::types::ForgeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::{NonZeroU64, NonZeroUsize};
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable for the data root.
pub const ENV_DATA_PATH: &str = "WIKIFORGE_DATA_PATH";
/// Environment variable for the dump mirror.
pub const ENV_MIRROR_URL: &str = "WIKIFORGE_MIRROR_URL";
/// Environment variable for the worker count.
pub const ENV_WORKERS: &str = "WIKIFORGE_WORKERS";
/// Environment variable for the entity cap.
pub const ENV_MAX_ENTITIES: &str = "WIKIFORGE_MAX_ENTITIES";

// =============================================================================
// SNAPSHOT DATE
// =============================================================================

/// A validated `YYYYMMDD` calendar date identifying a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotDate {
    year: u16,
    month: u8,
    day: u8,
}

impl SnapshotDate {
    /// Build a date, validating the calendar.
    pub fn new(year: u16, month: u8, day: u8) -> Result<Self, ForgeError> {
        if !(1..=12).contains(&month) {
            return Err(ForgeError::Configuration(format!(
                "month {month} is out of range in snapshot date"
            )));
        }
        if day == 0 || day > days_in_month(year, month) {
            return Err(ForgeError::Configuration(format!(
                "day {day} does not exist in {year:04}-{month:02}"
            )));
        }
        Ok(Self { year, month, day })
    }

    /// Calendar year.
    #[must_use]
    pub const fn year(&self) -> u16 {
        self.year
    }

    /// Calendar month (1-12).
    #[must_use]
    pub const fn month(&self) -> u8 {
        self.month
    }

    /// `(year, month)` of the month before this date.
    #[must_use]
    pub const fn prior_month(&self) -> (u16, u8) {
        if self.month == 1 {
            (self.year.saturating_sub(1), 12)
        } else {
            (self.year, self.month - 1)
        }
    }

    /// `YYYYMM` stamp of the month before this date.
    #[must_use]
    pub fn prior_month_stamp(&self) -> String {
        let (year, month) = self.prior_month();
        format!("{year:04}{month:02}")
    }
}

/// Number of days in a month of the proleptic Gregorian calendar.
#[must_use]
pub const fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

impl FromStr for SnapshotDate {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ForgeError::Configuration(format!(
                "snapshot date '{s}' must have the form YYYYMMDD"
            )));
        }
        let field = |range: std::ops::Range<usize>| -> Result<u16, ForgeError> {
            s[range]
                .parse::<u16>()
                .map_err(|e| ForgeError::Configuration(format!("snapshot date '{s}': {e}")))
        };
        let year = field(0..4)?;
        let month = field(4..6)?;
        let day = field(6..8)?;
        Self::new(year, month as u8, day as u8)
    }
}

impl fmt::Display for SnapshotDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}{:02}", self.year, self.month, self.day)
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Identifies one run's pair of dumps and where their artifacts live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Date of the Wikipedia dump.
    pub wikipedia: SnapshotDate,
    /// Date of the Wikidata dump.
    pub wikidata: SnapshotDate,
    /// Wiki id, e.g. `enwiki`.
    pub wiki: String,
    /// Root directory of every artifact.
    pub data_root: PathBuf,
}

impl Snapshot {
    /// Language code of the wiki (`enwiki` -> `en`).
    #[must_use]
    pub fn language(&self) -> &str {
        self.wiki.strip_suffix("wiki").unwrap_or(&self.wiki)
    }
}

// =============================================================================
// ENTITY CAP
// =============================================================================

/// Upper bound on the number of entities a capped stage processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityCap {
    /// Process at most this many entities.
    Limited(NonZeroU64),
    /// Process everything.
    Unlimited,
}

impl EntityCap {
    /// The limit, or `None` when unlimited.
    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        match self {
            EntityCap::Limited(n) => Some(n.get()),
            EntityCap::Unlimited => None,
        }
    }

    /// Clamp a count to the cap.
    #[must_use]
    pub fn clamp(&self, count: u64) -> u64 {
        self.limit().map_or(count, |limit| count.min(limit))
    }

    fn from_count(count: i64) -> Result<Self, ForgeError> {
        match u64::try_from(count) {
            Err(_) => Err(ForgeError::Configuration(format!(
                "max_entities must not be negative, got {count}"
            ))),
            Ok(n) => Ok(NonZeroU64::new(n).map_or(EntityCap::Unlimited, EntityCap::Limited)),
        }
    }
}

impl FromStr for EntityCap {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("none") || s.eq_ignore_ascii_case("unlimited") {
            return Ok(EntityCap::Unlimited);
        }
        let count = s.parse::<i64>().map_err(|_| {
            ForgeError::Configuration(format!(
                "max_entities must be a positive integer or 'unlimited', got '{s}'"
            ))
        })?;
        Self::from_count(count)
    }
}

impl fmt::Display for EntityCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityCap::Limited(n) => write!(f, "{n}"),
            EntityCap::Unlimited => f.write_str("unlimited"),
        }
    }
}

// =============================================================================
// SKIP TOLERANCE
// =============================================================================

/// Largest tolerated share of skipped records, in parts per million.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipTolerance(u32);

impl SkipTolerance {
    /// Build a tolerance from parts per million (0..=1_000_000).
    pub fn from_ppm(ppm: u32) -> Result<Self, ForgeError> {
        if ppm > PPM {
            return Err(ForgeError::Configuration(format!(
                "skip tolerance {ppm} ppm exceeds {PPM}"
            )));
        }
        Ok(Self(ppm))
    }

    /// Tolerance that accepts no skipped records.
    #[must_use]
    pub const fn strict() -> Self {
        Self(0)
    }

    /// The tolerance in parts per million.
    #[must_use]
    pub const fn ppm(&self) -> u32 {
        self.0
    }

    /// Whether `skipped / (records + skipped)` exceeds the tolerance.
    ///
    /// Integer-only: compares `skipped * 1e6` with `ppm * seen`.
    #[must_use]
    pub fn exceeded(&self, records: u64, skipped: u64) -> bool {
        let seen = u128::from(records) + u128::from(skipped);
        if seen == 0 {
            return false;
        }
        u128::from(skipped) * u128::from(PPM) > u128::from(self.0) * seen
    }
}

impl Default for SkipTolerance {
    fn default() -> Self {
        Self(DEFAULT_SKIP_TOLERANCE_PPM)
    }
}

// =============================================================================
// DOWNLOAD JOBS
// =============================================================================

/// A raw dump family the download stage can fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DownloadJob {
    /// Article text dump.
    ArticlesDump,
    /// `page` table.
    PageTable,
    /// `page_props` table.
    PagePropsTable,
    /// `redirect` table.
    RedirectTable,
    /// Daily pageview files.
    PageviewComplete,
    /// Wikidata JSON entity dump.
    WikidataJson,
}

impl DownloadJob {
    /// Every job, in download order.
    pub const ALL: [DownloadJob; 6] = [
        DownloadJob::ArticlesDump,
        DownloadJob::PageTable,
        DownloadJob::PagePropsTable,
        DownloadJob::RedirectTable,
        DownloadJob::PageviewComplete,
        DownloadJob::WikidataJson,
    ];

    /// The job's name as used in job lists and mirror directories.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DownloadJob::ArticlesDump => "articlesdump",
            DownloadJob::PageTable => "pagetable",
            DownloadJob::PagePropsTable => "pagepropstable",
            DownloadJob::RedirectTable => "redirecttable",
            DownloadJob::PageviewComplete => "pageviewcomplete",
            DownloadJob::WikidataJson => "wikidatajson",
        }
    }
}

impl FromStr for DownloadJob {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DownloadJob::ALL
            .into_iter()
            .find(|job| job.as_str() == s)
            .ok_or_else(|| ForgeError::Configuration(format!("unknown download job '{s}'")))
    }
}

impl fmt::Display for DownloadJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a comma-separated job list.
///
/// Whitespace is trimmed, empty items are ignored and repeated jobs are kept
/// once, at their first position.
pub fn parse_job_list(list: &str) -> Result<Vec<DownloadJob>, ForgeError> {
    let mut jobs = Vec::new();
    for item in list.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let job = item.parse::<DownloadJob>()?;
        if !jobs.contains(&job) {
            jobs.push(job);
        }
    }
    Ok(jobs)
}

// =============================================================================
// OVERRIDES
// =============================================================================

/// An entity cap as written in a config file: a number or a word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapSetting {
    /// `max_entities = 1000`
    Count(i64),
    /// `max_entities = "unlimited"`
    Word(String),
}

impl CapSetting {
    fn resolve(&self) -> Result<EntityCap, ForgeError> {
        match self {
            CapSetting::Count(n) => EntityCap::from_count(*n),
            CapSetting::Word(word) => word.parse(),
        }
    }
}

/// One configuration layer. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub wikipedia_date: Option<String>,
    pub wikidata_date: Option<String>,
    pub wiki: Option<String>,
    pub data_path: Option<PathBuf>,
    pub mirror_url: Option<String>,
    pub jobs: Option<String>,
    pub max_entities: Option<CapSetting>,
    pub workers: Option<i64>,
    pub include_item_statements: Option<bool>,
    pub skip_completed: Option<bool>,
    pub skip_tolerance_ppm: Option<i64>,
}

impl ConfigOverrides {
    /// Stack `over` on top of `self`; fields set in `over` win.
    #[must_use]
    pub fn layered(self, over: ConfigOverrides) -> ConfigOverrides {
        ConfigOverrides {
            wikipedia_date: over.wikipedia_date.or(self.wikipedia_date),
            wikidata_date: over.wikidata_date.or(self.wikidata_date),
            wiki: over.wiki.or(self.wiki),
            data_path: over.data_path.or(self.data_path),
            mirror_url: over.mirror_url.or(self.mirror_url),
            jobs: over.jobs.or(self.jobs),
            max_entities: over.max_entities.or(self.max_entities),
            workers: over.workers.or(self.workers),
            include_item_statements: over.include_item_statements.or(self.include_item_statements),
            skip_completed: over.skip_completed.or(self.skip_completed),
            skip_tolerance_ppm: over.skip_tolerance_ppm.or(self.skip_tolerance_ppm),
        }
    }

    /// Build the environment layer from a variable lookup.
    ///
    /// Only `WIKIFORGE_DATA_PATH`, `WIKIFORGE_MIRROR_URL`, `WIKIFORGE_WORKERS` and
    /// `WIKIFORGE_MAX_ENTITIES` are consulted. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<ConfigOverrides, ForgeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let workers = match get(ENV_WORKERS) {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
                ForgeError::Configuration(format!("{ENV_WORKERS} must be an integer, got '{raw}'"))
            })?),
            None => None,
        };

        Ok(ConfigOverrides {
            data_path: get(ENV_DATA_PATH).map(PathBuf::from),
            mirror_url: get(ENV_MIRROR_URL),
            workers,
            max_entities: get(ENV_MAX_ENTITIES).map(CapSetting::Word),
            ..ConfigOverrides::default()
        })
    }
}

// =============================================================================
// DEFAULTS
// =============================================================================

/// The lowest configuration layer.
#[derive(Debug, Clone)]
pub struct Defaults {
    pub data_path: PathBuf,
    pub wiki: String,
    pub mirror_url: String,
    pub jobs: String,
    pub workers: usize,
    pub max_entities: EntityCap,
    pub skip_tolerance_ppm: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            wiki: DEFAULT_WIKI.to_string(),
            mirror_url: DEFAULT_MIRROR_URL.to_string(),
            jobs: DEFAULT_DOWNLOAD_JOBS.to_string(),
            workers: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            max_entities: EntityCap::Unlimited,
            skip_tolerance_ppm: DEFAULT_SKIP_TOLERANCE_PPM,
        }
    }
}

// =============================================================================
// EFFECTIVE CONFIG
// =============================================================================

/// Fully resolved, immutable run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub snapshot: Snapshot,
    pub workers: NonZeroUsize,
    pub max_entities: EntityCap,
    pub mirror_url: String,
    pub jobs: Vec<DownloadJob>,
    pub include_item_statements: bool,
    pub skip_completed: bool,
    pub skip_tolerance: SkipTolerance,
}

/// Merge defaults and overrides into an [`EffectiveConfig`].
///
/// Both snapshot dates are required.
pub fn resolve(defaults: &Defaults, overrides: &ConfigOverrides) -> Result<EffectiveConfig, ForgeError> {
    let wikipedia = required_date(overrides.wikipedia_date.as_deref(), "wikipedia")?;
    let wikidata = required_date(overrides.wikidata_date.as_deref(), "wikidata")?;

    let wiki = overrides.wiki.clone().unwrap_or_else(|| defaults.wiki.clone());
    if wiki.is_empty() || !wiki.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ForgeError::Configuration(format!("invalid wiki id '{wiki}'")));
    }

    let workers = match overrides.workers {
        Some(n) => usize::try_from(n).ok().and_then(NonZeroUsize::new).ok_or_else(|| {
            ForgeError::Configuration(format!("workers must be a positive integer, got {n}"))
        })?,
        None => NonZeroUsize::new(defaults.workers)
            .ok_or_else(|| ForgeError::Configuration("default worker count is zero".to_string()))?,
    };

    let max_entities = match &overrides.max_entities {
        Some(setting) => setting.resolve()?,
        None => defaults.max_entities,
    };

    let skip_tolerance = match overrides.skip_tolerance_ppm {
        Some(ppm) => {
            let ppm = u32::try_from(ppm).map_err(|_| {
                ForgeError::Configuration(format!("skip tolerance must be 0..={PPM} ppm, got {ppm}"))
            })?;
            SkipTolerance::from_ppm(ppm)?
        }
        None => SkipTolerance::from_ppm(defaults.skip_tolerance_ppm)?,
    };

    let jobs = parse_job_list(overrides.jobs.as_deref().unwrap_or(&defaults.jobs))?;

    let mirror_url = overrides
        .mirror_url
        .clone()
        .unwrap_or_else(|| defaults.mirror_url.clone());
    if mirror_url.trim().is_empty() {
        return Err(ForgeError::Configuration("mirror url is empty".to_string()));
    }

    Ok(EffectiveConfig {
        snapshot: Snapshot {
            wikipedia,
            wikidata,
            wiki,
            data_root: overrides
                .data_path
                .clone()
                .unwrap_or_else(|| defaults.data_path.clone()),
        },
        workers,
        max_entities,
        mirror_url,
        jobs,
        include_item_statements: overrides.include_item_statements.unwrap_or(false),
        skip_completed: overrides.skip_completed.unwrap_or(false),
        skip_tolerance,
    })
}

fn required_date(value: Option<&str>, corpus: &str) -> Result<SnapshotDate, ForgeError> {
    value
        .ok_or_else(|| ForgeError::Configuration(format!("missing {corpus} snapshot date")))?
        .parse()
}

// =============================================================================
// TESTS
// =============================================================================
