use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Gleaner
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "dataset")]
    pub datasets: Vec<DatasetConfig>,
    #[serde(default, rename = "job")]
    pub jobs: Vec<JobConfig>,
}

impl Config {
    /// Looks up a dataset declaration by name
    pub fn dataset(&self, name: &str) -> Option<&DatasetConfig> {
        self.datasets.iter().find(|d| d.name == name)
    }

    /// Looks up a job declaration by id
    pub fn job(&self, id: &str) -> Option<&JobConfig> {
        self.jobs.iter().find(|j| j.id == id)
    }
}

/// Transport and retry behaviour shared by every job
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upper bound on a whole fetch, body included (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound on establishing a connection (seconds)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Extra attempts the job driver makes after a transient fetch failure
    #[serde(default)]
    pub max_retries: u32,

    /// Wait before a retry (milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Non-2xx statuses that still count as a usable response
    #[serde(default)]
    pub allowed_statuses: Vec<u16>,

    /// Content-type prefixes classified as structured payloads
    #[serde(default = "default_structured_content_types")]
    pub structured_content_types: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
            allowed_statuses: Vec::new(),
            structured_content_types: default_structured_content_types(),
        }
    }
}

fn default_user_agent() -> String {
    format!("gleaner/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

pub(crate) fn default_structured_content_types() -> Vec<String> {
    vec!["application/json".to_string()]
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory receiving the finalized JSON datasets
    pub directory: String,

    /// Optional SQLite file backing the durable record store
    #[serde(default)]
    pub database_path: Option<String>,
}

/// A named dataset that one or more jobs feed into
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatasetConfig {
    pub name: String,

    /// Field names the finalized dataset is grouped by
    #[serde(default)]
    pub group_by: Vec<String>,
}

/// One crawl job: seeds, extraction rules and pagination cues for one site
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JobConfig {
    pub id: String,

    /// Dataset receiving this job's records
    pub dataset: String,

    /// Absolute seed URLs, fetched in order
    pub seeds: Vec<String>,

    /// Page ceiling for pagination
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Politeness delay between consecutive fetches (milliseconds)
    #[serde(default)]
    pub delay_ms: u64,

    /// Domain patterns discovered requests must stay within (empty = any)
    #[serde(default)]
    pub allowed_domains: Vec<String>,

    /// Stop once this many listing records have been emitted
    #[serde(default)]
    pub max_records: Option<usize>,

    /// Fields that must be non-empty for a scope to count as an item
    #[serde(default)]
    pub require_fields: Vec<String>,

    pub entity_key: EntityKeyConfig,

    /// CSS query locating item scopes in markup documents
    #[serde(default)]
    pub item_scope: Option<String>,

    /// Dot path to the item array in structured payloads
    #[serde(default)]
    pub items_path: Option<String>,

    /// Selectors whose href is the next page, tried in order
    #[serde(default)]
    pub next_css: Vec<String>,

    /// Dot path to the next-page cursor in structured payloads
    #[serde(default)]
    pub next_path: Option<String>,

    /// Query parameter receiving a bare cursor value
    #[serde(default)]
    pub next_param: Option<String>,

    /// Fixed values added to every listing record
    #[serde(default)]
    pub constants: BTreeMap<String, String>,

    #[serde(default, rename = "field")]
    pub fields: Vec<FieldConfig>,

    /// Extraction rules for drill-down documents
    #[serde(default)]
    pub detail: Option<DetailConfig>,
}

fn default_max_pages() -> u32 {
    1
}

/// Extraction rules applied to drill-down (detail) documents
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DetailConfig {
    /// CSS query for the detail scope; the whole document when absent
    #[serde(default)]
    pub item_scope: Option<String>,

    /// Dot path to the detail object in structured payloads
    #[serde(default)]
    pub items_path: Option<String>,

    #[serde(default, rename = "field")]
    pub fields: Vec<FieldConfig>,
}

/// Declarative description of one field
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FieldConfig {
    pub name: String,

    /// Ordered fallback chain
    pub strategies: Vec<StrategyConfig>,

    #[serde(default)]
    pub default: Option<String>,

    /// Collect every match instead of the first one
    #[serde(default)]
    pub multi: bool,

    /// Separator joining multi-valued matches
    #[serde(default)]
    pub separator: Option<String>,

    /// Resolve the value against the document URL
    #[serde(default)]
    pub absolute_url: bool,

    /// Values lacking this substring count as a miss
    #[serde(default)]
    pub must_contain: Option<String>,

    /// The value is a link to a detail document for the same entity
    #[serde(default)]
    pub drill_down: bool,
}

/// One extraction strategy; exactly one of `css`, `path`, `page-url` is set
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StrategyConfig {
    /// CSS query relative to the item scope (empty = the scope itself)
    #[serde(default)]
    pub css: Option<String>,

    /// Attribute read from the matched element instead of its text
    #[serde(default)]
    pub attr: Option<String>,

    /// Dot path relative to the structured item
    #[serde(default)]
    pub path: Option<String>,

    /// Use the document's final URL
    #[serde(default)]
    pub page_url: bool,

    /// Value used if the whole chain fails
    #[serde(default)]
    pub default: Option<String>,
}

/// How the entity key of a listing record is derived
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EntityKeyConfig {
    /// A path segment, counted from the end, of the URL held in `field`
    Segment { field: String, segment: usize },

    /// The value of `field`
    Field { field: String },

    /// A stable hash of the named fields
    Hash { hash: Vec<String> },
}
