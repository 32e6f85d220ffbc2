//! Run configuration with hierarchical precedence: CLI flags > config file >
//! defaults. The config file is YAML or JSON with keys identical to the
//! flags. Censys credentials additionally fall back to the environment when
//! neither flags nor file provide them.

use camino::Utf8PathBuf;
use serde::Deserialize;

use crate::error::ConfigError;

/// Default tool selection.
pub const DEFAULT_TOOLS: &str = "subfinder,assetfinder,amass,waybackurls,gau,crtsh,httpx,subjs";

/// Every tool name the pipeline knows.
pub const KNOWN_TOOLS: &[&str] = &[
    "amass",
    "subfinder",
    "assetfinder",
    "rdap",
    "crtsh",
    "censys",
    "dedupe",
    "waybackurls",
    "gau",
    "httpx",
    "subjs",
    "linkfinderevo",
    "dnsx",
];

const DEFAULT_WORKERS: usize = 6;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Raw CLI values before overlay resolution. Optionals distinguish "not
/// passed" from an explicit value.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub target: Option<String>,
    pub outdir: Option<String>,
    pub workers: Option<usize>,
    pub active: bool,
    pub tools: Option<String>,
    pub timeout: Option<u64>,
    pub verbosity: Option<u8>,
    pub report: bool,
    pub resume: bool,
    pub proxy: Option<String>,
    pub censys_api_id: Option<String>,
    pub censys_api_secret: Option<String>,
    pub config_path: Option<Utf8PathBuf>,
}

/// File overlay: identical keys to the flag surface.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FileConfig {
    pub target: Option<String>,
    pub outdir: Option<String>,
    pub workers: Option<usize>,
    pub active: Option<bool>,
    pub tools: Option<String>,
    pub timeout: Option<u64>,
    #[serde(rename = "v")]
    pub verbosity: Option<u8>,
    pub report: Option<bool>,
    pub resume: Option<bool>,
    pub proxy: Option<String>,
    pub censys_api_id: Option<String>,
    pub censys_api_secret: Option<String>,
}

/// Fully resolved run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub target: String,
    pub outdir: Utf8PathBuf,
    pub workers: usize,
    pub active: bool,
    pub tools: Vec<String>,
    pub timeout_secs: u64,
    pub verbosity: u8,
    pub report: bool,
    pub resume: bool,
    pub proxy: Option<String>,
    pub censys_api_id: Option<String>,
    pub censys_api_secret: Option<String>,
}

impl Config {
    /// Resolve the overlay chain into a validated configuration.
    pub fn resolve(cli: CliOverrides) -> Result<Self, ConfigError> {
        let file = match &cli.config_path {
            Some(path) => load_file(path)?,
            None => FileConfig::default(),
        };

        let target = cli
            .target
            .or(file.target)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingTarget)?;

        let workers = cli.workers.or(file.workers).unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "workers".to_string(),
                value: "0".to_string(),
            });
        }

        let tools_csv = cli
            .tools
            .or(file.tools)
            .unwrap_or_else(|| DEFAULT_TOOLS.to_string());
        let tools = parse_tools(&tools_csv)?;

        let censys_api_id = cli
            .censys_api_id
            .or(file.censys_api_id)
            .or_else(|| std::env::var("CENSYS_API_ID").ok())
            .filter(|v| !v.trim().is_empty());
        let censys_api_secret = cli
            .censys_api_secret
            .or(file.censys_api_secret)
            .or_else(|| std::env::var("CENSYS_API_SECRET").ok())
            .filter(|v| !v.trim().is_empty());

        Ok(Self {
            target,
            outdir: Utf8PathBuf::from(cli.outdir.or(file.outdir).unwrap_or_else(|| ".".to_string())),
            workers,
            active: cli.active || file.active.unwrap_or(false),
            tools,
            timeout_secs: cli.timeout.or(file.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS),
            verbosity: cli.verbosity.or(file.verbosity).unwrap_or(0).min(3),
            report: cli.report || file.report.unwrap_or(false),
            resume: cli.resume || file.resume.unwrap_or(false),
            proxy: cli.proxy.or(file.proxy).filter(|p| !p.trim().is_empty()),
            censys_api_id,
            censys_api_secret,
        })
    }
}

/// Parse the `-tools` CSV against the known tool set.
pub fn parse_tools(csv: &str) -> Result<Vec<String>, ConfigError> {
    let mut tools = Vec::new();
    for raw in csv.split(',') {
        let name = raw.trim().to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        if !KNOWN_TOOLS.contains(&name.as_str()) {
            return Err(ConfigError::UnknownTool { name });
        }
        if !tools.contains(&name) {
            tools.push(name);
        }
    }
    Ok(tools)
}

/// Load the YAML/JSON overlay. Extension decides the format; unknown
/// extensions try YAML first, then JSON.
fn load_file(path: &Utf8PathBuf) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path.as_std_path()).map_err(|_| {
        ConfigError::FileNotFound {
            path: path.to_string(),
        }
    })?;

    let parsed = match path.extension() {
        Some("json") => serde_json::from_str::<FileConfig>(&content).map_err(|e| e.to_string()),
        Some("yaml" | "yml") => {
            serde_yaml::from_str::<FileConfig>(&content).map_err(|e| e.to_string())
        }
        _ => serde_yaml::from_str::<FileConfig>(&content)
            .map_err(|e| e.to_string())
            .or_else(|_| serde_json::from_str::<FileConfig>(&content).map_err(|e| e.to_string())),
    };

    parsed.map_err(|reason| ConfigError::Parse {
        path: path.to_string(),
        reason,
    })
}
