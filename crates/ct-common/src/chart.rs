//! Chart model: manifest, values overrides, and install identities

use std::fmt;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::Deserialize;

use crate::Result;

/// Chart manifest file name
pub const CHART_YAML: &str = "Chart.yaml";
/// Default values file name
pub const VALUES_YAML: &str = "values.yaml";
/// Subdirectory holding CI values overrides
pub const CI_DIR: &str = "ci";
/// Suffix identifying CI values overrides
pub const VALUES_FILE_SUFFIX: &str = "-values.yaml";

/// Helm caps release names at 53 characters
const MAX_RELEASE_LEN: usize = 53;
/// DNS label limit for namespaces
const MAX_NAMESPACE_LEN: usize = 63;
const SUFFIX_LEN: usize = 10;
const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A chart maintainer as declared in Chart.yaml
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Maintainer {
    /// Account name on the hosting domain
    pub name: String,
    /// Contact email
    #[serde(default)]
    pub email: Option<String>,
    /// Homepage
    #[serde(default)]
    pub url: Option<String>,
}

/// The parts of Chart.yaml chart testing cares about
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ChartYaml {
    /// Chart name
    #[serde(default)]
    pub name: String,
    /// Semantic version of the chart
    #[serde(default)]
    pub version: String,
    /// Whether the chart is deprecated
    #[serde(default)]
    pub deprecated: bool,
    /// Declared maintainers, in order
    #[serde(default)]
    pub maintainers: Vec<Maintainer>,
}

impl ChartYaml {
    /// Parse Chart.yaml content.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_yaml::from_slice(bytes)?)
    }

    /// Read `<dir>/Chart.yaml`.
    pub fn read_from_dir(dir: &Path) -> Result<Self> {
        let bytes = std::fs::read(dir.join(CHART_YAML))?;
        Self::from_bytes(&bytes)
    }
}

/// One values configuration a chart is linted and installed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValuesOverride {
    /// Chart defaults, no values file passed
    Defaults,
    /// A `ci/*-values.yaml` file
    File(PathBuf),
}

impl ValuesOverride {
    /// Path of the override file, if any.
    pub fn file(&self) -> Option<&Path> {
        match self {
            ValuesOverride::Defaults => None,
            ValuesOverride::File(path) => Some(path),
        }
    }
}

impl fmt::Display for ValuesOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValuesOverride::Defaults => f.write_str("chart defaults"),
            ValuesOverride::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// List `<chart>/ci/*-values.yaml`, sorted by path.
///
/// A missing `ci` directory yields no files.
pub fn find_values_files(chart: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(chart.join(CI_DIR)) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.ends_with(VALUES_FILE_SUFFIX))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// The overrides to test with. Never empty: no files means one pass with defaults.
pub fn effective_overrides(values_files: &[PathBuf]) -> Vec<ValuesOverride> {
    if values_files.is_empty() {
        return vec![ValuesOverride::Defaults];
    }
    values_files
        .iter()
        .cloned()
        .map(ValuesOverride::File)
        .collect()
}

/// Namespace, release and selector for one install attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallIdentity {
    /// Namespace the release is installed into
    pub namespace: String,
    /// Helm release name
    pub release: String,
    /// Label selector matching the release's resources
    pub selector: String,
    /// Whether the namespace was generated for this attempt and must be deleted
    pub ephemeral_namespace: bool,
}

impl InstallIdentity {
    /// Generate an identity for installing `chart`.
    ///
    /// The release and namespace share a random suffix so concurrent builds of the
    /// same chart never collide. With a `fixed_namespace`, resources are found by
    /// `<release_label>=<release>`; otherwise the whole namespace belongs to the
    /// release and the selector is empty.
    pub fn generate<R: Rng + ?Sized>(
        chart: &Path,
        build_id: &str,
        fixed_namespace: Option<&str>,
        release_label: &str,
        rng: &mut R,
    ) -> Self {
        let base = release_base_name(chart);
        let suffix = random_suffix(rng);
        let release = truncate_left(&format!("{}-{}", base, suffix), MAX_RELEASE_LEN);

        match fixed_namespace {
            Some(namespace) => Self {
                namespace: namespace.to_string(),
                selector: format!("{}={}", release_label, release),
                release,
                ephemeral_namespace: false,
            },
            None => {
                let namespace = if build_id.is_empty() {
                    format!("{}-{}", base, suffix)
                } else {
                    format!("{}-{}-{}", base, build_id, suffix)
                };
                Self {
                    namespace: truncate_left(&namespace, MAX_NAMESPACE_LEN),
                    release,
                    selector: String::new(),
                    ephemeral_namespace: true,
                }
            }
        }
    }
}

fn release_base_name(chart: &Path) -> String {
    if let Some(name) = chart.file_name().and_then(|n| n.to_str()) {
        if !name.is_empty() && name != "." {
            return name.to_string();
        }
    }
    // Chart at the repository root: fall back to the declared name.
    ChartYaml::read_from_dir(chart)
        .ok()
        .map(|c| c.name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "chart".to_string())
}

fn random_suffix<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect()
}

/// Keep the last `max` characters of `s`, so the random suffix survives.
fn truncate_left(s: &str, max: usize) -> String {
    let len = s.chars().count();
    if len <= max {
        return s.to_string();
    }
    s.chars().skip(len - max).collect()
}
