use os_release::OsRelease;
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::PathBuf, process::Command};
use tracing::debug;

/// Host platform the generated scripts are tailored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    Ubuntu,
    Debian,
    #[serde(rename = "centos")]
    CentOS,
    #[serde(rename = "rhel")]
    Rhel,
    Alpine,
    AmazonLinux,
    Fedora,
    #[serde(rename = "macos")]
    MacOs,
    Unknown,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Platform::Ubuntu => "Ubuntu",
            Platform::Debian => "Debian",
            Platform::CentOS => "CentOS",
            Platform::Rhel => "RHEL",
            Platform::Alpine => "Alpine",
            Platform::AmazonLinux => "Amazon Linux",
            Platform::Fedora => "Fedora",
            Platform::MacOs => "macOS",
            Platform::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// A substring to look for in the platform descriptor and the label it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub label: Platform,
}

impl KeywordRule {
    pub fn new(keyword: &str, label: Platform) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
            label,
        }
    }
}

pub fn default_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new("ubuntu", Platform::Ubuntu),
        KeywordRule::new("debian", Platform::Debian),
        KeywordRule::new("centos", Platform::CentOS),
        KeywordRule::new("rhel", Platform::Rhel),
        KeywordRule::new("alpine", Platform::Alpine),
        KeywordRule::new("amzn", Platform::AmazonLinux),
        KeywordRule::new("amazon", Platform::AmazonLinux),
        KeywordRule::new("fedora", Platform::Fedora),
    ]
}

/// Result of probing the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub platform: Platform,
    /// `PRETTY_NAME` from the descriptor, shown in the banner only.
    pub pretty_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlatformDetector {
    descriptor: PathBuf,
    kernel_command: String,
    macos_marker: String,
    rules: Vec<KeywordRule>,
}

impl PlatformDetector {
    pub fn new(
        descriptor: PathBuf,
        kernel_command: String,
        macos_marker: String,
        rules: Vec<KeywordRule>,
    ) -> Self {
        Self {
            descriptor,
            kernel_command,
            macos_marker,
            rules,
        }
    }

    pub fn detect(&self) -> Detection {
        let contents = match fs::read_to_string(&self.descriptor) {
            Ok(contents) => Some(contents),
            Err(e) => {
                debug!(path = %self.descriptor.display(), error = %e, "platform descriptor unreadable");
                None
            }
        };

        let pretty_name = contents.as_deref().and_then(pretty_name);

        let platform = match contents.as_deref().and_then(|c| match_rules(c, &self.rules)) {
            Some(platform) => platform,
            None => {
                let kernel = self.kernel_name();
                classify_kernel(kernel.as_deref(), &self.macos_marker)
            }
        };

        debug!(%platform, "platform detected");
        Detection {
            platform,
            pretty_name,
        }
    }

    fn kernel_name(&self) -> Option<String> {
        match Command::new(&self.kernel_command).output() {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            }
            Ok(output) => {
                debug!(status = %output.status, "kernel probe failed");
                None
            }
            Err(e) => {
                debug!(command = %self.kernel_command, error = %e, "kernel probe unavailable");
                None
            }
        }
    }
}

/// First rule (in order) whose keyword occurs in the lower-cased descriptor.
pub fn match_rules(descriptor: &str, rules: &[KeywordRule]) -> Option<Platform> {
    let haystack = descriptor.to_lowercase();
    rules
        .iter()
        .find(|rule| haystack.contains(&rule.keyword.to_lowercase()))
        .map(|rule| rule.label)
}

pub fn classify_kernel(kernel: Option<&str>, macos_marker: &str) -> Platform {
    match kernel {
        Some(name) if name.trim() == macos_marker => Platform::MacOs,
        _ => Platform::Unknown,
    }
}

fn pretty_name(contents: &str) -> Option<String> {
    let release: OsRelease = contents.lines().map(str::to_owned).collect();
    Some(release.pretty_name).filter(|name| !name.is_empty())
}
