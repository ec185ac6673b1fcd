//! Deploy policies: which release sequence should become desired.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::UnknownVariant;

/// Automatic deploy tier configured per app.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoDeploy {
    /// Never deploy automatically.
    #[default]
    Disabled,
    /// Same major and minor as the current release.
    Patch,
    /// Same major as the current release.
    MinorPatch,
    /// Any newer semantic version.
    MajorMinorPatch,
    /// Any strictly later cursor; for channels without semantic versions.
    Sequence,
}

impl AutoDeploy {
    /// True for the tiers that compare semantic versions.
    #[must_use]
    pub const fn is_semver(self) -> bool {
        matches!(self, Self::Patch | Self::MinorPatch | Self::MajorMinorPatch)
    }
}

impl FromStr for AutoDeploy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "disabled" => Ok(Self::Disabled),
            "patch" => Ok(Self::Patch),
            "minor-patch" => Ok(Self::MinorPatch),
            "major-minor-patch" => Ok(Self::MajorMinorPatch),
            "sequence" => Ok(Self::Sequence),
            other => Err(UnknownVariant {
                kind: "auto-deploy tier",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AutoDeploy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disabled => "disabled",
            Self::Patch => "patch",
            Self::MinorPatch => "minor-patch",
            Self::MajorMinorPatch => "major-minor-patch",
            Self::Sequence => "sequence",
        };
        f.write_str(s)
    }
}

/// The rule used to pick the next desired sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployPolicy {
    /// Highest-sequence release.
    Latest,
    /// Release with this exact version label.
    Label(String),
    /// App's automatic tier, applied by scheduled checks.
    Automatic(AutoDeploy),
}

impl DeployPolicy {
    /// Derive the policy for one update check. Explicit requests win over
    /// the automatic tier; manual checks without either deploy nothing.
    #[must_use]
    pub fn derive(
        deploy_latest: bool,
        version_label: Option<&str>,
        is_automatic: bool,
        tier: AutoDeploy,
    ) -> Option<Self> {
        if deploy_latest {
            return Some(Self::Latest);
        }
        if let Some(label) = version_label.filter(|l| !l.is_empty()) {
            return Some(Self::Label(label.to_string()));
        }
        if is_automatic {
            return Some(Self::Automatic(tier));
        }
        None
    }
}

impl fmt::Display for DeployPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Label(label) => write!(f, "label:{label}"),
            Self::Automatic(tier) => write!(f, "auto:{tier}"),
        }
    }
}
