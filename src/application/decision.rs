//! Deploy decision engine.
//!
//! Picks the single sequence that should become desired for an (app, cluster)
//! pair under one [`DeployPolicy`], then applies the checks every policy must
//! pass: rollback permission for past versions and pending configuration.

use tracing::debug;

use crate::domain::error::DecisionError;
use crate::domain::policy::{AutoDeploy, DeployPolicy};
use crate::domain::release::{Release, ReleaseCatalog};
use crate::error::Result;
use crate::port::outbound::store::ReleaseStore;

/// Stateless selector of desired sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployDecisionEngine;

impl DeployDecisionEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Select the sequence to mark desired, or `None` when nothing changes.
    pub async fn select_desired_sequence<R>(
        &self,
        policy: &DeployPolicy,
        catalog: &ReleaseCatalog,
        releases: &R,
    ) -> Result<Option<u64>>
    where
        R: ReleaseStore + ?Sized,
    {
        let Some(sequence) = self.choose(policy, catalog)? else {
            return Ok(None);
        };

        let release = catalog
            .find(sequence)
            .ok_or(DecisionError::SequenceNotFound { sequence })?;

        if catalog.is_past_version(sequence)
            && !releases
                .is_rollback_allowed(catalog.app_id(), sequence)
                .await?
        {
            return Err(DecisionError::RollbackNotAllowed { sequence }.into());
        }

        if release.needs_configuration() {
            return Err(DecisionError::ConfigurationRequired { sequence }.into());
        }

        Ok(Some(sequence))
    }

    /// Apply the policy alone, without rollback or configuration checks.
    pub fn choose(
        &self,
        policy: &DeployPolicy,
        catalog: &ReleaseCatalog,
    ) -> std::result::Result<Option<u64>, DecisionError> {
        let current = catalog.current_sequence();
        let selected = match policy {
            DeployPolicy::Latest => catalog.latest().map(|r| r.sequence),
            DeployPolicy::Label(label) => Some(
                catalog
                    .find_by_label(label)
                    .ok_or_else(|| DecisionError::LabelNotFound {
                        label: label.clone(),
                    })?
                    .sequence,
            ),
            DeployPolicy::Automatic(tier) => auto_select(*tier, catalog),
        };

        match selected {
            Some(sequence) if Some(sequence) == current => {
                debug!(
                    app = %catalog.app_id(),
                    cluster = %catalog.cluster_id(),
                    sequence,
                    %policy,
                    "Selected sequence is already current"
                );
                Ok(None)
            }
            other => Ok(other),
        }
    }
}

fn auto_select(tier: AutoDeploy, catalog: &ReleaseCatalog) -> Option<u64> {
    let current = catalog.current()?;
    match tier {
        AutoDeploy::Disabled => None,
        AutoDeploy::Sequence => auto_sequence(current, catalog),
        AutoDeploy::Patch | AutoDeploy::MinorPatch | AutoDeploy::MajorMinorPatch => {
            auto_semver(tier, current, catalog)
        }
    }
}

/// First pending release whose cursor is strictly later than the current one.
fn auto_sequence(current: &Release, catalog: &ReleaseCatalog) -> Option<u64> {
    let current_cursor = current.cursor_ordinal()?;
    catalog
        .pending()
        .find(|candidate| {
            candidate
                .cursor_ordinal()
                .is_some_and(|c| c.after(&current_cursor).unwrap_or(false))
        })
        .map(|r| r.sequence)
}

/// First pending release, newest first, that is semver-newer and within the tier.
fn auto_semver(tier: AutoDeploy, current: &Release, catalog: &ReleaseCatalog) -> Option<u64> {
    let current_ordinal = current.semver_ordinal()?;
    let current_version = current_ordinal.as_semver()?;

    for candidate in catalog.pending() {
        let Some(ordinal) = candidate.semver_ordinal() else {
            debug!(sequence = candidate.sequence, label = %candidate.label, "Skipping non-semver release");
            continue;
        };
        if !ordinal.is_comparable(&current_ordinal) {
            continue;
        }
        if !ordinal.after(&current_ordinal).unwrap_or(false) {
            continue;
        }
        let Some(version) = ordinal.as_semver() else {
            continue;
        };

        let accepted = match tier {
            AutoDeploy::Patch => {
                version.major == current_version.major && version.minor == current_version.minor
            }
            AutoDeploy::MinorPatch => version.major == current_version.major,
            AutoDeploy::MajorMinorPatch => true,
            AutoDeploy::Disabled | AutoDeploy::Sequence => false,
        };
        if accepted {
            return Some(candidate.sequence);
        }
    }
    None
}
