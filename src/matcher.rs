//! Artifact matching
//!
//! Pairs the job's expected output artifacts with the user's declared
//! outputs by name. Matching rule: when a name is declared more than once,
//! the last declaration wins. This is deterministic and not an error.
//!
//! The plan preserves the declaration order of the expected artifacts, so
//! outcomes and log lines come out in a stable order.

use std::collections::BTreeMap;

use publish_protocol::{ExpectedOutputArtifact, OutputArtifactSpec};

/// One expected artifact and how it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEntry {
    /// A declared output supplies a workspace location.
    Matched {
        index: usize,
        artifact: ExpectedOutputArtifact,
        location: String,
    },
    /// No declared output carries this artifact's name.
    Unmatched {
        index: usize,
        artifact: ExpectedOutputArtifact,
    },
}

impl MatchEntry {
    /// Position of the artifact in the job's declaration order.
    pub fn index(&self) -> usize {
        match self {
            MatchEntry::Matched { index, .. } | MatchEntry::Unmatched { index, .. } => *index,
        }
    }

    pub fn artifact(&self) -> &ExpectedOutputArtifact {
        match self {
            MatchEntry::Matched { artifact, .. } | MatchEntry::Unmatched { artifact, .. } => {
                artifact
            }
        }
    }

    /// Workspace location, if matched.
    pub fn location(&self) -> Option<&str> {
        match self {
            MatchEntry::Matched { location, .. } => Some(location),
            MatchEntry::Unmatched { .. } => None,
        }
    }
}

/// A declared name whose earlier location was replaced by a later one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowedSpec {
    pub artifact_name: String,
    pub replaced_location: String,
    pub winning_location: String,
}

/// Ordered work list produced by `match_artifacts`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchPlan {
    /// One entry per expected artifact, in declaration order.
    pub entries: Vec<MatchEntry>,
    /// Duplicate declarations that lost to a later one.
    pub shadowed: Vec<ShadowedSpec>,
}

impl MatchPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries that will go through compression and upload.
    pub fn matched(&self) -> impl Iterator<Item = &MatchEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e, MatchEntry::Matched { .. }))
    }

    /// Entries with no declared output.
    pub fn unmatched(&self) -> impl Iterator<Item = &MatchEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e, MatchEntry::Unmatched { .. }))
    }
}

/// Build the name→location lookup. Later declarations replace earlier ones.
pub fn location_map(specs: &[OutputArtifactSpec]) -> (BTreeMap<String, String>, Vec<ShadowedSpec>) {
    let mut locations = BTreeMap::new();
    let mut shadowed = Vec::new();

    for spec in specs {
        if let Some(previous) = locations.insert(spec.artifact_name.clone(), spec.location.clone()) {
            shadowed.push(ShadowedSpec {
                artifact_name: spec.artifact_name.clone(),
                replaced_location: previous,
                winning_location: spec.location.clone(),
            });
        }
    }

    (locations, shadowed)
}

/// Match declared outputs against expected artifacts.
pub fn match_artifacts(
    specs: &[OutputArtifactSpec],
    expected: &[ExpectedOutputArtifact],
) -> MatchPlan {
    let (locations, shadowed) = location_map(specs);

    let entries = expected
        .iter()
        .enumerate()
        .map(|(index, artifact)| match locations.get(&artifact.name) {
            Some(location) => MatchEntry::Matched {
                index,
                artifact: artifact.clone(),
                location: location.clone(),
            },
            None => MatchEntry::Unmatched {
                index,
                artifact: artifact.clone(),
            },
        })
        .collect();

    MatchPlan { entries, shadowed }
}
