//! Shared value types for the proposal publication domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. ordinals start at 1, a proposal kind
//! is one of a closed set) and participate in domain computations.

use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{ArtifactPath, BranchName, CommitSha, EncodedContent, ProposalId, PullRequestUrl};

// ---------------------------------------------------------------------------
// Proposals
// ---------------------------------------------------------------------------

/// Category of governance action.
///
/// Determines the metadata template and the voting-platform links rendered
/// into the published document. Adding a kind means adding a variant here and
/// a matching arm in [`crate::render`]; there is no fallback template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    /// Off-chain signalling vote (Snapshot).
    Social,
    /// On-chain executable proposal (Governor contract).
    Executable,
}

impl ProposalKind {
    /// Returns the lowercase name used in front-matter and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Social => "social",
            Self::Executable => "executable",
        }
    }

    /// Returns the prefix shown in front of the proposal number in headings
    /// and pull-request titles (e.g. `EP` in `[EP 7.3]`).
    pub fn number_prefix(self) -> &'static str {
        match self {
            Self::Social => "EP",
            Self::Executable => "EP",
        }
    }
}

impl std::fmt::Display for ProposalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate governance item as yielded by a proposal source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Stable external identifier; the sole de-duplication key.
    pub id: ProposalId,
    /// Governance category.
    pub kind: ProposalKind,
    /// Display handle credited in the rendered document.
    pub author: String,
    /// Proposal title. When present (and found verbatim in `body`) the
    /// metadata block is injected beneath it.
    #[serde(default)]
    pub title: Option<String>,
    /// Raw document text.
    pub body: String,
}

// ---------------------------------------------------------------------------
// Numbering
// ---------------------------------------------------------------------------

/// A one-year governance period used to scope proposal numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Term(u32);

impl Term {
    /// Creates a [`Term`] from a raw integer.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Term-relative proposal number, displayed as `"term.ordinal"` (e.g. `7.3`).
///
/// Assigned once per proposal at publish time and never reused, even when the
/// publication later fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProposalNumber {
    /// Governance term the proposal belongs to.
    pub term: Term,
    /// Position within the term, starting at 1.
    pub ordinal: u32,
}

impl ProposalNumber {
    /// Creates a proposal number, returning `None` for a zero ordinal.
    pub fn new(term: Term, ordinal: u32) -> Option<Self> {
        (ordinal > 0).then_some(Self { term, ordinal })
    }
}

impl std::fmt::Display for ProposalNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.term, self.ordinal)
    }
}

impl FromStr for ProposalNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (term, ordinal) = s
            .split_once('.')
            .ok_or_else(|| format!("expected 'term.ordinal', got '{s}'"))?;
        let term: u32 = term
            .parse()
            .map_err(|_| format!("invalid term in '{s}'"))?;
        let ordinal: u32 = ordinal
            .parse()
            .map_err(|_| format!("invalid ordinal in '{s}'"))?;
        Self::new(Term::new(term), ordinal).ok_or_else(|| format!("ordinal must be positive in '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Repository content
// ---------------------------------------------------------------------------

/// Kind of entry in a repository directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Dir,
    Other,
}

/// One entry of a repository directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// File or directory name (no path components).
    pub name: String,
    pub kind: EntryKind,
}

/// Request to create a new file on a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub branch: BranchName,
    pub path: ArtifactPath,
    pub content: EncodedContent,
    /// Commit message.
    pub message: String,
}

/// Request to open a pull request against an upstream repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    /// Head reference in `"owner:branch"` form.
    pub head: String,
    /// Branch on the upstream repository the pull request targets.
    pub base: BranchName,
    pub title: String,
    pub body: String,
}

/// The branch, file, and pull request created for one proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationArtifact {
    pub number: ProposalNumber,
    pub branch: BranchName,
    pub path: ArtifactPath,
    pub commit: CommitSha,
    pub pull_request: PullRequestUrl,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Returns the calendar year (UTC).
    pub fn year(self) -> i32 {
        self.0.year()
    }

    /// Returns the calendar date (UTC).
    pub fn date(self) -> NaiveDate {
        self.0.date_naive()
    }

    /// Returns the number of whole seconds since the Unix epoch.
    pub fn unix_seconds(self) -> i64 {
        self.0.timestamp()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
