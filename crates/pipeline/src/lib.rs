//! Core domain for propscribe.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, and port trait used to turn governance proposals into documentation
//! pull requests. Infrastructure crates implement the traits defined here; they
//! never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype domain identifiers (`ProposalId`, `BranchName`, etc.) |
//! | [`types`] | Shared value types (`Proposal`, `Term`, `ProposalNumber`, etc.) |
//! | [`errors`] | Retry policy and port-level error types |
//! | [`term`] | Governance term calculation |
//! | [`numbering`] | Term-relative proposal numbering |
//! | [`format`] | Deterministic document pretty-printing |
//! | [`render`] | Proposal document rendering and encoding |
//! | [`ports`] | Traits implemented by infrastructure crates |

pub mod errors;
pub mod format;
pub mod identifiers;
pub mod numbering;
pub mod ports;
pub mod render;
pub mod term;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{NotifyError, RepositoryError, RetryPolicy, SourceError, StoreError};
pub use format::{DocumentFormatter, FormatError, MdxFormatter};
pub use identifiers::{
    ArtifactPath, BranchName, ChannelId, CommitSha, ProposalId, PullRequestUrl, RepositoryId,
    RunId,
};
pub use numbering::{next_number, NumberingError, NumberingPolicy, OrdinalCorrection};
pub use ports::{DocsRepository, Notifier, ProposalSource, SeenStore};
pub use render::{
    numbered_title, render, DecodeError, EncodedContent, RenderError, RenderedDocument,
    VotingLinks,
};
pub use term::{current_term, TermReference};
pub use types::{
    DirectoryEntry, EntryKind, NewFile, NewPullRequest, Proposal, ProposalKind, ProposalNumber,
    PublicationArtifact, Term, Timestamp,
};
