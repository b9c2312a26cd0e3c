//! propscribe orchestration: the publisher and the per-tick run controller.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** This crate sequences calls between business logic
//! in the [`pipeline`] crate and the infrastructure traits (proposal source,
//! seen-set store, notifier, documentation repository). It contains no
//! transport code.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`publisher`] | Number, render, branch, commit, and pull request for one proposal |
//! | [`controller`] | One tick: fetch, filter by seen markers, notify, publish, record |

pub mod controller;
pub mod publisher;

pub use controller::{alert_text, FailedProposal, RunController, RunError, RunReport, RunSettings};
pub use publisher::{PublishError, PublishOutcome, PublishTarget, Publisher};
