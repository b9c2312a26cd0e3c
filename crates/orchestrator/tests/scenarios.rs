//! End-to-end publication scenarios against in-memory collaborators.

mod common;

use std::sync::Arc;

use common::*;
use orchestrator::{PublishError, PublishOutcome};
use pipeline::{BranchName, ProposalId, SeenStore};
use pretty_assertions::assert_eq;
use store::MemorySeenStore;

fn id(s: &str) -> ProposalId {
    ProposalId::new(s).unwrap()
}

#[tokio::test]
async fn new_social_proposal_is_numbered_committed_and_opened() {
    let repo = FakeRepository::with_files(&["7.1.mdx", "7.2.mdx", "6.1.mdx"]);
    let h = harness(repo, FakeSource::with(vec![proposal("42", "Fund X")]));

    let report = h.controller.run_once(now()).await.unwrap();

    assert!(report.is_clean());
    assert_eq!(report.published.len(), 1);
    let artifact = &report.published[0];
    assert_eq!(artifact.number.to_string(), "7.3");
    assert_eq!(artifact.branch.as_str(), "prop/42");
    assert_eq!(artifact.path.as_str(), "src/pages/dao/proposals/7.3.mdx");
    assert_eq!(
        artifact.pull_request.as_str(),
        "https://github.com/ensdomains/docs/pull/1"
    );

    let commits = h.repo.commits();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].repo, fork());
    assert_eq!(commits[0].branch, "prop/42");
    assert_eq!(commits[0].message, "Add EP 7.3");
    let text = &commits[0].text;
    assert!(text.starts_with("---\n"));
    assert!(text.contains("alice.eth"));
    assert!(text.contains("type: social"));
    assert!(text.contains("# [EP 7.3] Fund X"));
    assert!(text.contains("::authors"));
    assert!(text.contains("https://snapshot.org/#/ens.eth/proposal/42"));

    let prs = h.repo.pull_requests();
    assert_eq!(prs.len(), 1);
    assert_eq!(prs[0].repo, upstream());
    assert_eq!(prs[0].request.title, "Add EP 7.3");
    assert_eq!(prs[0].request.head, "scribe-bot:prop/42");
    assert_eq!(prs[0].request.base.as_str(), "main");
    assert!(prs[0].request.body.contains("EP 7.3"));

    assert_eq!(h.repo.state.lock().unwrap().listed_repos, vec![upstream()]);
    assert!(h.seen.exists(&id("42")).await.unwrap());
    assert_eq!(h.notifier.messages().len(), 1);
    assert!(h.notifier.messages()[0].contains("Fund X"));
}

#[tokio::test]
async fn duplicate_delivery_before_marker_is_a_no_op() {
    let repo = FakeRepository::with_files(&["7.1.mdx", "7.2.mdx"]);
    let source = FakeSource::with(vec![proposal("42", "Fund X")]);

    // Two runs with independent seen stores: the marker from the first never
    // reached the second.
    let first = harness(repo.clone(), source.clone());
    let report = first.controller.run_once(now()).await.unwrap();
    assert_eq!(report.published.len(), 1);

    let second = harness(repo.clone(), source);
    let report = second.controller.run_once(now()).await.unwrap();
    assert!(report.published.is_empty());
    assert_eq!(report.already_started, vec![id("42")]);
    assert!(second.seen.exists(&id("42")).await.unwrap());

    assert_eq!(repo.branch_count(), 1);
    assert_eq!(repo.commits().len(), 1);
    assert_eq!(repo.pull_requests().len(), 1);
}

#[tokio::test]
async fn publishing_twice_returns_already_started() {
    let repo = FakeRepository::with_files(&[]);
    let publisher = publisher_for(repo.clone(), target());
    let p = proposal("42", "Fund X");

    let first = publisher.publish(&p, now()).await.unwrap();
    assert!(matches!(first, PublishOutcome::Published(_)));

    let second = publisher.publish(&p, now()).await.unwrap();
    match second {
        PublishOutcome::AlreadyStarted { branch } => assert_eq!(branch.as_str(), "prop/42"),
        other => panic!("expected AlreadyStarted, got {other:?}"),
    }
    assert_eq!(repo.branch_count(), 1);
    assert_eq!(repo.pull_requests().len(), 1);
}

#[tokio::test]
async fn listing_failure_creates_nothing_and_retries_next_run() {
    let repo = FakeRepository::with_files(&["7.1.mdx"]);
    repo.update(|s| s.fail_listing = true);
    let h = harness(repo.clone(), FakeSource::with(vec![proposal("42", "Fund X")]));

    let report = h.controller.run_once(now()).await.unwrap();
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].retryable);
    assert_eq!(repo.branch_count(), 0);
    assert!(!h.seen.exists(&id("42")).await.unwrap());

    repo.update(|s| s.fail_listing = false);
    let report = h.controller.run_once(now()).await.unwrap();
    assert_eq!(report.published.len(), 1);
    assert_eq!(report.published[0].number.to_string(), "7.2");
    assert!(h.seen.exists(&id("42")).await.unwrap());
}

#[tokio::test]
async fn non_directory_listing_fails_assignment() {
    let repo = FakeRepository::with_files(&[]);
    repo.update(|s| s.listing_is_file = true);
    let publisher = publisher_for(repo.clone(), target());

    let err = publisher.assign_number(now()).await.unwrap_err();
    assert!(matches!(err, PublishError::Listing { .. }));
    assert!(!err.retry_policy().is_retryable());
    assert_eq!(repo.branch_count(), 0);
}

#[tokio::test]
async fn source_failure_aborts_run_without_markers() {
    let source = FakeSource::with(vec![proposal("42", "Fund X")]);
    *source.fail.lock().unwrap() = true;
    let h = harness(FakeRepository::with_files(&[]), source);

    assert!(h.controller.run_once(now()).await.is_err());
    assert!(h.seen.is_empty().await);
    assert!(h.notifier.messages().is_empty());
    assert_eq!(h.repo.branch_count(), 0);
}

#[tokio::test]
async fn commit_failure_orphans_branch_and_next_run_stalls() {
    let repo = FakeRepository::with_files(&[]);
    repo.update(|s| s.fail_commit = true);
    let h = harness(repo.clone(), FakeSource::with(vec![proposal("42", "Fund X")]));

    let report = h.controller.run_once(now()).await.unwrap();
    assert_eq!(report.failed.len(), 1);
    assert!(!report.failed[0].retryable);
    assert_eq!(repo.branch_count(), 1);
    assert!(repo.pull_requests().is_empty());
    assert!(!h.seen.exists(&id("42")).await.unwrap());

    // The retry finds the orphaned branch and gives up without a commit.
    repo.update(|s| s.fail_commit = false);
    let report = h.controller.run_once(now()).await.unwrap();
    assert_eq!(report.already_started, vec![id("42")]);
    assert!(repo.commits().is_empty());
    assert!(repo.pull_requests().is_empty());
}

#[tokio::test]
async fn pull_request_failure_leaves_branch_and_commit() {
    let repo = FakeRepository::with_files(&[]);
    repo.update(|s| s.fail_pull_request = true);
    let publisher = publisher_for(repo.clone(), target());

    let err = publisher.publish(&proposal("42", "Fund X"), now()).await.unwrap_err();
    assert!(matches!(err, PublishError::PullRequest { .. }));
    assert_eq!(err.orphaned_branch().map(|b| b.as_str()), Some("prop/42"));
    assert_eq!(repo.commits().len(), 1);
    assert!(repo.pull_requests().is_empty());
}

#[tokio::test]
async fn malformed_body_fails_before_any_branch_exists() {
    let mut p = proposal("42", "Fund X");
    p.body = "# Fund X\n\n```\nunterminated".to_string();
    let repo = FakeRepository::with_files(&[]);
    let h = harness(repo.clone(), FakeSource::with(vec![p]));

    for _ in 0..2 {
        let report = h.controller.run_once(now()).await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(!report.failed[0].retryable);
        assert!(report.failed[0].reason.contains("never closed"));
    }
    assert_eq!(repo.branch_count(), 0);
    assert!(!h.seen.exists(&id("42")).await.unwrap());
}

#[tokio::test]
async fn notification_failure_does_not_block_publication() {
    let notifier = FakeNotifier {
        fail: true,
        ..FakeNotifier::default()
    };
    let h = harness_with(
        FakeRepository::with_files(&[]),
        FakeSource::with(vec![proposal("42", "Fund X")]),
        Arc::new(MemorySeenStore::default()),
        notifier,
        5,
    );

    let report = h.controller.run_once(now()).await.unwrap();
    assert_eq!(report.published.len(), 1);
    assert!(h.seen.exists(&id("42")).await.unwrap());
}

#[tokio::test]
async fn seen_and_duplicate_candidates_are_skipped() {
    let seen = Arc::new(MemorySeenStore::with_ids([id("1")]));
    let h = harness_with(
        FakeRepository::with_files(&[]),
        FakeSource::with(vec![
            proposal("1", "Old"),
            proposal("2", "New"),
            proposal("2", "New"),
        ]),
        seen,
        FakeNotifier::default(),
        5,
    );

    let report = h.controller.run_once(now()).await.unwrap();
    assert_eq!(report.skipped_seen, 1);
    assert_eq!(report.published.len(), 1);
    assert_eq!(report.published[0].branch.as_str(), "prop/2");
    assert_eq!(h.notifier.messages().len(), 1);
}

#[tokio::test]
async fn proposals_beyond_the_run_limit_are_deferred() {
    let h = harness_with(
        FakeRepository::with_files(&[]),
        FakeSource::with(vec![proposal("1", "A"), proposal("2", "B"), proposal("3", "C")]),
        Arc::new(MemorySeenStore::default()),
        FakeNotifier::default(),
        2,
    );

    let report = h.controller.run_once(now()).await.unwrap();
    assert_eq!(report.published.len(), 2);
    assert_eq!(report.deferred, vec![id("3")]);
    assert!(!h.seen.exists(&id("3")).await.unwrap());
}

#[tokio::test]
async fn same_run_proposals_share_a_number() {
    // The listing snapshot does not see files on unmerged branches, so both
    // proposals are numbered 7.1 on separate branches.
    let h = harness(
        FakeRepository::with_files(&[]),
        FakeSource::with(vec![proposal("1", "A"), proposal("2", "B")]),
    );

    let report = h.controller.run_once(now()).await.unwrap();
    let numbers: Vec<String> = report.published.iter().map(|a| a.number.to_string()).collect();
    assert_eq!(numbers, vec!["7.1", "7.1"]);
    let branches: Vec<&str> = report.published.iter().map(|a| a.branch.as_str()).collect();
    assert_eq!(branches, vec!["prop/1", "prop/2"]);
}

#[tokio::test]
async fn listing_change_before_commit_surfaces_as_collision() {
    let repo = FakeRepository::with_files(&["7.1.mdx"]);
    repo.update(|s| s.lands_after_listing = Some("7.2.mdx".to_string()));
    let h = harness(repo.clone(), FakeSource::with(vec![proposal("42", "Fund X")]));

    let report = h.controller.run_once(now()).await.unwrap();
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].reason.contains("already exists"));
    assert!(!report.failed[0].retryable);
    assert_eq!(repo.branch_count(), 1);
    assert!(repo.commits().is_empty());
    assert!(!h.seen.exists(&id("42")).await.unwrap());
}

#[tokio::test]
async fn dev_mode_opens_pull_request_against_the_fork() {
    let repo = FakeRepository::with_files(&[]);
    let publisher = publisher_for(repo.clone(), target().into_dev_mode());

    publisher.publish(&proposal("42", "Fund X"), now()).await.unwrap();

    let prs = repo.pull_requests();
    assert_eq!(prs[0].repo, fork());
    assert_eq!(repo.state.lock().unwrap().listed_repos, vec![fork()]);
}

#[tokio::test]
async fn numbering_and_pull_request_use_the_configured_base_branch() {
    let repo = FakeRepository::with_files(&[]);
    let mut custom = target();
    custom.base_branch = BranchName::new("release/docs").unwrap();
    let publisher = publisher_for(repo.clone(), custom);

    publisher.publish(&proposal("42", "Fund X"), now()).await.unwrap();

    assert_eq!(repo.state.lock().unwrap().listed_branches, vec!["release/docs".to_string()]);
    assert_eq!(repo.pull_requests()[0].request.base.as_str(), "release/docs");
}
