//! Proposal document rendering.
//!
//! [`render`] turns a raw [`Proposal`] into the document committed to the
//! documentation repository:
//!
//! 1. the first occurrence of the title in the body is replaced with a numbered
//!    heading, the authors placeholder, and a kind-specific metadata table;
//! 2. a YAML front-matter block with `authors` and `proposal.type` is
//!    prepended;
//! 3. the result is pretty-printed by a [`DocumentFormatter`];
//! 4. the text is base64-encoded for the repository content API.
//!
//! A title that does not occur verbatim in the body leaves the body untouched;
//! the document then carries front-matter only.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::{DocumentFormatter, FormatError};
use crate::{Proposal, ProposalId, ProposalKind, ProposalNumber};

/// Directive the documentation site expands into the author list.
pub const AUTHORS_PLACEHOLDER: &str = "::authors";

/// Errors produced while rendering a proposal.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to serialise front-matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),

    #[error("document could not be formatted: {0}")]
    Format(#[from] FormatError),
}

/// Errors produced when decoding [`EncodedContent`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("content is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("content is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

// ---------------------------------------------------------------------------
// Voting links
// ---------------------------------------------------------------------------

/// Deployment-specific locations that metadata tables link to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingLinks {
    /// Snapshot space (e.g. `ens.eth`).
    pub snapshot_space: String,
    /// Tally organisation slug (e.g. `ens`).
    pub tally_slug: String,
    /// Agora instance base URL.
    pub agora_url: String,
    /// Discussion forum, linked from every metadata table.
    pub forum_url: String,
}

impl Default for VotingLinks {
    fn default() -> Self {
        Self {
            snapshot_space: "ens.eth".to_string(),
            tally_slug: "ens".to_string(),
            agora_url: "https://agora.ensdao.org".to_string(),
            forum_url: "https://discuss.ens.domains".to_string(),
        }
    }
}

impl VotingLinks {
    /// Snapshot voting page for a social proposal.
    pub fn snapshot(&self, id: &ProposalId) -> String {
        format!("https://snapshot.org/#/{}/proposal/{id}", self.snapshot_space)
    }

    /// Tally voting page for an executable proposal.
    pub fn tally(&self, id: &ProposalId) -> String {
        format!("https://www.tally.xyz/gov/{}/proposal/{id}", self.tally_slug)
    }

    /// Agora voting page for an executable proposal.
    pub fn agora(&self, id: &ProposalId) -> String {
        format!("{}/proposals/{id}", self.agora_url.trim_end_matches('/'))
    }

    /// The primary place to vote on a proposal of `kind`.
    pub fn primary(&self, kind: ProposalKind, id: &ProposalId) -> String {
        match kind {
            ProposalKind::Social => self.snapshot(id),
            ProposalKind::Executable => self.tally(id),
        }
    }
}

/// Builds the metadata table shown under the heading.
///
/// One template per kind; the match is exhaustive so a new kind cannot be
/// published without a template.
fn metadata_table(kind: ProposalKind, id: &ProposalId, links: &VotingLinks) -> String {
    let votes = match kind {
        ProposalKind::Social => format!("[Snapshot]({})", links.snapshot(id)),
        ProposalKind::Executable => format!(
            "[Tally]({}), [Agora]({})",
            links.tally(id),
            links.agora(id)
        ),
    };
    format!(
        "| **Status** | Active |\n\
         | --- | --- |\n\
         | **Discussion Thread** | [Forum]({forum}) |\n\
         | **Votes** | {votes} |",
        forum = links.forum_url,
    )
}

/// Heading text for a numbered proposal, e.g. `[EP 7.3] Fund X`.
pub fn numbered_title(kind: ProposalKind, number: ProposalNumber, title: &str) -> String {
    format!("[{} {number}] {title}", kind.number_prefix())
}

// ---------------------------------------------------------------------------
// Front-matter
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct FrontMatter {
    authors: Vec<String>,
    proposal: ProposalMeta,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct ProposalMeta {
    #[serde(rename = "type")]
    kind: ProposalKind,
}

// ---------------------------------------------------------------------------
// Encoded content
// ---------------------------------------------------------------------------

/// Base64 (standard alphabet, padded) encoding of UTF-8 document text, as
/// accepted by the repository content API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedContent(String);

impl EncodedContent {
    /// Encodes `text`.
    pub fn from_text(text: &str) -> Self {
        Self(STANDARD.encode(text.as_bytes()))
    }

    /// Returns the encoded payload.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes back to the original text.
    pub fn decode(&self) -> Result<String, DecodeError> {
        Ok(String::from_utf8(STANDARD.decode(&self.0)?)?)
    }
}

/// A formatted document together with its transport encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    text: String,
    content: EncodedContent,
}

impl RenderedDocument {
    fn new(text: String) -> Self {
        let content = EncodedContent::from_text(&text);
        Self { text, content }
    }

    /// The formatted document text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The encoded payload to commit.
    pub fn content(&self) -> &EncodedContent {
        &self.content
    }

    /// Consumes the document, returning the encoded payload.
    pub fn into_content(self) -> EncodedContent {
        self.content
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Renders `proposal` as proposal `number`.
///
/// # Errors
///
/// [`RenderError::Format`] when the body is malformed (e.g. an unclosed code
/// fence). A title missing from the body is not an error.
pub fn render<F>(
    proposal: &Proposal,
    number: ProposalNumber,
    links: &VotingLinks,
    formatter: &F,
) -> Result<RenderedDocument, RenderError>
where
    F: DocumentFormatter + ?Sized,
{
    let body = inject_metadata(proposal, number, links);

    let front_matter = serde_yaml::to_string(&FrontMatter {
        authors: vec![proposal.author.clone()],
        proposal: ProposalMeta {
            kind: proposal.kind,
        },
    })?;

    let text = format!("---\n{front_matter}---\n\n{body}");
    Ok(RenderedDocument::new(formatter.format(&text)?))
}

fn inject_metadata(proposal: &Proposal, number: ProposalNumber, links: &VotingLinks) -> String {
    let Some(title) = proposal.title.as_deref().filter(|t| !t.is_empty()) else {
        return proposal.body.clone();
    };
    if !proposal.body.contains(title) {
        return proposal.body.clone();
    }

    let block = format!(
        "{heading}\n\n{AUTHORS_PLACEHOLDER}\n\n{table}\n",
        heading = numbered_title(proposal.kind, number, title),
        table = metadata_table(proposal.kind, &proposal.id, links),
    );
    proposal.body.replacen(title, &block, 1)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::format::MdxFormatter;
    use crate::Term;

    fn proposal(kind: ProposalKind, author: &str, title: Option<&str>, body: &str) -> Proposal {
        Proposal {
            id: ProposalId::new("42").unwrap(),
            kind,
            author: author.to_string(),
            title: title.map(str::to_string),
            body: body.to_string(),
        }
    }

    fn number() -> ProposalNumber {
        ProposalNumber::new(Term::new(7), 3).unwrap()
    }

    fn front_matter_of(text: &str) -> serde_yaml::Value {
        let rest = text.strip_prefix("---\n").unwrap();
        let end = rest.find("\n---\n").unwrap();
        serde_yaml::from_str(&rest[..end]).unwrap()
    }

    #[test]
    fn social_proposal_gets_numbered_heading_and_snapshot_table() {
        let p = proposal(
            ProposalKind::Social,
            "alice.eth",
            Some("Fund X"),
            "# Fund X\n\nDetails...",
        );
        let doc = render(&p, number(), &VotingLinks::default(), &MdxFormatter).unwrap();

        let expected_body = "\
# [EP 7.3] Fund X

::authors

| **Status**            | Active                                                 |
| --------------------- | ------------------------------------------------------ |
| **Discussion Thread** | [Forum](https://discuss.ens.domains)                   |
| **Votes**             | [Snapshot](https://snapshot.org/#/ens.eth/proposal/42) |

Details...
";
        let (_, body) = doc.text().split_once("\n---\n\n").unwrap();
        assert!(doc.text().starts_with("---\n"));
        assert_eq!(body, expected_body);
    }

    #[test]
    fn front_matter_carries_authors_and_type() {
        let p = proposal(ProposalKind::Social, "alice.eth", Some("Fund X"), "# Fund X\n");
        let doc = render(&p, number(), &VotingLinks::default(), &MdxFormatter).unwrap();

        let fm = front_matter_of(doc.text());
        assert_eq!(fm["authors"][0].as_str(), Some("alice.eth"));
        assert_eq!(fm["authors"].as_sequence().map(Vec::len), Some(1));
        assert_eq!(fm["proposal"]["type"].as_str(), Some("social"));
    }

    #[test]
    fn executable_proposal_links_tally_and_agora() {
        let p = proposal(ProposalKind::Executable, "bob.eth", Some("Upgrade"), "# Upgrade\n");
        let doc = render(&p, number(), &VotingLinks::default(), &MdxFormatter).unwrap();

        assert!(doc.text().contains("# [EP 7.3] Upgrade"));
        assert!(doc.text().contains("[Tally](https://www.tally.xyz/gov/ens/proposal/42)"));
        assert!(doc.text().contains("[Agora](https://agora.ensdao.org/proposals/42)"));
        assert!(!doc.text().contains("snapshot.org"));
        assert_eq!(front_matter_of(doc.text())["proposal"]["type"].as_str(), Some("executable"));
    }

    #[test]
    fn only_first_title_occurrence_is_replaced() {
        let p = proposal(
            ProposalKind::Social,
            "alice.eth",
            Some("Fund X"),
            "# Fund X\n\nWhy Fund X matters.",
        );
        let doc = render(&p, number(), &VotingLinks::default(), &MdxFormatter).unwrap();
        assert!(doc.text().contains("# [EP 7.3] Fund X"));
        assert!(doc.text().contains("Why Fund X matters."));
        assert_eq!(doc.text().matches(AUTHORS_PLACEHOLDER).count(), 1);
    }

    #[test]
    fn missing_title_degrades_to_front_matter_only() {
        let body = "# Something else\n\nDetails...\n";
        let p = proposal(ProposalKind::Social, "alice.eth", Some("Fund X"), body);
        let doc = render(&p, number(), &VotingLinks::default(), &MdxFormatter).unwrap();

        assert!(!doc.text().contains("| **Votes**"));
        assert!(!doc.text().contains(AUTHORS_PLACEHOLDER));
        let bare = render(
            &proposal(ProposalKind::Social, "alice.eth", None, body),
            number(),
            &VotingLinks::default(),
            &MdxFormatter,
        )
        .unwrap();
        assert_eq!(doc.text(), bare.text());
        assert!(doc.text().ends_with("---\n\n# Something else\n\nDetails...\n"));
    }

    #[test]
    fn rendered_output_is_a_formatting_fixed_point() {
        let p = proposal(
            ProposalKind::Executable,
            "carol.eth",
            Some("Upgrade"),
            "# Upgrade\r\n\r\n\r\n* step one\n+ step two\n\n```sol\ncall();   \n```\n",
        );
        let doc = render(&p, number(), &VotingLinks::default(), &MdxFormatter).unwrap();
        assert_eq!(MdxFormatter.format(doc.text()).unwrap(), doc.text());
    }

    #[test]
    fn encoded_content_round_trips_non_ascii() {
        let p = proposal(
            ProposalKind::Social,
            "🦄 unicorn.eth",
            Some("Fonds für Ökosystem 🚀"),
            "# Fonds für Ökosystem 🚀\n\nÜbersicht",
        );
        let doc = render(&p, number(), &VotingLinks::default(), &MdxFormatter).unwrap();

        let decoded = doc.content().decode().unwrap();
        assert_eq!(decoded, doc.text());
        assert_eq!(front_matter_of(&decoded)["authors"][0].as_str(), Some("🦄 unicorn.eth"));
        assert!(decoded.contains("# [EP 7.3] Fonds für Ökosystem 🚀"));
    }

    #[test]
    fn malformed_body_is_a_render_error() {
        let p = proposal(ProposalKind::Social, "alice.eth", None, "```\nnever closed\n");
        let err = render(&p, number(), &VotingLinks::default(), &MdxFormatter).unwrap_err();
        assert!(matches!(err, RenderError::Format(FormatError::UnterminatedFence { .. })));
    }
}
