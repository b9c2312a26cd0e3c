//! Executable proposals from a Governor contract's `ProposalCreated` logs.
//!
//! The event is
//! `ProposalCreated(uint256,address,address[],uint256[],string[],bytes[],uint256,uint256,string)`
//! with no indexed parameters, so everything is ABI-encoded in the log data.
//! Only `proposalId`, `proposer`, and `description` are decoded.

use async_trait::async_trait;
use pipeline::{Proposal, ProposalId, ProposalKind, ProposalSource, SourceError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// keccak256 of the `ProposalCreated` event signature.
pub const PROPOSAL_CREATED_TOPIC: &str =
    "0x7d84a6263ae0d98d3329bd7b46bb4e8d6f98cd35a7adb45c274c8b7fd5ebd5e0";

const SOURCE_NAME: &str = "governor";
const WORD: usize = 32;

// Head slots of the ProposalCreated data.
const SLOT_PROPOSAL_ID: usize = 0;
const SLOT_PROPOSER: usize = 1;
const SLOT_DESCRIPTION: usize = 8;
const HEAD_SLOTS: usize = 9;

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogEntry {
    data: String,
    #[serde(default)]
    removed: bool,
    #[serde(default)]
    transaction_hash: Option<String>,
}

/// Polls a Governor contract for proposals created in the last
/// `lookback_blocks` blocks.
pub struct GovernorSource {
    http: reqwest::Client,
    rpc_url: String,
    address: String,
    lookback_blocks: u64,
}

impl GovernorSource {
    pub fn new(
        rpc_url: impl Into<String>,
        address: impl Into<String>,
        lookback_blocks: u64,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            http: crate::http_client(SOURCE_NAME)?,
            rpc_url: rpc_url.into(),
            address: address.into(),
            lookback_blocks,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, SourceError> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let response: RpcResponse<T> =
            crate::post_json(SOURCE_NAME, self.http.post(&self.rpc_url).json(&body)).await?;
        if let Some(err) = response.error {
            return Err(invalid(format!("{method} failed ({}): {}", err.code, err.message)));
        }
        response
            .result
            .ok_or_else(|| invalid(format!("{method} returned no result")))
    }
}

#[async_trait]
impl ProposalSource for GovernorSource {
    async fn fetch_candidates(&self) -> Result<Vec<Proposal>, SourceError> {
        let latest: String = self.call("eth_blockNumber", json!([])).await?;
        let latest = parse_quantity(&latest)?;
        let from = latest.saturating_sub(self.lookback_blocks);

        debug!(address = %self.address, from, latest, "querying ProposalCreated logs");
        let filter = json!([{
            "address": self.address,
            "fromBlock": format!("{from:#x}"),
            "toBlock": format!("{latest:#x}"),
            "topics": [PROPOSAL_CREATED_TOPIC],
        }]);
        let logs: Vec<LogEntry> = self.call("eth_getLogs", filter).await?;

        let mut proposals = Vec::with_capacity(logs.len());
        for log in logs.into_iter().filter(|l| !l.removed) {
            match proposal_from_log(&log.data) {
                Ok(proposal) => proposals.push(proposal),
                Err(err) => {
                    warn!(tx = log.transaction_hash.as_deref(), error = %err, "skipping undecodable ProposalCreated log");
                }
            }
        }
        Ok(proposals)
    }
}

fn invalid(message: String) -> SourceError {
    SourceError::InvalidResponse {
        source_name: SOURCE_NAME.to_string(),
        message,
    }
}

fn parse_quantity(hex_quantity: &str) -> Result<u64, SourceError> {
    let digits = hex_quantity.trim_start_matches("0x");
    u64::from_str_radix(digits, 16)
        .map_err(|e| invalid(format!("bad block number '{hex_quantity}': {e}")))
}

// ---------------------------------------------------------------------------
// ABI decoding
// ---------------------------------------------------------------------------

fn proposal_from_log(data: &str) -> Result<Proposal, SourceError> {
    let bytes = hex::decode(data.trim_start_matches("0x"))
        .map_err(|e| invalid(format!("log data is not hex: {e}")))?;
    let abi = AbiData(&bytes);

    if bytes.len() < HEAD_SLOTS * WORD {
        return Err(invalid(format!("log data too short: {} bytes", bytes.len())));
    }
    let id = uint256_to_decimal(abi.word(SLOT_PROPOSAL_ID)?);
    let proposer = format!("0x{}", hex::encode(&abi.word(SLOT_PROPOSER)?[12..]));
    let description = abi.string_at(abi.offset(SLOT_DESCRIPTION)?)?;

    let id = ProposalId::new(id.as_str()).ok_or_else(|| invalid(format!("bad proposal id '{id}'")))?;
    Ok(Proposal {
        id,
        kind: ProposalKind::Executable,
        author: proposer,
        title: crate::first_heading(&description),
        body: description,
    })
}

struct AbiData<'a>(&'a [u8]);

impl<'a> AbiData<'a> {
    fn slice(&self, start: usize, len: usize) -> Result<&'a [u8], SourceError> {
        start
            .checked_add(len)
            .and_then(|end| self.0.get(start..end))
            .ok_or_else(|| invalid(format!("ABI read of {len} bytes at {start} out of bounds")))
    }

    fn word(&self, slot: usize) -> Result<&'a [u8], SourceError> {
        self.slice(slot * WORD, WORD)
    }

    fn offset(&self, slot: usize) -> Result<usize, SourceError> {
        word_to_usize(self.word(slot)?)
    }

    /// Reads a dynamic `string` whose length word starts at byte `at`.
    fn string_at(&self, at: usize) -> Result<String, SourceError> {
        let len = word_to_usize(self.slice(at, WORD)?)?;
        let raw = self.slice(at + WORD, len)?;
        String::from_utf8(raw.to_vec()).map_err(|e| invalid(format!("description is not UTF-8: {e}")))
    }
}

fn word_to_usize(word: &[u8]) -> Result<usize, SourceError> {
    let (high, low) = word.split_at(WORD - 8);
    if high.iter().any(|&b| b != 0) {
        return Err(invalid("ABI offset or length does not fit in 64 bits".to_string()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(low);
    usize::try_from(u64::from_be_bytes(buf))
        .map_err(|_| invalid("ABI offset or length does not fit in usize".to_string()))
}

/// Big-endian unsigned integer to its decimal string.
fn uint256_to_decimal(word: &[u8]) -> String {
    let mut n = word.to_vec();
    let mut digits = Vec::new();
    while n.iter().any(|&b| b != 0) {
        let mut rem = 0u32;
        for byte in n.iter_mut() {
            let acc = (rem << 8) | u32::from(*byte);
            *byte = (acc / 10) as u8;
            rem = acc % 10;
        }
        digits.push(rem as u8);
    }
    if digits.is_empty() {
        return "0".to_string();
    }
    digits.iter().rev().map(|d| char::from(b'0' + d)).collect()
}
