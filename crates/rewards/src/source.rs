// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Data source abstractions consumed by the bonus computation.

use alloy_primitives::U256;
use async_trait::async_trait;
use thiserror::Error;

/// Status reported by the indexer for a successfully executed transaction.
pub const STATUS_SUCCESS: &str = "success";

/// Failure to retrieve data from the indexer or the gateway. Always fatal for a run.
#[derive(Error, Debug)]
pub enum DataSourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("gateway returned an error: {0}")]
    Gateway(String),

    #[error("token {0} not found")]
    TokenNotFound(String),

    #[error("invalid decimals for token {token}: {value:?}")]
    InvalidDecimals { token: String, value: String },

    #[error("{0}")]
    Unavailable(String),
}

/// One indexed ledger event: a transaction or a smart contract result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventRecord {
    /// Transaction hash (or smart contract result hash).
    pub hash: String,
    pub sender: String,
    pub receiver: String,
    /// Transferred value in minor units, as a base-10 integer string.
    pub value: String,
    /// Raw call data, e.g. `delegate` or `unDelegate@<hex>`.
    pub data: Vec<u8>,
    pub status: String,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
}

impl EventRecord {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// A page request for events sent to a receiver in `[from, to)`, ascending by timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub receiver: String,
    pub sender: Option<String>,
    pub from: u64,
    pub to: u64,
    pub size: usize,
}

/// Token properties required for amount conversions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDescriptor {
    /// Full token identifier, e.g. `WATER-9ed400`.
    pub identifier: String,
    /// Identifier up to the first `-`, e.g. `WATER`.
    pub ticker: String,
    pub name: String,
    pub decimals: u8,
}

impl TokenDescriptor {
    pub fn new(identifier: &str, name: String, decimals: u8) -> Self {
        let ticker = identifier.split('-').next().unwrap_or(identifier).to_string();
        Self { identifier: identifier.to_string(), ticker, name, decimals }
    }
}

/// Source of historical transactions.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch at most `query.size` events matching the query, ascending by timestamp.
    async fn fetch_events(&self, query: &EventQuery) -> Result<Vec<EventRecord>, DataSourceError>;
}

/// Source of smart contract results produced by a transaction.
#[async_trait]
pub trait ContractResultSource: Send + Sync {
    /// Fetch at most `max` results whose originating transaction is `tx_hash`.
    async fn fetch_contract_results(
        &self,
        tx_hash: &str,
        max: usize,
    ) -> Result<Vec<EventRecord>, DataSourceError>;
}

/// Provider of token metadata.
#[async_trait]
pub trait TokenMetadataProvider: Send + Sync {
    async fn token_descriptor(&self, identifier: &str) -> Result<TokenDescriptor, DataSourceError>;
}

/// Provider of account balances, in minor units.
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn native_balance(&self, address: &str) -> Result<U256, DataSourceError>;

    async fn token_balance(&self, address: &str, token: &str) -> Result<U256, DataSourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_is_identifier_prefix() {
        let token = TokenDescriptor::new("WATER-9ed400", "WaterDrop".into(), 18);
        assert_eq!(token.ticker, "WATER");
        assert_eq!(token.identifier, "WATER-9ed400");

        let plain = TokenDescriptor::new("EGLD", "eGold".into(), 18);
        assert_eq!(plain.ticker, "EGLD");
    }
}
