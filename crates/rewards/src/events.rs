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


//! Classification of delegation contract transactions into stake deltas.

use alloy_primitives::{I256, U256};
use thiserror::Error;

use crate::{
    source::{ContractResultSource, DataSourceError, EventRecord},
    units::{parse_hex_amount, parse_integer_amount, UnitsError},
};

/// Call data of a delegation.
pub const DELEGATE: &[u8] = b"delegate";
/// Call data prefix of an undelegation; the remainder is the hex encoded amount.
pub const UNDELEGATE_PREFIX: &[u8] = b"unDelegate@";
/// Call data of a rewards redelegation.
pub const REDELEGATE_REWARDS: &[u8] = b"reDelegateRewards";
/// System account that receives the compounded rewards of a redelegation.
pub const STAKING_REWARDS_ADDRESS: &str =
    "erd1qqqqqqqqqqqqqqqpqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqplllst77y4l";
/// Number of smart contract results inspected per redelegation.
pub const MAX_CONTRACT_RESULTS: usize = 10;

/// Category of a delegation contract transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeEventKind {
    Increase,
    Decrease,
    RewardCompounding,
    Irrelevant,
}

/// How malformed amount literals are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParsePolicy {
    /// Abort the run on the first malformed literal.
    #[default]
    Strict,
    /// Count the event as a zero delta and log a warning.
    Lenient,
}

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("failed to fetch smart contract results of {tx_hash}: {source}")]
    DataSource {
        tx_hash: String,
        #[source]
        source: DataSourceError,
    },

    #[error("malformed amount in transaction {tx_hash}: {source}")]
    NumericParse {
        tx_hash: String,
        #[source]
        source: UnitsError,
    },
}

/// Result of classifying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub kind: StakeEventKind,
    /// Signed stake change in minor units of the staked token.
    pub delta: I256,
}

impl ClassifiedEvent {
    fn irrelevant() -> Self {
        Self { kind: StakeEventKind::Irrelevant, delta: I256::ZERO }
    }
}

/// Determine the category of an event from its status and call data.
pub fn event_kind(event: &EventRecord) -> StakeEventKind {
    if !event.is_success() {
        return StakeEventKind::Irrelevant;
    }
    let data = event.data.as_slice();
    if data == DELEGATE {
        StakeEventKind::Increase
    } else if data.starts_with(UNDELEGATE_PREFIX) {
        StakeEventKind::Decrease
    } else if data == REDELEGATE_REWARDS {
        StakeEventKind::RewardCompounding
    } else {
        StakeEventKind::Irrelevant
    }
}

fn signed(amount: U256) -> Result<I256, UnitsError> {
    I256::try_from(amount).map_err(|_| UnitsError::Overflow)
}

fn undelegated_amount(data: &[u8]) -> Result<U256, UnitsError> {
    let suffix = &data[UNDELEGATE_PREFIX.len()..];
    let literal = std::str::from_utf8(suffix).map_err(|_| {
        UnitsError::InvalidNumericLiteral(String::from_utf8_lossy(suffix).into_owned())
    })?;
    parse_hex_amount(literal)
}

/// Turns delegation contract transactions into signed stake deltas.
pub struct EventClassifier<'a, R: ?Sized> {
    results: &'a R,
    staking_contract: &'a str,
    policy: ParsePolicy,
}

impl<'a, R: ContractResultSource + ?Sized> EventClassifier<'a, R> {
    pub fn new(results: &'a R, staking_contract: &'a str, policy: ParsePolicy) -> Self {
        Self { results, staking_contract, policy }
    }

    /// Classify an event and compute the stake delta it implies for its sender.
    ///
    /// Redelegations trigger one extra fetch of the transaction's smart contract results; a
    /// failure of that fetch is returned as is, without retry.
    pub async fn classify(&self, event: &EventRecord) -> Result<ClassifiedEvent, ClassifyError> {
        let kind = event_kind(event);
        let delta = match kind {
            StakeEventKind::Irrelevant => return Ok(ClassifiedEvent::irrelevant()),
            StakeEventKind::Increase => parse_integer_amount(&event.value).and_then(signed),
            StakeEventKind::Decrease => undelegated_amount(&event.data).and_then(signed).map(|v| -v),
            StakeEventKind::RewardCompounding => match self.compounded_value(event).await? {
                Some(value) => parse_integer_amount(&value).and_then(signed),
                None => {
                    tracing::debug!("No compounded rewards found for redelegation {}", event.hash);
                    Ok(I256::ZERO)
                }
            },
        };

        let delta = match delta {
            Ok(delta) => delta,
            Err(source) => self.absorb(event, source)?,
        };
        Ok(ClassifiedEvent { kind, delta })
    }

    async fn compounded_value(&self, event: &EventRecord) -> Result<Option<String>, ClassifyError> {
        let results = self
            .results
            .fetch_contract_results(&event.hash, MAX_CONTRACT_RESULTS)
            .await
            .map_err(|source| ClassifyError::DataSource { tx_hash: event.hash.clone(), source })?;

        // The last matching result wins.
        Ok(results
            .into_iter()
            .rev()
            .find(|r| r.receiver == STAKING_REWARDS_ADDRESS && r.sender == self.staking_contract)
            .map(|r| r.value))
    }

    fn absorb(&self, event: &EventRecord, source: UnitsError) -> Result<I256, ClassifyError> {
        match self.policy {
            ParsePolicy::Strict => {
                Err(ClassifyError::NumericParse { tx_hash: event.hash.clone(), source })
            }
            ParsePolicy::Lenient => {
                tracing::warn!(
                    "Counting transaction {} from {} as zero stake change: {}",
                    event.hash,
                    event.sender,
                    source
                );
                Ok(I256::ZERO)
            }
        }
    }
}
