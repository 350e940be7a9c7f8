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


//! Conversion of time-averaged stakes into bonus amounts.

use alloy_primitives::{I256, U256};
use thiserror::Error;

use crate::{
    aggregator::AggregationResult,
    units::{minor_to_human, pow10, UnitsError},
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("per staked amount must be greater than zero")]
    ZeroDivisor,

    #[error("no aggregation window was processed")]
    NoWindows,

    #[error("bonus computation overflow for account {0}")]
    Overflow(String),

    #[error(transparent)]
    Units(#[from] UnitsError),
}

/// Bonus pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BonusParams {
    /// Whole bonus tokens granted per `per_staked_unit` of average stake.
    pub bonus_pool: u64,
    /// Whole staked tokens earning one `bonus_pool`.
    pub per_staked_unit: u64,
    /// Decimals of the staked token.
    pub stake_decimals: u8,
}

/// One row of the bonus ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct BonusLedgerEntry {
    pub account: String,
    /// Time-averaged stake, in whole staked tokens.
    pub average_stake: f64,
    /// Stake at the end of the last window, in whole staked tokens.
    pub current_balance: f64,
    /// Bonus in whole bonus tokens.
    pub bonus: U256,
}

/// Totals needed to check the distributor's funds before any transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BonusTotals {
    /// Sum of all bonuses, in whole bonus tokens.
    pub total_bonus: U256,
    /// Number of accounts in the ledger.
    pub recipients: usize,
    /// Number of accounts dropped for a negative stake balance.
    pub excluded: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BonusAllocation {
    /// Ledger entries sorted by account.
    pub entries: Vec<BonusLedgerEntry>,
    pub totals: BonusTotals,
}

/// Compute `floor(bonus_pool * average / per_staked_unit)` where `average` is
/// `accumulated / window_count` expressed in whole staked tokens.
///
/// The computation is exact: `floor(pool * accumulated / (windows * per_unit * 10^decimals))`.
/// A negative accumulated stake earns nothing.
pub fn bonus_amount(
    accumulated: I256,
    window_count: u64,
    params: &BonusParams,
) -> Result<U256, AllocationError> {
    if params.per_staked_unit == 0 {
        return Err(AllocationError::ZeroDivisor);
    }
    if window_count == 0 {
        return Err(AllocationError::NoWindows);
    }
    if accumulated.is_negative() {
        return Ok(U256::ZERO);
    }

    let scale = pow10(params.stake_decimals)?;
    let overflow = || AllocationError::Overflow(accumulated.to_string());
    let numerator =
        U256::from(params.bonus_pool).checked_mul(accumulated.into_raw()).ok_or_else(overflow)?;
    let denominator = U256::from(window_count)
        .checked_mul(U256::from(params.per_staked_unit))
        .and_then(|d| d.checked_mul(scale))
        .ok_or_else(overflow)?;

    Ok(numerator / denominator)
}

/// Turn the replayed balances into the bonus ledger.
///
/// Every account with a negative final balance is dropped, whatever its accumulated history.
pub fn allocate_bonus(
    result: &AggregationResult,
    params: &BonusParams,
) -> Result<BonusAllocation, AllocationError> {
    if params.per_staked_unit == 0 {
        return Err(AllocationError::ZeroDivisor);
    }
    if result.window_count == 0 {
        return Err(AllocationError::NoWindows);
    }

    let mut entries = Vec::with_capacity(result.accumulated.len());
    let mut totals = BonusTotals::default();

    for (account, accumulated) in &result.accumulated {
        let balance = result.balances.get(account).copied().unwrap_or(I256::ZERO);
        if balance.is_negative() {
            tracing::debug!("Excluding {} with negative stake balance {}", account, balance);
            totals.excluded += 1;
            continue;
        }

        let bonus = bonus_amount(*accumulated, result.window_count, params)?;
        let average_stake = minor_to_human(*accumulated, params.stake_decimals)?
            / result.window_count as f64;

        totals.total_bonus = totals
            .total_bonus
            .checked_add(bonus)
            .ok_or_else(|| AllocationError::Overflow(account.clone()))?;
        totals.recipients += 1;

        entries.push(BonusLedgerEntry {
            account: account.clone(),
            average_stake,
            current_balance: minor_to_human(balance, params.stake_decimals)?,
            bonus,
        });
    }

    entries.sort_by(|a, b| a.account.cmp(&b.account));

    if totals.excluded > 0 {
        tracing::info!("{} accounts excluded with a negative stake balance", totals.excluded);
    }
    tracing::info!(
        "Computed bonus for {} accounts, {} tokens in total",
        totals.recipients,
        totals.total_bonus
    );

    Ok(BonusAllocation { entries, totals })
}
