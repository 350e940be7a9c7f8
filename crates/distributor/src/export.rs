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


//! CSV export of the bonus ledger.

use std::{fs::File, io, path::Path};

use alloy_primitives::U256;
use bonus_rewards::{units::to_human_scale, BalanceProvider, BonusLedgerEntry, TokenDescriptor};
use serde::Serialize;

/// One CSV line of the ledger, amounts in human units with two decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerRow {
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Average Stake")]
    pub average_stake: String,
    #[serde(rename = "Last Staked")]
    pub last_staked: String,
    #[serde(rename = "Token Balance")]
    pub token_balance: String,
}

impl LedgerRow {
    pub fn new(entry: &BonusLedgerEntry, token_balance: f64) -> Self {
        Self {
            address: entry.account.clone(),
            average_stake: format!("{:.2}", entry.average_stake),
            last_staked: format!("{:.2}", entry.current_balance),
            token_balance: format!("{token_balance:.2}"),
        }
    }
}

/// Build the ledger rows, looking up each account's current balance of `token`.
///
/// A failed lookup is reported as a zero balance.
pub async fn ledger_rows<B: BalanceProvider + ?Sized>(
    balances: &B,
    entries: &[BonusLedgerEntry],
    token: &TokenDescriptor,
) -> Vec<LedgerRow> {
    let mut rows = Vec::with_capacity(entries.len());
    for entry in entries {
        let balance = match balances.token_balance(&entry.account, &token.identifier).await {
            Ok(balance) => balance,
            Err(e) => {
                tracing::debug!(
                    "No {} balance for {}, reporting zero: {}",
                    token.identifier,
                    entry.account,
                    e
                );
                U256::ZERO
            }
        };
        let human = to_human_scale(&balance.to_string(), token.decimals).unwrap_or_default();
        rows.push(LedgerRow::new(entry, human));
    }
    rows
}

pub fn write_ledger<W: io::Write>(writer: W, rows: &[LedgerRow]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        writer.write_record(["Address", "Average Stake", "Last Staked", "Token Balance"])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_ledger_file(path: impl AsRef<Path>, rows: &[LedgerRow]) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|e| anyhow::anyhow!("failed to create {}: {}", path.display(), e))?;
    write_ledger(file, rows)?;
    tracing::info!("Wrote {} ledger rows to {}", rows.len(), path.display());
    Ok(())
}
