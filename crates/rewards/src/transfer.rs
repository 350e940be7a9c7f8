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


//! Token transfer payloads for the bonus recipients.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{
    allocation::BonusLedgerEntry,
    source::TokenDescriptor,
    units::{encode_amount_hex, whole_to_minor, UnitsError},
};

/// Gas limit of a single token transfer.
pub const TRANSFER_GAS_LIMIT: u64 = 500_000;

/// An unsigned bonus transfer, ready to be signed and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedTransfer {
    pub receiver: String,
    pub token: String,
    /// Amount in minor units of the bonus token, base 10.
    pub amount: String,
    /// Transaction data field.
    pub data: String,
    pub gas_limit: u64,
}

/// Data field of a fungible token transfer: `ESDTTransfer@<hex token>@<hex amount>`.
pub fn transfer_data(token_identifier: &str, amount: U256) -> String {
    format!("ESDTTransfer@{}@{}", hex::encode(token_identifier), encode_amount_hex(amount))
}

/// One transfer per ledger entry with a non-zero bonus, in ledger order.
pub fn build_transfer_plan(
    entries: &[BonusLedgerEntry],
    token: &TokenDescriptor,
) -> Result<Vec<PlannedTransfer>, UnitsError> {
    let mut plan = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.bonus.is_zero() {
            tracing::debug!("Skipping {}: bonus rounds down to zero", entry.account);
            continue;
        }
        let amount = whole_to_minor(entry.bonus, token.decimals)?;
        plan.push(PlannedTransfer {
            receiver: entry.account.clone(),
            token: token.identifier.clone(),
            amount: amount.to_string(),
            data: transfer_data(&token.identifier, amount),
            gas_limit: TRANSFER_GAS_LIMIT,
        });
    }
    Ok(plan)
}
