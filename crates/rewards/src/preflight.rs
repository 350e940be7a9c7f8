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


//! Funds checks run before any bonus transfer is prepared.

use alloy_primitives::U256;
use thiserror::Error;

use crate::{
    source::{BalanceProvider, DataSourceError, TokenDescriptor},
    units::{whole_to_minor, UnitsError},
};

/// Fee budgeted per transfer: 0.00015 of the native token, at 18 decimals.
pub const DEFAULT_FEE_PER_TRANSFER: u64 = 150_000_000_000_000;

#[derive(Error, Debug)]
pub enum FundsError {
    #[error("insufficient native balance for fees: have {available}, need {required} (minor units)")]
    InsufficientNative { available: U256, required: U256 },

    #[error("insufficient {token} balance: have {available}, need {required} (minor units)")]
    InsufficientToken { token: String, available: U256, required: U256 },

    #[error("failed to fetch distributor balance: {0}")]
    DataSource(#[from] DataSourceError),

    #[error(transparent)]
    Units(#[from] UnitsError),
}

/// Balances the distributor needs, in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundsRequirement {
    /// Native token needed for fees.
    pub native: U256,
    /// Bonus token needed for the transfers.
    pub token: U256,
}

impl FundsRequirement {
    /// Requirement for `transfers` transfers totalling `total_bonus` whole bonus tokens.
    pub fn new(
        total_bonus: U256,
        transfers: usize,
        token_decimals: u8,
        fee_per_transfer: U256,
    ) -> Result<Self, FundsError> {
        let native =
            fee_per_transfer.checked_mul(U256::from(transfers)).ok_or(UnitsError::Overflow)?;
        let token = whole_to_minor(total_bonus, token_decimals)?;
        Ok(Self { native, token })
    }
}

/// Compare the distributor balances with what the transfers require.
pub fn check_funds(
    native_balance: U256,
    token_balance: U256,
    token: &TokenDescriptor,
    required: &FundsRequirement,
) -> Result<(), FundsError> {
    if native_balance < required.native {
        return Err(FundsError::InsufficientNative {
            available: native_balance,
            required: required.native,
        });
    }
    if token_balance < required.token {
        return Err(FundsError::InsufficientToken {
            token: token.identifier.clone(),
            available: token_balance,
            required: required.token,
        });
    }
    Ok(())
}

/// Fetch the distributor balances and check them against `required`.
pub async fn verify_funds<B: BalanceProvider + ?Sized>(
    balances: &B,
    distributor: &str,
    token: &TokenDescriptor,
    required: &FundsRequirement,
) -> Result<(), FundsError> {
    let native_balance = balances.native_balance(distributor).await?;
    let token_balance = balances.token_balance(distributor, &token.identifier).await?;
    tracing::info!(
        "Distributor {} holds {} native and {} {} (minor units)",
        distributor,
        native_balance,
        token_balance,
        token.identifier
    );
    check_funds(native_balance, token_balance, token, required)
}
