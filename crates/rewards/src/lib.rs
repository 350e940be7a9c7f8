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


//! Time-weighted staking bonus computation: replay of delegation events, averaging of stakes and
//! conversion into bonus token amounts.

pub mod aggregator;
pub mod allocation;
pub mod events;
pub mod gateway;
pub mod indexer;
pub mod preflight;
pub mod source;
pub mod transfer;
pub mod units;

pub use aggregator::{
    aggregate_stakes, fetch_window_events, AggregationConfig, AggregationError,
    AggregationResult, StakeAggregator, Window, WindowEvents, WindowPlan, PAGE_SIZE,
    WINDOW_SECONDS,
};

pub use allocation::{
    allocate_bonus, bonus_amount, AllocationError, BonusAllocation, BonusLedgerEntry, BonusParams,
    BonusTotals,
};

pub use events::{
    event_kind, ClassifiedEvent, ClassifyError, EventClassifier, ParsePolicy, StakeEventKind,
};

pub use gateway::{GatewayClient, NetworkConfig};
pub use indexer::ElasticIndexer;

pub use preflight::{check_funds, verify_funds, FundsError, FundsRequirement};

pub use source::{
    BalanceProvider, ContractResultSource, DataSourceError, EventQuery, EventRecord, EventSource,
    TokenDescriptor, TokenMetadataProvider,
};

pub use transfer::{build_transfer_plan, transfer_data, PlannedTransfer};

pub use units::{to_human_scale, to_minor_units, UnitsError};
