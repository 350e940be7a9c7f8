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


//! Day-by-day replay of delegation events into per-account stake balances.
//!
//! The replay walks a [WindowPlan]. Each window's transactions are fetched page by page,
//! classified into stake deltas and applied to a [StakeAggregator], which then snapshots every
//! known balance into a running sum. The sums divided by the number of windows are the
//! time-averaged stakes used by [crate::allocation].

use std::collections::HashMap;

use alloy_primitives::I256;
use thiserror::Error;

use crate::{
    events::{ClassifyError, EventClassifier, ParsePolicy, StakeEventKind},
    source::{ContractResultSource, DataSourceError, EventQuery, EventRecord, EventSource},
    units::minor_to_human,
};

/// Length of one aggregation window.
pub const WINDOW_SECONDS: u64 = 24 * 60 * 60;
/// Maximum number of transactions requested from the indexer per query.
pub const PAGE_SIZE: usize = 10_000;

#[derive(Error, Debug)]
pub enum AggregationError {
    #[error("failed to fetch transactions: {0}")]
    DataSource(#[from] DataSourceError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error("stake amount overflow for account {0}")]
    Overflow(String),
}

/// Half-open time interval `[start, end)` in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub index: u64,
    pub start: u64,
    pub end: u64,
}

/// The windows replayed for a bonus period.
///
/// The first window primes the balances with all history: it starts at the network genesis and
/// ends one window after the period start. Every later window is one day long, and windows are
/// produced while their start is not after the period end. The priming window is counted
/// towards the average like any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    pub genesis_time: u64,
    pub start_time: u64,
    pub end_time: u64,
}

impl WindowPlan {
    pub fn new(genesis_time: u64, start_time: u64, end_time: u64) -> Self {
        Self { genesis_time, start_time, end_time }
    }

    pub fn windows(&self) -> Windows {
        Windows { plan: *self, next_index: 0 }
    }

    /// Number of windows produced by [Self::windows], priming window included.
    pub fn window_count(&self) -> u64 {
        1 + self.end_time.saturating_sub(self.start_time) / WINDOW_SECONDS
    }
}

/// Iterator over the windows of a [WindowPlan].
#[derive(Debug, Clone)]
pub struct Windows {
    plan: WindowPlan,
    next_index: u64,
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        let index = self.next_index;
        let first_end = self.plan.start_time.checked_add(WINDOW_SECONDS)?;
        let window = if index == 0 {
            Window { index, start: self.plan.genesis_time.min(first_end), end: first_end }
        } else {
            let start = self.plan.start_time.checked_add(index.checked_mul(WINDOW_SECONDS)?)?;
            if start > self.plan.end_time {
                return None;
            }
            Window { index, start, end: start.checked_add(WINDOW_SECONDS)? }
        };
        self.next_index += 1;
        Some(window)
    }
}

/// Running stake balances and their per-window sums.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StakeAggregator {
    balances: HashMap<String, I256>,
    accumulated: HashMap<String, I256>,
    window_count: u64,
}

/// Final state of a replay, handed to the allocator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationResult {
    /// Stake balance of each account at the end of the last window, in minor units.
    pub balances: HashMap<String, I256>,
    /// Sum of the end-of-window balances of each account, in minor units.
    pub accumulated: HashMap<String, I256>,
    pub window_count: u64,
}

impl StakeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the stake deltas of one window in order, then add every known balance to its
    /// account's running sum and count the window.
    ///
    /// Accounts keep their balance across windows until a later delta changes it.
    pub fn apply_window(
        mut self,
        deltas: impl IntoIterator<Item = (String, I256)>,
    ) -> Result<Self, AggregationError> {
        for (account, delta) in deltas {
            let before = self.balances.get(&account).copied().unwrap_or(I256::ZERO);
            let after = before
                .checked_add(delta)
                .ok_or_else(|| AggregationError::Overflow(account.clone()))?;
            if after.is_negative() && !before.is_negative() {
                tracing::warn!("Stake balance of {} went negative: {}", account, after);
            }
            self.balances.insert(account, after);
        }

        for (account, balance) in &self.balances {
            let sum = self.accumulated.entry(account.clone()).or_insert(I256::ZERO);
            *sum = sum
                .checked_add(*balance)
                .ok_or_else(|| AggregationError::Overflow(account.clone()))?;
        }
        self.window_count += 1;

        Ok(self)
    }

    pub fn balances(&self) -> &HashMap<String, I256> {
        &self.balances
    }

    pub fn accumulated(&self) -> &HashMap<String, I256> {
        &self.accumulated
    }

    pub fn window_count(&self) -> u64 {
        self.window_count
    }

    pub fn finish(self) -> AggregationResult {
        AggregationResult {
            balances: self.balances,
            accumulated: self.accumulated,
            window_count: self.window_count,
        }
    }
}

/// Settings of a replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationConfig {
    /// Delegation contract whose incoming transactions are replayed.
    pub staking_contract: String,
    /// Only replay transactions from this sender, when set.
    pub sender_filter: Option<String>,
    pub page_size: usize,
    pub parse_policy: ParsePolicy,
    /// Decimals of the staked token, used for log output.
    pub stake_decimals: u8,
}

impl AggregationConfig {
    pub fn new(staking_contract: impl Into<String>, stake_decimals: u8) -> Self {
        Self {
            staking_contract: staking_contract.into(),
            sender_filter: None,
            page_size: PAGE_SIZE,
            parse_policy: ParsePolicy::default(),
            stake_decimals,
        }
    }
}

/// Transactions of one window and the number of queries needed to get them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowEvents {
    pub events: Vec<EventRecord>,
    pub pages: usize,
}

/// Fetch all transactions of a window, page by page.
///
/// A page of exactly `page_size` transactions triggers a new query starting one second after the
/// last returned timestamp; a shorter page ends the window. This assumes timestamps strictly
/// increase across a page boundary: transactions sharing the boundary timestamp beyond the page
/// limit are not returned.
pub async fn fetch_window_events<S: EventSource + ?Sized>(
    source: &S,
    receiver: &str,
    sender: Option<&str>,
    window: &Window,
    page_size: usize,
) -> Result<WindowEvents, DataSourceError> {
    let mut fetched = WindowEvents::default();
    let mut from = window.start;
    loop {
        let query = EventQuery {
            receiver: receiver.to_string(),
            sender: sender.map(str::to_string),
            from,
            to: window.end,
            size: page_size,
        };
        let page = source.fetch_events(&query).await?;
        fetched.pages += 1;

        let full = !page.is_empty() && page.len() >= page_size;
        let next_from = page.last().map(|event| event.timestamp.saturating_add(1));
        fetched.events.extend(page);

        match next_from {
            Some(next) if full && next > from => from = next,
            Some(_) if full => {
                tracing::warn!("Indexer page did not advance past {}; stopping window", from);
                break;
            }
            _ => break,
        }
    }
    Ok(fetched)
}

fn format_timestamp(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|time| time.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Replay every window of `plan` and return the resulting balances and sums.
///
/// Any fetch or classification error aborts the replay.
pub async fn aggregate_stakes<E, R>(
    events: &E,
    results: &R,
    config: &AggregationConfig,
    plan: &WindowPlan,
) -> Result<AggregationResult, AggregationError>
where
    E: EventSource + ?Sized,
    R: ContractResultSource + ?Sized,
{
    let classifier = EventClassifier::new(results, &config.staking_contract, config.parse_policy);
    let mut aggregator = StakeAggregator::new();

    for window in plan.windows() {
        tracing::info!(
            "Analyzing transactions between {} and {}",
            format_timestamp(window.start),
            format_timestamp(window.end)
        );
        let fetched = fetch_window_events(
            events,
            &config.staking_contract,
            config.sender_filter.as_deref(),
            &window,
            config.page_size,
        )
        .await?;
        tracing::info!(
            "Window {}: {} transactions in {} page(s)",
            window.index,
            fetched.events.len(),
            fetched.pages
        );

        let mut deltas = Vec::with_capacity(fetched.events.len());
        for event in fetched.events {
            let classified = classifier.classify(&event).await?;
            if classified.kind == StakeEventKind::Irrelevant {
                continue;
            }
            tracing::debug!(
                "{:?} of {} by {} in {}",
                classified.kind,
                minor_to_human(classified.delta, config.stake_decimals).unwrap_or(f64::NAN),
                event.sender,
                event.hash
            );
            deltas.push((event.sender, classified.delta));
        }

        aggregator = aggregator.apply_window(deltas)?;
    }

    tracing::info!(
        "Replayed {} windows, {} accounts seen",
        aggregator.window_count(),
        aggregator.balances().len()
    );
    Ok(aggregator.finish())
}
