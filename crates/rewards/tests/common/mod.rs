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


use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use bonus_rewards::{
    ContractResultSource, DataSourceError, EventQuery, EventRecord, EventSource,
};

pub const STAKING_SC: &str = "erd1qqqqqqqqqqqqqqqpqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq";
pub const DAY: u64 = 24 * 60 * 60;
pub const GENESIS: u64 = 1_596_117_600;
pub const START: u64 = 1_700_000_000;

/// In-memory indexer answering queries the way the Elasticsearch indexer does.
#[derive(Default)]
pub struct FakeIndexer {
    events: Vec<EventRecord>,
    results: HashMap<String, Vec<EventRecord>>,
    queries: Mutex<Vec<EventQuery>>,
    fail: bool,
}

impl FakeIndexer {
    pub fn new(events: Vec<EventRecord>) -> Self {
        Self { events, ..Default::default() }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    pub fn with_results(mut self, tx_hash: &str, results: Vec<EventRecord>) -> Self {
        self.results.insert(tx_hash.to_string(), results);
        self
    }

    pub fn queries(&self) -> Vec<EventQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSource for FakeIndexer {
    async fn fetch_events(&self, query: &EventQuery) -> Result<Vec<EventRecord>, DataSourceError> {
        self.queries.lock().unwrap().push(query.clone());
        if self.fail {
            return Err(DataSourceError::Unavailable("indexer unreachable".into()));
        }
        let mut matching: Vec<EventRecord> = self
            .events
            .iter()
            .filter(|e| e.receiver == query.receiver)
            .filter(|e| query.sender.as_ref().map_or(true, |s| &e.sender == s))
            .filter(|e| e.timestamp >= query.from && e.timestamp < query.to)
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.timestamp);
        matching.truncate(query.size);
        Ok(matching)
    }
}

#[async_trait]
impl ContractResultSource for FakeIndexer {
    async fn fetch_contract_results(
        &self,
        tx_hash: &str,
        max: usize,
    ) -> Result<Vec<EventRecord>, DataSourceError> {
        if self.fail {
            return Err(DataSourceError::Unavailable("indexer unreachable".into()));
        }
        Ok(self.results.get(tx_hash).map(|r| r.iter().take(max).cloned().collect()).unwrap_or_default())
    }
}

pub fn tx(hash: &str, sender: &str, data: &str, value: &str, timestamp: u64) -> EventRecord {
    EventRecord {
        hash: hash.into(),
        sender: sender.into(),
        receiver: STAKING_SC.into(),
        value: value.into(),
        data: data.as_bytes().to_vec(),
        status: "success".into(),
        timestamp,
    }
}

pub fn scr(sender: &str, receiver: &str, value: &str) -> EventRecord {
    EventRecord {
        hash: "scr".into(),
        sender: sender.into(),
        receiver: receiver.into(),
        value: value.into(),
        status: "success".into(),
        ..Default::default()
    }
}

/// `whole` tokens at 18 decimals, as a base-10 string.
pub fn tokens(whole: u64) -> String {
    format!("{whole}000000000000000000")
}
