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


//! Elasticsearch indexer client serving historical transactions and smart contract results.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use url::Url;

use crate::source::{
    ContractResultSource, DataSourceError, EventQuery, EventRecord, EventSource,
};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source")]
    source: HitSource,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HitSource {
    value: String,
    receiver: String,
    sender: String,
    /// Base64 encoded call data.
    data: Option<String>,
    status: String,
    timestamp: u64,
}

impl TryFrom<Hit> for EventRecord {
    type Error = DataSourceError;

    fn try_from(hit: Hit) -> Result<Self, Self::Error> {
        let data = match hit.source.data.as_deref() {
            None | Some("") => Vec::new(),
            Some(encoded) => STANDARD.decode(encoded).map_err(|e| {
                DataSourceError::Decode(format!("invalid data field in {}: {e}", hit.id))
            })?,
        };
        Ok(EventRecord {
            hash: hit.id,
            sender: hit.source.sender,
            receiver: hit.source.receiver,
            value: hit.source.value,
            data,
            status: hit.source.status,
            timestamp: hit.source.timestamp,
        })
    }
}

/// Decode an Elasticsearch `_search` response body into event records.
pub fn parse_search_response(body: &[u8]) -> Result<Vec<EventRecord>, DataSourceError> {
    let response: SearchResponse =
        serde_json::from_slice(body).map_err(|e| DataSourceError::Decode(e.to_string()))?;
    response.hits.hits.into_iter().map(EventRecord::try_from).collect()
}

/// Lucene query selecting the transactions of an [EventQuery], `from` inclusive, `to` exclusive.
pub fn transactions_query(query: &EventQuery) -> String {
    let mut q = format!("receiver:{}", query.receiver);
    if let Some(sender) = &query.sender {
        q.push_str(&format!(" AND sender:{sender}"));
    }
    q.push_str(&format!(" AND timestamp:>={} AND timestamp:<{}", query.from, query.to));
    q
}

/// Client of an Elasticsearch instance holding the `transactions` and `scresults` indices.
#[derive(Debug, Clone)]
pub struct ElasticIndexer {
    client: reqwest::Client,
    base_url: Url,
}

impl ElasticIndexer {
    pub fn new(base_url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn endpoint(&self, path: &str) -> Result<Url, DataSourceError> {
        let raw = format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&raw).map_err(|e| DataSourceError::Decode(format!("invalid URL {raw}: {e}")))
    }

    async fn search(
        &self,
        index: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<EventRecord>, DataSourceError> {
        let url = self.endpoint(&format!("{index}/_search"))?;
        tracing::trace!("Querying {} with {:?}", url, params);

        let response = self.client.get(url.clone()).query(params).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DataSourceError::Status { status: status.as_u16(), url: url.to_string() });
        }
        let body = response.bytes().await?;
        parse_search_response(&body)
    }
}

#[async_trait]
impl EventSource for ElasticIndexer {
    async fn fetch_events(&self, query: &EventQuery) -> Result<Vec<EventRecord>, DataSourceError> {
        let params = [
            ("size", query.size.to_string()),
            ("q", transactions_query(query)),
            ("sort", "timestamp:asc".to_string()),
        ];
        self.search("transactions", &params).await
    }
}

#[async_trait]
impl ContractResultSource for ElasticIndexer {
    async fn fetch_contract_results(
        &self,
        tx_hash: &str,
        max: usize,
    ) -> Result<Vec<EventRecord>, DataSourceError> {
        let params = [("size", max.to_string()), ("q", format!("originalTxHash:{tx_hash}"))];
        self.search("scresults", &params).await
    }
}
