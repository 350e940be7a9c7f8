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


//! Node gateway client: network configuration, token properties and balances.

use alloy_primitives::U256;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

use crate::{
    source::{BalanceProvider, DataSourceError, TokenDescriptor, TokenMetadataProvider},
    units::{parse_integer_amount, MAX_DECIMALS},
};

/// System smart contract managing fungible tokens.
pub const ESDT_SYSTEM_SC_ADDRESS: &str =
    "erd1qqqqqqqqqqqqqqqpqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqzllls8a5w6u";

const DECIMALS_PREFIX: &str = "NumDecimals-";

#[derive(Debug, Deserialize)]
struct GatewayResponse<T> {
    data: Option<T>,
    #[serde(default)]
    error: String,
    #[serde(default)]
    code: String,
}

/// Network parameters reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkConfig {
    #[serde(rename = "erd_chain_id")]
    pub chain_id: String,
    /// Decimals of the native token.
    #[serde(rename = "erd_denomination")]
    pub denomination: u8,
    /// Genesis time, unix seconds.
    #[serde(rename = "erd_start_time")]
    pub start_time: u64,
    #[serde(rename = "erd_min_gas_price", default)]
    pub min_gas_price: u64,
    #[serde(rename = "erd_min_gas_limit", default)]
    pub min_gas_limit: u64,
}

#[derive(Debug, Deserialize)]
struct NetworkConfigData {
    config: NetworkConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VmQueryRequest<'a> {
    sc_address: &'a str,
    func_name: &'a str,
    args: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VmQueryData {
    data: VmOutput,
}

#[derive(Debug, Deserialize)]
struct VmOutput {
    #[serde(rename = "returnData", default)]
    return_data: Option<Vec<Option<String>>>,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    account: Account,
}

#[derive(Debug, Deserialize)]
struct Account {
    balance: String,
}

#[derive(Debug, Deserialize)]
struct TokenBalanceData {
    #[serde(rename = "tokenData")]
    token_data: TokenBalance,
}

#[derive(Debug, Deserialize)]
struct TokenBalance {
    balance: String,
}

fn decode_response<T: DeserializeOwned>(
    status: StatusCode,
    url: &Url,
    body: &[u8],
) -> Result<T, DataSourceError> {
    let parsed: Result<GatewayResponse<T>, _> = serde_json::from_slice(body);
    match parsed {
        Ok(response) if !response.error.is_empty() => {
            Err(DataSourceError::Gateway(format!("{} ({})", response.error, response.code)))
        }
        Ok(response) if status.is_success() => response
            .data
            .ok_or_else(|| DataSourceError::Decode(format!("missing data in response from {url}"))),
        Ok(_) => Err(DataSourceError::Status { status: status.as_u16(), url: url.to_string() }),
        Err(_) if !status.is_success() => {
            Err(DataSourceError::Status { status: status.as_u16(), url: url.to_string() })
        }
        Err(e) => Err(DataSourceError::Decode(e.to_string())),
    }
}

/// Build a [TokenDescriptor] from the decoded return data of `getTokenProperties`.
///
/// The first entry is the token name, the sixth is `NumDecimals-<n>`.
pub fn parse_token_properties(
    identifier: &str,
    return_data: &[Vec<u8>],
) -> Result<TokenDescriptor, DataSourceError> {
    if return_data.len() < 6 {
        return Err(DataSourceError::TokenNotFound(identifier.to_string()));
    }
    let name = String::from_utf8_lossy(&return_data[0]).into_owned();
    let field = String::from_utf8_lossy(&return_data[5]).into_owned();
    let invalid = || DataSourceError::InvalidDecimals {
        token: identifier.to_string(),
        value: field.clone(),
    };
    let decimals = field
        .strip_prefix(DECIMALS_PREFIX)
        .unwrap_or(&field)
        .parse::<u8>()
        .map_err(|_| invalid())?;
    if decimals > MAX_DECIMALS {
        return Err(invalid());
    }
    Ok(TokenDescriptor::new(identifier, name, decimals))
}

fn parse_balance(balance: &str) -> Result<U256, DataSourceError> {
    parse_integer_amount(balance).map_err(|e| DataSourceError::Decode(e.to_string()))
}

/// HTTP client of a node gateway (proxy).
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: Url,
}

impl GatewayClient {
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

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DataSourceError> {
        let url = self.endpoint(path)?;
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        decode_response(status, &url, &body)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &B,
    ) -> Result<T, DataSourceError> {
        let url = self.endpoint(path)?;
        let response = self.client.post(url.clone()).json(payload).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        decode_response(status, &url, &body)
    }

    /// Fetch the network configuration, which carries the genesis time.
    pub async fn network_config(&self) -> Result<NetworkConfig, DataSourceError> {
        let data: NetworkConfigData = self.get("network/config").await?;
        Ok(data.config)
    }
}

#[async_trait]
impl TokenMetadataProvider for GatewayClient {
    async fn token_descriptor(&self, identifier: &str) -> Result<TokenDescriptor, DataSourceError> {
        let request = VmQueryRequest {
            sc_address: ESDT_SYSTEM_SC_ADDRESS,
            func_name: "getTokenProperties",
            args: vec![hex::encode(identifier)],
        };
        let data: VmQueryData = self.post("vm-values/query", &request).await?;

        let return_data = data
            .data
            .return_data
            .unwrap_or_default()
            .into_iter()
            .map(|entry| {
                STANDARD
                    .decode(entry.unwrap_or_default())
                    .map_err(|e| DataSourceError::Decode(format!("invalid return data: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let token = parse_token_properties(identifier, &return_data)?;
        tracing::debug!("Token {} ({}) has {} decimals", token.identifier, token.name, token.decimals);
        Ok(token)
    }
}

#[async_trait]
impl BalanceProvider for GatewayClient {
    async fn native_balance(&self, address: &str) -> Result<U256, DataSourceError> {
        let data: AccountData = self.get(&format!("address/{address}")).await?;
        parse_balance(&data.account.balance)
    }

    async fn token_balance(&self, address: &str, token: &str) -> Result<U256, DataSourceError> {
        let data: TokenBalanceData = self.get(&format!("address/{address}/esdt/{token}")).await?;
        parse_balance(&data.token_data.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://gateway.example.com").unwrap()
    }

    #[test]
    fn decodes_network_config() {
        let body = r#"{
            "data": {
                "config": {
                    "erd_chain_id": "1",
                    "erd_denomination": 18,
                    "erd_min_gas_limit": 50000,
                    "erd_min_gas_price": 1000000000,
                    "erd_start_time": 1596117600,
                    "erd_round_duration": 6000
                }
            },
            "error": "",
            "code": "successful"
        }"#;
        let data: NetworkConfigData =
            decode_response(StatusCode::OK, &url(), body.as_bytes()).unwrap();

        assert_eq!(data.config.chain_id, "1");
        assert_eq!(data.config.denomination, 18);
        assert_eq!(data.config.start_time, 1_596_117_600);
        assert_eq!(data.config.min_gas_limit, 50_000);
    }

    #[test]
    fn gateway_error_is_reported() {
        let body = r#"{"data": null, "error": "account not found", "code": "internal_issue"}"#;
        let err = decode_response::<AccountData>(StatusCode::INTERNAL_SERVER_ERROR, &url(), body.as_bytes())
            .unwrap_err();
        match err {
            DataSourceError::Gateway(message) => assert!(message.contains("account not found")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_json_failure_is_a_status_error() {
        let err = decode_response::<AccountData>(StatusCode::BAD_GATEWAY, &url(), b"<html>")
            .unwrap_err();
        assert!(matches!(err, DataSourceError::Status { status: 502, .. }));
    }

    #[test]
    fn decodes_balances() {
        let body = r#"{"data":{"account":{"address":"erd1x","nonce":3,"balance":"2500000000000000000"}},"error":"","code":"successful"}"#;
        let data: AccountData = decode_response(StatusCode::OK, &url(), body.as_bytes()).unwrap();
        assert_eq!(
            parse_balance(&data.account.balance).unwrap(),
            U256::from(2_500_000_000_000_000_000u64)
        );

        let body = r#"{"data":{"tokenData":{"balance":"42","tokenIdentifier":"WATER-9ed400"}},"error":"","code":"successful"}"#;
        let data: TokenBalanceData =
            decode_response(StatusCode::OK, &url(), body.as_bytes()).unwrap();
        assert_eq!(parse_balance(&data.token_data.balance).unwrap(), U256::from(42u64));
    }

    #[test]
    fn parses_token_properties() {
        let data: Vec<Vec<u8>> = [
            "WaterDrop",
            "FungibleESDT",
            "owner",
            "1000",
            "0",
            "NumDecimals-18",
            "IsPaused-false",
        ]
        .iter()
        .map(|s| s.as_bytes().to_vec())
        .collect();

        let token = parse_token_properties("WATER-9ed400", &data).unwrap();
        assert_eq!(token.name, "WaterDrop");
        assert_eq!(token.ticker, "WATER");
        assert_eq!(token.decimals, 18);
    }

    #[test]
    fn token_properties_errors() {
        let short = vec![b"WaterDrop".to_vec(); 3];
        assert!(matches!(
            parse_token_properties("WATER-9ed400", &short),
            Err(DataSourceError::TokenNotFound(_))
        ));

        let mut bad = vec![b"x".to_vec(); 6];
        bad[5] = b"NumDecimals-eighteen".to_vec();
        assert!(matches!(
            parse_token_properties("WATER-9ed400", &bad),
            Err(DataSourceError::InvalidDecimals { .. })
        ));

        bad[5] = b"NumDecimals-200".to_vec();
        assert!(matches!(
            parse_token_properties("WATER-9ed400", &bad),
            Err(DataSourceError::InvalidDecimals { .. })
        ));
    }
}
