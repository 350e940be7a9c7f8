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


//! Distribution settings, read from a JSON file.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, source: serde_json::Error },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Parameters of one bonus distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusConfig {
    /// Address of the staking contract whose delegators receive the bonus.
    #[serde(rename = "stakingSC")]
    pub staking_sc: String,
    /// Node gateway URL.
    pub proxy: String,
    /// Elasticsearch indexer URL.
    pub indexer: String,
    /// Start of the distribution period, unix seconds.
    pub start_time: u64,
    /// End of the distribution period, unix seconds.
    pub end_time: u64,
    /// Identifier of the bonus token, e.g. `WATER-9ed400`.
    pub bonus_token: String,
    /// Whole bonus tokens paid per `perStakedAmount` of average stake.
    pub bonus_amount: u64,
    pub per_staked_amount: u64,
}

impl BonusConfig {
    /// Read and validate the config at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: display.clone(), source })?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: display, source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.staking_sc.trim().is_empty() {
            return Err(ConfigError::Invalid("stakingSC must not be empty".into()));
        }
        if self.bonus_token.trim().is_empty() {
            return Err(ConfigError::Invalid("bonusToken must not be empty".into()));
        }
        if self.end_time < self.start_time {
            return Err(ConfigError::Invalid(format!(
                "endTime {} is before startTime {}",
                self.end_time, self.start_time
            )));
        }
        if self.per_staked_amount == 0 {
            return Err(ConfigError::Invalid("perStakedAmount must be positive".into()));
        }
        self.proxy_url()?;
        self.indexer_url()?;
        Ok(())
    }

    pub fn proxy_url(&self) -> Result<Url, ConfigError> {
        http_url("proxy", &self.proxy)
    }

    pub fn indexer_url(&self) -> Result<Url, ConfigError> {
        http_url("indexer", &self.indexer)
    }
}

fn http_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    let url =
        Url::parse(raw).map_err(|e| ConfigError::Invalid(format!("{field} {raw:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ConfigError::Invalid(format!("{field} must be http(s), got {scheme}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const CONFIG: &str = r#"{
        "stakingSC": "erd1qqqqqqqqqqqqqqqpqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq",
        "proxy": "https://gateway.example.com",
        "indexer": "https://index.example.com",
        "startTime": 1700000000,
        "endTime": 1700172800,
        "bonusToken": "WATER-9ed400",
        "bonusAmount": 1000,
        "perStakedAmount": 100
    }"#;

    fn config() -> BonusConfig {
        serde_json::from_str(CONFIG).unwrap()
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let loaded = BonusConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config());
        assert_eq!(loaded.bonus_token, "WATER-9ed400");
        assert_eq!(loaded.per_staked_amount, 100);
        assert_eq!(loaded.proxy_url().unwrap().host_str(), Some("gateway.example.com"));
    }

    #[test]
    fn missing_file_and_bad_json() {
        let err = BonusConfig::load("/nonexistent/config.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"stakingSC\": 1}").unwrap();
        let err = BonusConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn rejects_invalid_settings() {
        let cases: [fn(&mut BonusConfig); 5] = [
            |c| c.staking_sc = " ".into(),
            |c| c.end_time = c.start_time - 1,
            |c| c.per_staked_amount = 0,
            |c| c.proxy = "ftp://gateway.example.com".into(),
            |c| c.indexer = "not a url".into(),
        ];
        for mutate in cases {
            let mut config = config();
            mutate(&mut config);
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))), "{config:?}");
        }
    }

    #[test]
    fn single_instant_period_is_valid() {
        let mut config = config();
        config.end_time = config.start_time;
        config.validate().unwrap();
    }
}
