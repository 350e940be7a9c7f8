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


mod config;
mod export;

use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use alloy_primitives::U256;
use anyhow::{bail, Context, Result};
use bonus_rewards::{
    aggregate_stakes, allocate_bonus, build_transfer_plan, preflight::DEFAULT_FEE_PER_TRANSFER,
    verify_funds, AggregationConfig, BonusParams, ElasticIndexer, FundsRequirement,
    GatewayClient, ParsePolicy, TokenMetadataProvider, WindowPlan,
};
use clap::Parser;

use crate::config::BonusConfig;

/// Computes time-weighted staking bonuses and prepares their distribution.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct MainArgs {
    /// Path of the JSON distribution config.
    #[clap(long, env = "BONUS_CONFIG", default_value = "config.json")]
    config: PathBuf,
    /// Where to write the bonus ledger CSV.
    #[clap(long, default_value = "output.csv")]
    output: PathBuf,
    /// Where to write the transfer plan JSON.
    #[clap(long, default_value = "transfers.json")]
    plan: PathBuf,
    /// Distributor address, checked for enough funds before the plan is written.
    #[clap(long, env = "BONUS_SENDER")]
    sender: Option<String>,
    /// Skip the confirmation prompt.
    #[clap(long, default_value_t = false)]
    yes: bool,
    /// Count transactions with an unparsable amount as zero instead of failing.
    #[clap(long, default_value_t = false)]
    lenient_parsing: bool,
    /// Whether to log in JSON format.
    #[clap(long, env, default_value_t = false)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = MainArgs::parse();

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        .from_env_lossy();

    if args.log_json {
        tracing_subscriber::fmt().with_ansi(false).json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_ansi(false).with_env_filter(filter).init();
    }

    // NOTE: Using a separate `run` function to facilitate testing below.
    if let Err(e) = run(&args).await {
        tracing::error!("FATAL: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: &MainArgs) -> Result<()> {
    let config = BonusConfig::load(&args.config)?;
    let gateway = GatewayClient::new(config.proxy_url()?);
    let indexer = ElasticIndexer::new(config.indexer_url()?);

    let network = gateway.network_config().await.context("failed to fetch network config")?;
    let token = gateway
        .token_descriptor(&config.bonus_token)
        .await
        .with_context(|| format!("failed to fetch properties of {}", config.bonus_token))?;
    tracing::info!(
        "Bonus token {} ({}) with {} decimals, stake denominated with {} decimals",
        token.identifier,
        token.name,
        token.decimals,
        network.denomination
    );

    let plan = WindowPlan::new(network.start_time, config.start_time, config.end_time);
    let mut aggregation = AggregationConfig::new(&config.staking_sc, network.denomination);
    if args.lenient_parsing {
        aggregation.parse_policy = ParsePolicy::Lenient;
    }
    let stakes = aggregate_stakes(&indexer, &indexer, &aggregation, &plan).await?;

    let params = BonusParams {
        bonus_pool: config.bonus_amount,
        per_staked_unit: config.per_staked_amount,
        stake_decimals: network.denomination,
    };
    let allocation = allocate_bonus(&stakes, &params)?;

    let rows = export::ledger_rows(&gateway, &allocation.entries, &token).await;
    export::write_ledger_file(&args.output, &rows)?;

    let transfers = build_transfer_plan(&allocation.entries, &token)?;
    let required = FundsRequirement::new(
        allocation.totals.total_bonus,
        transfers.len(),
        token.decimals,
        U256::from(DEFAULT_FEE_PER_TRANSFER),
    )?;
    tracing::info!(
        "{} {} to distribute to {} accounts ({} excluded), {} transfers",
        allocation.totals.total_bonus,
        token.ticker,
        allocation.totals.recipients,
        allocation.totals.excluded,
        transfers.len()
    );

    if !args.yes {
        println!(
            "About to plan {} transfers of {} {} in total.",
            transfers.len(),
            allocation.totals.total_bonus,
            token.ticker
        );
        print!("Type 'y' to confirm and continue: ");
        io::stdout().flush().ok();
        let mut input = String::new();
        io::stdin().read_line(&mut input).context("failed to read confirmation")?;
        if !is_confirmed(&input) {
            bail!("Distribution cancelled by user");
        }
    }

    match &args.sender {
        Some(sender) => verify_funds(&gateway, sender, &token, &required).await?,
        None => tracing::warn!("No sender address given, skipping the funds check"),
    }

    let json = serde_json::to_string_pretty(&transfers)?;
    fs::write(&args.plan, json)
        .with_context(|| format!("failed to write transfer plan {}", args.plan.display()))?;
    tracing::info!("Wrote {} planned transfers to {}", transfers.len(), args.plan.display());

    Ok(())
}

fn is_confirmed(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("y")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use bonus_rewards::PlannedTransfer;
    use serde_json::json;
    use tracing_test::traced_test;
    use wiremock::{
        matchers::{method, path, path_regex},
        Mock, MockServer, Request, ResponseTemplate,
    };

    use super::*;

    const STAKING_SC: &str = "erd1qqqqqqqqqqqqqqqpqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq";
    const DISTRIBUTOR: &str = "erd1distributor";
    const GENESIS: u64 = 1_596_117_600;
    const START: u64 = 1_700_000_000;
    const DAY: u64 = 86_400;

    fn ok(data: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_json(json!({ "data": data, "error": "", "code": "successful" }))
    }

    fn hits(hits: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "hits": { "hits": hits } }))
    }

    async fn gateway(distributor_tokens: &'static str) -> MockServer {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/network/config"))
            .respond_with(ok(json!({
                "config": { "erd_chain_id": "1", "erd_denomination": 18, "erd_start_time": GENESIS }
            })))
            .mount(&server)
            .await;

        let return_data: Vec<String> =
            ["WaterDrop", "FungibleESDT", "owner", "0", "0", "NumDecimals-18"]
                .iter()
                .map(|field| STANDARD.encode(field))
                .collect();
        Mock::given(method("POST"))
            .and(path("/vm-values/query"))
            .respond_with(ok(json!({ "data": { "returnData": return_data } })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/address/{DISTRIBUTOR}")))
            .respond_with(ok(json!({ "account": { "balance": "1000000000000000000" } })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/address/[^/]+/esdt/WATER-9ed400$"))
            .respond_with(move |req: &Request| {
                let balance = if req.url.path().contains(DISTRIBUTOR) {
                    distributor_tokens
                } else {
                    "500000000000000000"
                };
                ok(json!({ "tokenData": { "balance": balance } }))
            })
            .mount(&server)
            .await;

        server
    }

    async fn indexer() -> MockServer {
        let server = MockServer::start().await;

        // One delegation of 100 tokens in the priming window, nothing later.
        let priming = format!("timestamp:>={GENESIS} AND");
        Mock::given(method("GET"))
            .and(path("/transactions/_search"))
            .respond_with(move |req: &Request| {
                let query = req
                    .url
                    .query_pairs()
                    .find(|(key, _)| key == "q")
                    .map(|(_, value)| value.into_owned())
                    .unwrap_or_default();
                if !query.contains(&priming) {
                    return hits(json!([]));
                }
                hits(json!([{
                    "_id": "tx1",
                    "_source": {
                        "sender": "erd1x",
                        "receiver": STAKING_SC,
                        "value": "100000000000000000000",
                        "data": STANDARD.encode("delegate"),
                        "status": "success",
                        "timestamp": START + 100
                    }
                }]))
            })
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/scresults/_search"))
            .respond_with(hits(json!([])))
            .mount(&server)
            .await;

        server
    }

    fn write_config(dir: &Path, gateway: &MockServer, indexer: &MockServer) -> PathBuf {
        let config = BonusConfig {
            staking_sc: STAKING_SC.into(),
            proxy: gateway.uri(),
            indexer: indexer.uri(),
            start_time: START,
            end_time: START + 2 * DAY,
            bonus_token: "WATER-9ed400".into(),
            bonus_amount: 1000,
            per_staked_amount: 100,
        };
        let path = dir.join("config.json");
        fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();
        path
    }

    fn args(dir: &Path, config: PathBuf) -> MainArgs {
        MainArgs {
            config,
            output: dir.join("output.csv"),
            plan: dir.join("transfers.json"),
            sender: Some(DISTRIBUTOR.into()),
            yes: true,
            lenient_parsing: false,
            log_json: false,
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn distributes_bonus() {
        let gateway = gateway("2000000000000000000000").await;
        let indexer = indexer().await;
        let dir = tempfile::tempdir().unwrap();
        let args = args(dir.path(), write_config(dir.path(), &gateway, &indexer));

        run(&args).await.unwrap();

        let csv = fs::read_to_string(&args.output).unwrap();
        assert_eq!(
            csv,
            "Address,Average Stake,Last Staked,Token Balance\nerd1x,100.00,100.00,0.50\n"
        );

        let transfers: Vec<PlannedTransfer> =
            serde_json::from_str(&fs::read_to_string(&args.plan).unwrap()).unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].receiver, "erd1x");
        // 1000 tokens at 18 decimals
        assert_eq!(transfers[0].amount, "1000000000000000000000");
        assert_eq!(
            transfers[0].data,
            "ESDTTransfer@57415445522d396564343030@3635c9adc5dea00000"
        );
        assert!(logs_contain("Wrote 1 planned transfers"));
    }

    #[tokio::test]
    async fn insufficient_funds_writes_no_plan() {
        let gateway = gateway("999000000000000000000").await;
        let indexer = indexer().await;
        let dir = tempfile::tempdir().unwrap();
        let args = args(dir.path(), write_config(dir.path(), &gateway, &indexer));

        let err = run(&args).await.unwrap_err();
        assert!(err.to_string().contains("insufficient WATER-9ed400 balance"), "{err:?}");
        assert!(!args.plan.exists());
    }

    #[tokio::test]
    async fn invalid_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.json");
        fs::write(&config, "{}").unwrap();

        assert!(run(&args(dir.path(), config)).await.is_err());
        assert!(!dir.path().join("output.csv").exists());
    }

    #[test]
    fn confirmation_input() {
        assert!(is_confirmed("y\n"));
        assert!(is_confirmed(" Y "));
        assert!(!is_confirmed("yes\n"));
        assert!(!is_confirmed("\n"));
    }
}
