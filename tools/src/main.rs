//! cf-runner: headless counterfactual runner over a customer population.
//!
//! Usage:
//!   cf-runner --mode batch --timing 14 --action discount --top-n 20
//!   cf-runner --mode single --customer 1003 --timing 30 --action priority_support
//!   cf-runner --mode sweep
//!   cf-runner --mode recommend --customer 1003
//!   cf-runner --ipc-mode

use anyhow::Result;
use retention_core::{
    types::{CustomerId, TimingDays},
    ActionKind, CounterfactualEngine, EngineConfig, LogitScorer, Population, ScoredRecord,
};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Customers,
    Counterfactual {
        customer_id: CustomerId,
        timing_days: TimingDays,
        action_type: String,
    },
    Batch {
        timing_days: TimingDays,
        action_type: String,
        #[serde(default)]
        top_n: Option<usize>,
    },
    Recommend {
        customer_id: CustomerId,
    },
    Quit,
}

#[derive(serde::Serialize)]
struct BatchResponse<'a> {
    timing_days: TimingDays,
    action_type: &'a str,
    rows:        Vec<ScoredRecord>,
}

/// Everything a request needs, materialised once at startup.
struct Runner {
    config:     EngineConfig,
    engine:     CounterfactualEngine,
    scorer:     LogitScorer,
    population: Population,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let data_dir = parse_str(&args, "--data-dir").unwrap_or("./data").to_string();
    let population_path = parse_str(&args, "--population")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{data_dir}/population/customers.json"));
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");

    let config = EngineConfig::load(&data_dir)?;
    let population = Population::load(&population_path)?;
    let runner = Runner {
        engine: CounterfactualEngine::new(&config),
        scorer: LogitScorer::new(config.logit_scorer.clone()),
        config,
        population,
    };

    if ipc_mode {
        return run_ipc_loop(&runner);
    }

    let mode = parse_str(&args, "--mode").unwrap_or("batch");
    let timing = parse_arg(&args, "--timing", 14 as TimingDays)?;
    let action = parse_str(&args, "--action").unwrap_or("discount");
    let top_n = parse_opt::<usize>(&args, "--top-n")?;
    let customer = parse_opt::<CustomerId>(&args, "--customer")?;

    let output = match mode {
        "batch" => {
            let rows = runner.batch(timing, action, top_n)?;
            serde_json::to_value(BatchResponse { timing_days: timing, action_type: action, rows })?
        }
        "single" => {
            let customer_id = require_customer(customer)?;
            serde_json::to_value(runner.engine.counterfactual_for(
                runner.population.records(),
                customer_id,
                timing,
                action,
                &runner.scorer,
            )?)?
        }
        "sweep" => serde_json::to_value(runner.engine.scenario_sweep(
            runner.population.records(),
            &runner.config.scenario_timings,
            &ActionKind::ALL,
            &runner.scorer,
        )?)?,
        "recommend" => {
            let customer_id = require_customer(customer)?;
            serde_json::to_value(runner.recommend(customer_id)?)?
        }
        other => anyhow::bail!("Unknown mode '{other}' (expected batch|single|sweep|recommend)"),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

impl Runner {
    fn batch(
        &self,
        timing: TimingDays,
        action: &str,
        top_n: Option<usize>,
    ) -> retention_core::CfResult<Vec<ScoredRecord>> {
        self.engine.rank(self.population.records(), timing, action, &self.scorer, top_n)
    }

    fn recommend(&self, customer_id: CustomerId) -> retention_core::CfResult<retention_core::Recommendation> {
        self.engine.recommend(
            self.population.records(),
            customer_id,
            &self.config.recommend_timings,
            &self.scorer,
        )
    }

    fn handle(&self, cmd: IpcCommand) -> retention_core::CfResult<serde_json::Value> {
        let value = match cmd {
            IpcCommand::Customers => {
                serde_json::json!({ "customer_ids": self.population.customer_ids() })
            }
            IpcCommand::Counterfactual { customer_id, timing_days, action_type } => {
                serde_json::to_value(self.engine.counterfactual_for(
                    self.population.records(),
                    customer_id,
                    timing_days,
                    &action_type,
                    &self.scorer,
                )?)?
            }
            IpcCommand::Batch { timing_days, action_type, top_n } => {
                let rows = self.batch(timing_days, &action_type, top_n)?;
                serde_json::to_value(BatchResponse {
                    timing_days,
                    action_type: &action_type,
                    rows,
                })?
            }
            IpcCommand::Recommend { customer_id } => serde_json::to_value(self.recommend(customer_id)?)?,
            IpcCommand::Quit => serde_json::json!({ "ok": true }),
        };
        Ok(value)
    }
}

fn run_ipc_loop(runner: &Runner) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("ipc: malformed command: {e}");
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };
        let quit = matches!(cmd, IpcCommand::Quit);

        let response = match runner.handle(cmd) {
            Ok(value) => value,
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        writeln!(stdout, "{response}")?;
        stdout.flush()?;

        if quit {
            break;
        }
    }
    Ok(())
}

fn require_customer(customer: Option<CustomerId>) -> Result<CustomerId> {
    customer.ok_or_else(|| anyhow::anyhow!("--customer <id> is required for this mode"))
}

fn parse_str<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

/// `Ok(None)` when the flag is absent; an error when its value does not parse.
fn parse_opt<T>(args: &[String], flag: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match parse_str(args, flag) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value '{v}' for {flag}: {e}")),
    }
}

fn parse_arg<T>(args: &[String], flag: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    Ok(parse_opt(args, flag)?.unwrap_or(default))
}
