use std::env;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::Value;
use ssm_lookup::engine::{Facts, Resolver, Session};
use ssm_lookup::{sdk, Configuration, Lookup};

/// Resolves keys against Parameter Store the way a host framework would:
/// one backend, one session, keys in order.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend configuration (JSON option bag).
    #[arg(short, long)]
    config: Option<String>,

    /// Overrides the configured region.
    #[arg(short, long)]
    region: Option<String>,

    /// Fact available to `%{...}` tokens in the base URI, as `name=value`.
    #[arg(short, long = "fact", value_name = "NAME=VALUE")]
    facts: Vec<String>,

    /// Serve parameters from a JSON fixture instead of AWS.
    #[arg(long)]
    fixture: Option<String>,

    /// Print the resolver's explain trace after each key.
    #[arg(long)]
    explain: bool,

    /// Keys to resolve.
    #[arg(required = true)]
    keys: Vec<String>,
}

fn parse_fact(raw: &str) -> anyhow::Result<(String, Value)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("fact `{}` is not in NAME=VALUE form", raw))?;
    if name.is_empty() {
        bail!("fact `{}` has an empty name", raw);
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config_path = args
        .config
        .or_else(|| env::var("SSM_LOOKUP_CONFIG").ok())
        .context("no configuration given (use --config or SSM_LOOKUP_CONFIG)")?;
    let mut config = Configuration::from_path(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;
    if let Some(region) = args.region.or_else(|| env::var("SSM_LOOKUP_REGION").ok()) {
        config.region = Some(region);
    }

    let connector = match &args.fixture {
        Some(path) => sdk::discovery::fixture_connector(path)?,
        None => sdk::default_connector()?,
    };
    let resolver = Resolver::new(config, Arc::clone(&connector))?;

    let mut facts = Facts::new();
    for raw in &args.facts {
        let (name, value) = parse_fact(raw)?;
        facts.insert(name, value);
    }
    let mut session = Session::with_facts(facts).with_explain(args.explain);

    for key in &args.keys {
        let result = resolver.lookup(key, &mut session).await;
        if args.explain {
            for line in session.take_explanations() {
                eprintln!("  [{}] {}", key, line);
            }
        }
        match result.with_context(|| format!("looking up {}", key))? {
            Lookup::Found(value) => println!("{} = {}", key, value),
            Lookup::NotFound => println!("{}: not found", key),
        }
    }

    Ok(())
}
