/// Plan Dump - Prints the verified transfer plan for a run as JSON
///
/// Usage: cargo run --bin plan_dump [run-parameters.toml|.json]
///
/// With no argument the reference run parameters are used. Logs go to
/// stderr as JSON; filter them with RUST_LOG.
use qpcr_core::{DeckLayout, QpcrError, RunParameters};
use qpcr_planner::TransferPlan;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("qpcr_planner=info,qpcr_layout=info,warn"));

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .try_init();
    if let Err(e) = result {
        eprintln!("Failed to init subscriber: {}", e);
    }
}

fn build_plan(params: &RunParameters) -> Result<TransferPlan, QpcrError> {
    let config = params.validate()?;
    let layout = DeckLayout::standard();
    let plan = TransferPlan::generate(&config, &layout)?;
    plan.verify(&layout)?;
    Ok(plan)
}

fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 2 {
        eprintln!("Usage: cargo run --bin plan_dump [run-parameters.toml|.json]");
        std::process::exit(1);
    }

    let params = match args.get(1) {
        Some(path) => match RunParameters::from_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => RunParameters::default(),
    };

    let plan = match build_plan(&params) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("{}", e.operator_message());
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&plan) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to encode plan: {}", e);
            std::process::exit(1);
        }
    }
}
