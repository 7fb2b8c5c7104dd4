//! `rdk validate`: run the pipeline over a CSV data directory.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rdk_md::CsvDirSource;
use rdk_pipeline::{
    spawn_validation, JsonDirStore, PhaseEvent, Pipeline, ResultStore, ValidationRequest,
    ValidationResponse,
};
use rdk_readiness::write_assessment_json;
use rdk_schemas::{RunControl, Timeframe};
use tracing::{info, warn};

use super::load_validation_config;

pub struct ValidateArgs {
    pub data_dir: String,
    pub config_paths: Vec<String>,
    pub strategy: String,
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,
    pub lookback_days: u32,
    pub simulations: usize,
    pub store_dir: Option<String>,
    pub out: Option<String>,
    pub json: bool,
}

pub async fn run(args: ValidateArgs) -> Result<()> {
    let (config, config_hash) = load_validation_config(&args.config_paths)?;
    let registry = Arc::new(rdk_backtest::reference::registry()?);
    let source = Arc::new(CsvDirSource::new(&args.data_dir));
    let pipeline = Arc::new(Pipeline::new(config, config_hash, source, registry)?);

    let request = ValidationRequest {
        strategy_id: args.strategy,
        symbols: args.symbols,
        timeframes: args.timeframes,
        lookback_days: args.lookback_days,
        simulation_count: args.simulations,
    };
    // Reject bad requests before spawning anything.
    pipeline.check_request(&request)?;

    let control = RunControl::new();
    let (handle, mut rx) = spawn_validation(Arc::clone(&pipeline), request, control.clone());

    let mut interrupted = false;
    loop {
        tokio::select! {
            ev = rx.recv() => match ev {
                Some(ev) => log_event(&ev),
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                warn!("interrupt received; cancelling validation run");
                control.cancel();
                interrupted = true;
            }
        }
    }

    let response = handle.await.context("validation task failed")??;

    if let Some(dir) = &args.store_dir {
        let key = JsonDirStore::new(dir).save(&response)?;
        println!("stored=true strategy_id={} run_timestamp={}", key.strategy_id, key.run_timestamp.to_rfc3339());
    }
    if let Some(dir) = &args.out {
        let path = write_assessment_json(Path::new(dir), &response.readiness)?;
        println!("assessment_path={}", path.display());
    }

    if args.json {
        let json = serde_json::to_string_pretty(&response).context("serialize validation response failed")?;
        println!("{json}");
    } else {
        print_summary(&response);
    }
    Ok(())
}

fn log_event(ev: &PhaseEvent) {
    match ev {
        PhaseEvent::PhaseStarted { run_id, phase } => {
            info!(%run_id, %phase, "phase started");
        }
        PhaseEvent::PhaseCompleted {
            run_id,
            phase,
            elapsed_ms,
        } => {
            info!(%run_id, %phase, elapsed_ms, "phase completed");
        }
        PhaseEvent::PhaseFailed {
            run_id,
            phase,
            reason,
        } => {
            warn!(%run_id, %phase, %reason, "phase failed");
        }
    }
}

fn print_summary(r: &ValidationResponse) {
    let a = &r.readiness;
    println!("run_id={}", r.run_id);
    println!("strategy_id={}", r.strategy_id());
    println!("config_hash={}", r.config_hash);
    println!("status={}", r.status.as_str());
    println!("readiness_score={:.1}", a.readiness_score);
    println!("risk_level={}", a.risk_level.as_str());
    println!(
        "sizing position_size_pct={} max_exposure_pct={} daily_loss_limit_pct={}",
        a.sizing.position_size_pct, a.sizing.max_exposure_pct, a.sizing.daily_loss_limit_pct
    );
    for p in &r.phases {
        match &p.failure {
            Some(f) => println!("phase={} state={} reason={}", p.phase, p.state.as_str(), f),
            None => println!("phase={} state={} elapsed_ms={}", p.phase, p.state.as_str(), p.elapsed_ms),
        }
    }
    for f in r.phase_failures() {
        println!("phase_failure={f}");
    }
    for f in &a.critical_failures {
        println!("critical_failure={f}");
    }
    for w in &a.warnings {
        println!("warning={}", w.message);
    }
    for rec in r.recommendations() {
        println!("recommendation={rec}");
    }
}
