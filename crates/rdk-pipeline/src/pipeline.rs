//! One validation run, phase by phase, on a bounded worker pool.
//!
//! Phase order:
//!   MULTI_MARKET -> PRIMARY_BACKTEST -> EXECUTION_COST -> PROFIT_ANALYSIS
//!   -> WALK_FORWARD -> MONTE_CARLO -> READINESS
//!
//! - A failed phase (data, harness, timeout) is recorded and later phases
//!   keep running on whatever inputs they still have.
//! - Cancellation stops every later phase; the run ends `Cancelled`.
//! - Configuration and request problems fail before any harness call.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rdk_backtest::{Harness, HarnessReport, ParamSet, StrategyFactory, StrategyRegistry};
use rdk_config::hash_value;
use rdk_costs::{CostDrag, CostModel, MarketProfile};
use rdk_markets::{grid, MarketCell, MultiMarketTester};
use rdk_md::{trailing_daily_notional, MarketDataSource, TRAILING_VOLUME_DAYS};
use rdk_montecarlo::{MonteCarloSimulator, StrategyUnderTest};
use rdk_profit::{equity_curve_for, ProfitAnalyzer, ProfitInput};
use rdk_readiness::{evaluate_readiness, PhaseIssue, ReadinessAssessment, ReadinessInput};
use rdk_schemas::{Candle, Phase, PhaseGuard, RunControl, Timeframe, Trade};
use rdk_walkforward::Diagnosis;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{CacheKey, ResultCache};
use crate::config::{PhaseBudgets, ValidationConfig};
use crate::error::{PhaseFailure, PipelineError};
use crate::events::{EventSink, PhaseEvent};
use crate::request::{
    PhaseOutcome, PhaseState, PrimarySeries, ValidationRequest, ValidationResponse,
    ValidationResults,
};

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    config: ValidationConfig,
    config_hash: String,
    source: Arc<dyn MarketDataSource>,
    registry: Arc<StrategyRegistry>,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config_hash", &self.config_hash)
            .field("source", &self.source.source_name())
            .field("strategies", &self.registry.list())
            .field("workers", &self.pool.current_num_threads())
            .finish()
    }
}

impl Pipeline {
    /// Validates `config` and builds the worker pool.
    pub fn new(
        config: ValidationConfig,
        config_hash: impl Into<String>,
        source: Arc<dyn MarketDataSource>,
        registry: Arc<StrategyRegistry>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.pool.workers)
            .thread_name(|i| format!("rdk-worker-{i}"))
            .build()
            .map_err(|e| PipelineError::Runtime(format!("worker pool: {e}")))?;
        Ok(Self {
            config,
            config_hash: config_hash.into(),
            source,
            registry,
            pool,
        })
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Everything that can be rejected without touching data.
    pub fn check_request(&self, request: &ValidationRequest) -> Result<Arc<dyn StrategyFactory>, PipelineError> {
        request.validate()?;
        self.registry
            .get(&request.strategy_id)
            .map_err(|_| PipelineError::UnknownStrategy(request.strategy_id.clone()))
    }

    /// Config hash combined with the request grid.
    pub fn cache_key(&self, request: &ValidationRequest) -> Result<CacheKey, PipelineError> {
        let config_hash = hash_value(&(
            &self.config_hash,
            &request.symbols,
            &request.timeframes,
            request.lookback_days,
            request.simulation_count,
        ))
        .map_err(|e| PipelineError::ConfigurationInvalid(format!("{e:#}")))?;
        Ok(CacheKey {
            strategy_id: request.strategy_id.clone(),
            config_hash,
        })
    }

    pub fn run(
        &self,
        request: &ValidationRequest,
        control: &RunControl,
        events: &EventSink,
    ) -> Result<ValidationResponse, PipelineError> {
        self.run_as(Uuid::new_v4(), request, control, events)
    }

    /// Run under a caller-chosen run id.
    pub fn run_as(
        &self,
        run_id: Uuid,
        request: &ValidationRequest,
        control: &RunControl,
        events: &EventSink,
    ) -> Result<ValidationResponse, PipelineError> {
        let factory = self.check_request(request)?;
        let run_timestamp = Utc::now();
        info!(
            %run_id,
            strategy_id = %request.strategy_id,
            symbols = request.symbols.len(),
            timeframes = request.timeframes.len(),
            lookback_days = request.lookback_days,
            "validation run started"
        );

        let (phases, results, readiness) = self.pool.install(|| {
            let mut run = RunState::new(run_id, control, events, &self.config.budgets);
            let (results, readiness) = self.execute(&mut run, factory.as_ref(), request);
            (run.outcomes, results, readiness)
        });

        info!(
            %run_id,
            strategy_id = %request.strategy_id,
            status = ?readiness.status,
            readiness_score = readiness.readiness_score,
            "validation run finished"
        );

        Ok(ValidationResponse {
            run_id,
            run_timestamp,
            request: request.clone(),
            config_hash: self.config_hash.clone(),
            status: readiness.status,
            phases,
            results,
            readiness,
        })
    }

    /// Reuse a finished response for the same strategy, config and grid.
    pub fn run_cached(
        &self,
        cache: &ResultCache,
        run_id: Uuid,
        request: &ValidationRequest,
        control: &RunControl,
        events: &EventSink,
    ) -> Result<Arc<ValidationResponse>, PipelineError> {
        self.check_request(request)?;
        let key = self.cache_key(request)?;
        cache.get_or_compute(&key, || self.run_as(run_id, request, control, events))
    }

    fn execute(
        &self,
        run: &mut RunState<'_>,
        factory: &dyn StrategyFactory,
        request: &ValidationRequest,
    ) -> (ValidationResults, ReadinessAssessment) {
        let harness = Harness::new(self.config.harness.clone());
        let params = factory.default_params();
        let cells = grid(&request.symbols, &request.timeframes);
        let mut results = ValidationResults::default();

        // MULTI_MARKET
        let tester = MultiMarketTester::new(self.config.markets.clone());
        results.markets = run.phase(Phase::MultiMarket, |guard| {
            Ok(tester.run(
                &harness,
                factory,
                &params,
                self.source.as_ref(),
                &cells,
                request.lookback_days,
                guard,
            )?)
        });

        // PRIMARY_BACKTEST
        let primary = run.phase(Phase::PrimaryBacktest, |guard| {
            self.primary_backtest(&harness, factory, &params, &cells, request.lookback_days, guard)
        });
        if let Some(p) = &primary {
            results.primary = Some(p.summary());
        }

        // EXECUTION_COST
        let costed = match &primary {
            Some(p) => run.phase(Phase::ExecutionCost, |_| Ok(self.execution_costs(p))),
            None => run.skip(Phase::ExecutionCost),
        };
        results.cost_drag = costed.as_ref().map(|c| c.drag.clone());

        // PROFIT_ANALYSIS
        results.profit = match (&primary, &costed) {
            (Some(p), Some(c)) => {
                let analyzer = ProfitAnalyzer::new(self.config.profit.clone());
                let report = run.phase(Phase::ProfitAnalysis, |_| {
                    Ok(analyzer.report(
                        ProfitInput {
                            gross_trades: &p.report.trades,
                            net_trades: &c.net_trades,
                            initial_capital: self.config.harness.initial_capital,
                            start_ts: p.start_ts(),
                            end_ts: p.end_ts(),
                            fallback_periods_per_year: p.timeframe.periods_per_year(),
                        },
                        c.drag.clone(),
                    ))
                });
                if report.as_ref().is_some_and(|r| r.net.degenerate) {
                    run.mark_degenerate(Phase::ProfitAnalysis);
                }
                report
            }
            _ => run.skip(Phase::ProfitAnalysis),
        };

        // WALK_FORWARD
        results.walk_forward = match &primary {
            Some(p) => {
                let validator = self.config.walk_forward_validator();
                let agg = run.phase(Phase::WalkForward, |guard| {
                    Ok(validator.run(&harness, factory, &params, &p.candles, guard)?)
                });
                if agg.as_ref().is_some_and(|a| a.diagnosis == Diagnosis::Insufficient) {
                    run.mark_degenerate(Phase::WalkForward);
                }
                agg
            }
            None => run.skip(Phase::WalkForward),
        };

        // MONTE_CARLO
        results.monte_carlo = match (&primary, &costed) {
            (Some(p), Some(c)) => {
                let mut mc = self.config.monte_carlo.clone();
                mc.bootstrap.runs = request.simulation_count;
                let simulator = MonteCarloSimulator::new(mc);
                let returns = equity_curve_for(
                    self.config.harness.initial_capital,
                    p.start_ts(),
                    p.end_ts(),
                    &c.net_trades,
                )
                .period_returns();
                let target = StrategyUnderTest {
                    harness: &harness,
                    factory,
                    params: &params,
                    candles: &p.candles,
                };
                run.phase(Phase::MonteCarlo, |guard| {
                    Ok(simulator.run(&target, &returns, &p.report.trades, guard)?)
                })
            }
            _ => run.skip(Phase::MonteCarlo),
        };

        // READINESS
        let issues = run.issues.clone();
        let assessment = run.phase(Phase::Readiness, |_| {
            Ok(evaluate_readiness(
                &self.config.readiness,
                &ReadinessInput {
                    strategy_id: &request.strategy_id,
                    markets: results.markets.as_ref(),
                    profit: results.profit.as_ref(),
                    walk_forward: results.walk_forward.as_ref(),
                    monte_carlo: results.monte_carlo.as_ref(),
                    phase_issues: &issues,
                },
            ))
        });
        let readiness = match assessment {
            Some(a) if !run.cancelled => a,
            _ => ReadinessAssessment::cancelled(request.strategy_id.clone(), &self.config.readiness.sizing),
        };
        (results, readiness)
    }

    /// First grid cell whose data loads, replayed without costs.
    fn primary_backtest(
        &self,
        harness: &Harness,
        factory: &dyn StrategyFactory,
        params: &ParamSet,
        cells: &[MarketCell],
        lookback_days: u32,
        guard: &PhaseGuard,
    ) -> Result<Primary, PhaseFailure> {
        let mut unavailable = Vec::new();
        for cell in cells {
            guard.checkpoint()?;
            let candles = match self.source.candles(&cell.symbol, cell.timeframe, lookback_days) {
                Ok(c) if !c.is_empty() => c,
                Ok(_) => {
                    unavailable.push(format!("{} {}: no candles", cell.symbol, cell.timeframe));
                    continue;
                }
                Err(e) => {
                    unavailable.push(e.to_string());
                    continue;
                }
            };
            let report = harness.run(factory, params, &candles).map_err(|e| PhaseFailure::Harness {
                reason: format!("{} {}: {}", cell.symbol, cell.timeframe, e),
            })?;
            debug!(
                symbol = %cell.symbol,
                timeframe = %cell.timeframe,
                candles = candles.len(),
                trades = report.trades.len(),
                "primary series selected"
            );
            return Ok(Primary {
                symbol: cell.symbol.clone(),
                timeframe: cell.timeframe,
                candles: Arc::from(candles),
                report,
            });
        }
        Err(PhaseFailure::DataUnavailable {
            reason: format!("no grid cell produced candles ({})", unavailable.join("; ")),
        })
    }

    fn execution_costs(&self, p: &Primary) -> Costed {
        let daily_notional = self
            .source
            .trailing_notional_volume(&p.symbol)
            .unwrap_or_else(|e| {
                warn!(symbol = %p.symbol, error = %e, "trailing volume unavailable; estimating from candles");
                trailing_daily_notional(&p.candles, TRAILING_VOLUME_DAYS)
            });
        let profile = MarketProfile::from_candles(&p.candles, p.timeframe, daily_notional)
            .with_trades_per_day(MarketProfile::trade_frequency(&p.report.trades));
        let model = CostModel::new(self.config.costs.clone());
        Costed {
            net_trades: model.net_trades(&profile, &p.report.trades),
            drag: model.cost_drag(&profile, &p.report.trades, self.config.harness.initial_capital),
        }
    }
}

/// Run the pipeline off the caller's async runtime. Phase events arrive on
/// the returned receiver; the channel closes when the run ends.
pub fn spawn_validation(
    pipeline: Arc<Pipeline>,
    request: ValidationRequest,
    control: RunControl,
) -> (
    JoinHandle<Result<ValidationResponse, PipelineError>>,
    UnboundedReceiver<PhaseEvent>,
) {
    let (events, rx) = EventSink::channel();
    let handle = tokio::task::spawn_blocking(move || pipeline.run(&request, &control, &events));
    (handle, rx)
}

/// [`spawn_validation`] through the results cache.
pub fn spawn_cached_validation(
    pipeline: Arc<Pipeline>,
    cache: Arc<ResultCache>,
    run_id: Uuid,
    request: ValidationRequest,
    control: RunControl,
) -> (
    JoinHandle<Result<Arc<ValidationResponse>, PipelineError>>,
    UnboundedReceiver<PhaseEvent>,
) {
    let (events, rx) = EventSink::channel();
    let handle = tokio::task::spawn_blocking(move || {
        pipeline.run_cached(&cache, run_id, &request, &control, &events)
    });
    (handle, rx)
}

// ---------------------------------------------------------------------------
// Per-run state
// ---------------------------------------------------------------------------

struct Primary {
    symbol: String,
    timeframe: Timeframe,
    candles: Arc<[Candle]>,
    report: HarnessReport,
}

impl Primary {
    fn start_ts(&self) -> i64 {
        self.candles.first().map(|c| c.ts).unwrap_or(0)
    }

    fn end_ts(&self) -> i64 {
        self.candles.last().map(|c| c.ts).unwrap_or(0)
    }

    fn summary(&self) -> PrimarySeries {
        PrimarySeries {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
            candle_count: self.candles.len(),
            start_ts: self.start_ts(),
            end_ts: self.end_ts(),
            gross_trade_count: self.report.trades.len(),
        }
    }
}

struct Costed {
    net_trades: Vec<Trade>,
    drag: CostDrag,
}

struct RunState<'a> {
    run_id: Uuid,
    control: &'a RunControl,
    events: &'a EventSink,
    budgets: &'a PhaseBudgets,
    outcomes: Vec<PhaseOutcome>,
    issues: Vec<PhaseIssue>,
    cancelled: bool,
}

impl<'a> RunState<'a> {
    fn new(run_id: Uuid, control: &'a RunControl, events: &'a EventSink, budgets: &'a PhaseBudgets) -> Self {
        Self {
            run_id,
            control,
            events,
            budgets,
            outcomes: Vec::with_capacity(Phase::ALL.len()),
            issues: Vec::new(),
            cancelled: false,
        }
    }

    /// Run one phase under its guard. `None` means the phase produced no
    /// result; the outcome, event and readiness issue are recorded here.
    fn phase<T>(
        &mut self,
        phase: Phase,
        work: impl FnOnce(&PhaseGuard) -> Result<T, PhaseFailure>,
    ) -> Option<T> {
        if self.cancelled {
            return self.skip(phase);
        }

        let budget = self.budgets.budget(phase);
        let guard = self.control.guard(phase, budget);
        self.events.send(PhaseEvent::PhaseStarted {
            run_id: self.run_id,
            phase,
        });

        let started = Instant::now();
        let result = guard.checkpoint().map_err(PhaseFailure::from).and_then(|()| work(&guard));
        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;

        // A phase whose last unit finished past the deadline still failed.
        let result = match (result, budget) {
            (Ok(_), Some(b)) if elapsed > b => Err(PhaseFailure::PhaseTimeout {
                budget_ms: b.as_millis() as u64,
            }),
            (r, _) => r,
        };

        match result {
            Ok(value) => {
                debug!(run_id = %self.run_id, %phase, elapsed_ms, "phase completed");
                self.events.send(PhaseEvent::PhaseCompleted {
                    run_id: self.run_id,
                    phase,
                    elapsed_ms,
                });
                self.outcomes.push(PhaseOutcome {
                    phase,
                    state: PhaseState::Completed,
                    elapsed_ms,
                    failure: None,
                });
                Some(value)
            }
            Err(failure) => {
                warn!(run_id = %self.run_id, %phase, reason = %failure, "phase failed");
                self.events.send(PhaseEvent::PhaseFailed {
                    run_id: self.run_id,
                    phase,
                    reason: failure.to_string(),
                });
                if failure.is_cancelled() {
                    self.cancelled = true;
                } else {
                    self.issues.push(PhaseIssue {
                        phase,
                        reason: failure.to_string(),
                    });
                }
                self.outcomes.push(PhaseOutcome {
                    phase,
                    state: PhaseState::Failed,
                    elapsed_ms,
                    failure: Some(failure),
                });
                None
            }
        }
    }

    fn skip<T>(&mut self, phase: Phase) -> Option<T> {
        self.outcomes.push(PhaseOutcome {
            phase,
            state: PhaseState::Skipped,
            elapsed_ms: 0,
            failure: None,
        });
        None
    }

    fn mark_degenerate(&mut self, phase: Phase) {
        if let Some(o) = self
            .outcomes
            .iter_mut()
            .rev()
            .find(|o| o.phase == phase && o.state == PhaseState::Completed)
        {
            o.state = PhaseState::Degenerate;
        }
    }
}
