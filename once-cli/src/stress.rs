//! Drives one fresh guard with N simultaneous callers and tallies what each
//! caller saw.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use once_core::{BlockingGuard, CooperativeGuard, Guard, GuardRegistry, SiteId, Variant};
use tokio::task::JoinSet;

use crate::handlers::{StressReport, StressRequest};

const INJECTED_FAILURE: &str = "injected failure";

#[derive(Default)]
struct Tally {
    executions: AtomicUsize,
    granted: AtomicUsize,
    skipped: AtomicUsize,
    failures: AtomicUsize,
    nested_skipped: AtomicUsize,
}

impl Tally {
    fn record(&self, outcome: Result<Option<()>, String>) {
        let counter = match outcome {
            Ok(Some(())) => &self.granted,
            Ok(None) => &self.skipped,
            Err(_) => &self.failures,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn load(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub async fn run(request: &StressRequest, registry: &GuardRegistry) -> Result<StressReport, String> {
    let variant = request.validate()?;
    let site = SiteId::generate();
    let tally = Arc::new(Tally::default());
    let started = Instant::now();

    tracing::info!(%site, %variant, callers = request.callers, "Stress run starting");

    let final_state = match variant {
        Variant::Blocking => {
            let guard = registry.blocking(&site).map_err(|e| e.to_string())?;
            let round = {
                let guard = Arc::clone(&guard);
                let tally = Arc::clone(&tally);
                let request = request.clone();
                tokio::task::spawn_blocking(move || blocking_round(&guard, &request, &tally))
            };
            round.await.map_err(|e| format!("Blocking round failed: {}", e))?;
            guard.state()
        }
        Variant::Cooperative => {
            let guard = registry.cooperative(&site).map_err(|e| e.to_string())?;
            cooperative_round(&guard, request, &tally).await?;
            guard.state()
        }
    };

    let report = StressReport {
        site: site.to_string(),
        variant,
        callers: request.callers,
        executions: Tally::load(&tally.executions),
        granted: Tally::load(&tally.granted),
        skipped: Tally::load(&tally.skipped),
        failures: Tally::load(&tally.failures),
        nested_skipped: Tally::load(&tally.nested_skipped),
        final_state,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };

    if report.executions != 1 {
        tracing::error!(executions = report.executions, "Guard did not run exactly once");
    } else {
        tracing::info!(elapsed_ms = report.elapsed_ms, "Stress run finished");
    }

    Ok(report)
}

fn blocking_round(guard: &BlockingGuard, request: &StressRequest, tally: &Tally) {
    let barrier = Barrier::new(request.callers);

    thread::scope(|scope| {
        for _ in 0..request.callers {
            scope.spawn(|| {
                barrier.wait();
                let outcome = guard.try_run(|| {
                    tally.executions.fetch_add(1, Ordering::SeqCst);
                    if request.reentrant && guard.run(|| ()).is_none() {
                        tally.nested_skipped.fetch_add(1, Ordering::SeqCst);
                    }
                    if request.fail {
                        Err(INJECTED_FAILURE.to_string())
                    } else {
                        Ok(())
                    }
                });
                tally.record(outcome);
            });
        }
    });
}

async fn cooperative_round(
    guard: &Arc<CooperativeGuard>,
    request: &StressRequest,
    tally: &Arc<Tally>,
) -> Result<(), String> {
    let mut tasks = JoinSet::new();

    for _ in 0..request.callers {
        let guard = Arc::clone(guard);
        let tally = Arc::clone(tally);
        let reentrant = request.reentrant;
        let fail = request.fail;

        tasks.spawn(async move {
            let outcome = guard
                .try_run(async {
                    tally.executions.fetch_add(1, Ordering::SeqCst);
                    // Suspend while holding the guard so other callers observe Running
                    tokio::task::yield_now().await;
                    if reentrant && guard.run(async {}).await.is_none() {
                        tally.nested_skipped.fetch_add(1, Ordering::SeqCst);
                    }
                    if fail {
                        Err(INJECTED_FAILURE.to_string())
                    } else {
                        Ok(())
                    }
                })
                .await;
            tally.record(outcome);
        });
    }

    while let Some(joined) = tasks.join_next().await {
        joined.map_err(|e| format!("Stress task failed: {}", e))?;
    }
    Ok(())
}
