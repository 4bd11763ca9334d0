//! The four periodic tasks.
//!
//! ```text
//! movement   every movement_tick_ms   Scheduler::step
//! broadcast  every broadcast_tick_ms  snapshot → SimObserver::on_frame
//! event      every campaign_poll_ms   poll_event            (blocking pool)
//! traffic    every campaign_poll_ms   poll_random_traffic   (blocking pool)
//! ```
//!
//! Each task owns its timer (`MissedTickBehavior::Skip`) and its RNG stream,
//! and suspends only at its own tick boundary.  All four watch one shutdown
//! signal.  The route-bank warm-up runs once on the blocking pool at start.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crowd_core::SimRng;

use crate::campaign::poll_event;
use crate::traffic::poll_random_traffic;
use crate::{Scheduler, Sim, SimContext, SimHandle, SimObserver, SimResult};

pub struct SimRuntime {
    handle:   SimHandle,
    shutdown: watch::Sender<bool>,
    tasks:    Vec<JoinHandle<()>>,
    warmup:   JoinHandle<()>,
}

impl SimRuntime {
    /// Spawn the periodic tasks.  Must be called inside a tokio runtime.
    pub fn start<O: SimObserver>(sim: Sim, observer: O) -> Self {
        let Sim { ctx, scheduler, event_rng, traffic_rng, mut bank_rng } = sim;
        let handle = SimHandle::new(Arc::clone(&ctx));
        let (shutdown, rx) = watch::channel(false);

        let target = ctx.config.route_bank_target;
        let bank_ctx = Arc::clone(&ctx);
        let warmup = tokio::spawn(async move {
            let built = tokio::task::spawn_blocking(move || {
                bank_ctx.network.precompute_route_bank(target, &mut bank_rng)
            })
            .await;
            match built {
                Ok(routes) => debug!(routes, "route bank warm-up finished"),
                Err(e) => warn!(error = %e, "route bank warm-up failed"),
            }
        });

        let period = ctx.config.campaign_period();
        let tasks = vec![
            tokio::spawn(movement_task(scheduler, ctx.config.movement_period(), rx.clone())),
            tokio::spawn(broadcast_task(Arc::clone(&ctx), observer, ctx.config.broadcast_period(), rx.clone())),
            tokio::spawn(poll_task("event", Arc::clone(&ctx), event_rng, period, poll_event, rx.clone())),
            tokio::spawn(poll_task("traffic", Arc::clone(&ctx), traffic_rng, period, poll_random_traffic, rx)),
        ];
        info!(
            movement_ms = ctx.config.movement_tick_ms,
            broadcast_ms = ctx.config.broadcast_tick_ms,
            campaign_ms = ctx.config.campaign_poll_ms,
            "simulation runtime started"
        );

        Self { handle, shutdown, tasks, warmup }
    }

    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }

    /// Signal every task to stop and wait for all of them.  Returns the first
    /// task failure, if any, after every task has been joined.  An unfinished
    /// route-bank warm-up is left to complete on its own.
    pub async fn shutdown(self) -> SimResult<()> {
        // Receivers only disappear once their tasks have already exited.
        let _ = self.shutdown.send(true);
        self.warmup.abort();
        let mut first_failure = None;
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "simulation task failed");
                first_failure.get_or_insert(e);
            }
        }
        info!("simulation runtime stopped");
        match first_failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// Resolves once shutdown is signalled or the sender is gone.
async fn stopped(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn movement_task(mut scheduler: Scheduler, period: Duration, mut stop: watch::Receiver<bool>) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = stopped(&mut stop) => break,
            _ = tick.tick() => {
                scheduler.step(Instant::now());
            }
        }
    }
    debug!("movement task stopped");
}

async fn broadcast_task<O: SimObserver>(
    ctx:      Arc<SimContext>,
    mut observer: O,
    period:   Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = stopped(&mut stop) => break,
            _ = tick.tick() => {
                if observer.wants_frame() {
                    observer.on_frame(ctx.store.snapshot()).await;
                }
            }
        }
    }
    observer.on_shutdown().await;
    debug!("broadcast task stopped");
}

/// Run `poll` on the blocking pool every `period`, threading the task's RNG
/// through each call.
async fn poll_task(
    name:     &'static str,
    ctx:      Arc<SimContext>,
    rng:      SimRng,
    period:   Duration,
    poll:     fn(&SimContext, Instant, &mut SimRng) -> usize,
    mut stop: watch::Receiver<bool>,
) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut rng = Some(rng);
    loop {
        tokio::select! {
            _ = stopped(&mut stop) => break,
            _ = tick.tick() => {
                let Some(mut owned) = rng.take() else { break };
                let task_ctx = Arc::clone(&ctx);
                let now = Instant::now();
                let joined = tokio::task::spawn_blocking(move || {
                    let spawned = poll(&task_ctx, now, &mut owned);
                    (owned, spawned)
                })
                .await;
                match joined {
                    Ok((back, spawned)) => {
                        rng = Some(back);
                        if spawned > 0 {
                            debug!(task = name, spawned, "poll spawned agents");
                        }
                    }
                    Err(e) => {
                        warn!(task = name, error = %e, "poll task failed; stopping");
                        break;
                    }
                }
            }
        }
    }
    debug!(task = name, "poll task stopped");
}
