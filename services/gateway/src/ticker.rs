//! Wall-clock ticker task
//!
//! Drives the simulator once per configured period and hands emitted
//! deltas to the dispatcher. The task yields between instruments with
//! no locks held, so session tasks are never starved by a large
//! catalog. Errors on one instrument are counted and the pass
//! continues.

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::state::{epoch_ms, AppState};

pub async fn run(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = std::time::Duration::from_millis(state.config.update_frequency_ms);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        period_ms = state.config.update_frequency_ms,
        "ticker started"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                info!("ticker stopping");
                return;
            }
        }

        let enabled = state
            .simulator
            .lock()
            .expect("simulator lock poisoned")
            .is_enabled();
        if !enabled {
            continue;
        }

        let now_ms = epoch_ms();
        let time_of_day = state
            .simulator
            .lock()
            .expect("simulator lock poisoned")
            .current_time_of_day();
        state.metrics.record_tick();

        for id in state.store.ids() {
            let result = {
                let mut sim = state.simulator.lock().expect("simulator lock poisoned");
                sim.tick_instrument(&state.store, &id, time_of_day, now_ms)
            };

            match result {
                Ok(Some(delta)) => {
                    state.metrics.record_delta();
                    if let Some(snapshot) = state.store.get(&id) {
                        state
                            .dispatcher
                            .dispatch(&delta, &snapshot.field_map(), now_ms);
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    state.metrics.record_tick_error();
                    warn!(instrument = %id, error = %err, "tick failed for instrument, continuing");
                }
            }

            // Cooperative point between instruments; no locks held.
            tokio::task::yield_now().await;
        }
    }
}
