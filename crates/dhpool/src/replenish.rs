use crate::{Generator, ParamTool, PoolStore, SizeClass, watch::MIN_PERIOD};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default minimum number of artifacts to keep per size class.
pub const DEFAULT_MINIMUM: usize = 10;

/// Default delay between two replenishment passes.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Background task that keeps every size class topped up.
///
/// On each tick, every class whose count is below the minimum gets exactly one
/// generation, so the pool converges toward the minimum over successive ticks
/// rather than in a burst. The loop never admits anything itself; new files
/// appear in the pool once the watcher reports and validates them.
///
/// Stopping is cooperative. The stop signal is checked before each class and
/// between ticks, never during a generation, so an in-flight call to the
/// external tool always runs to completion.
#[derive(Debug)]
pub struct Replenisher<T> {
    store: Arc<PoolStore>,
    generator: Generator<T>,
    minimum: usize,
    tick: Duration,
}

impl<T: ParamTool> Replenisher<T> {
    pub fn new(store: Arc<PoolStore>, generator: Generator<T>) -> Self {
        Self {
            store,
            generator,
            minimum: DEFAULT_MINIMUM,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_minimum(mut self, minimum: usize) -> Self {
        self.minimum = minimum;
        self
    }

    /// Sets the delay between passes, clamped to at least one millisecond.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(MIN_PERIOD);
        self
    }

    /// Runs one replenishment pass and returns how many generations it
    /// started.
    pub async fn tick(&self, shutdown: &CancellationToken) -> usize {
        let classes: Vec<SizeClass> = self.store.classes().collect();
        let mut started = 0;

        for class in classes {
            if shutdown.is_cancelled() {
                break;
            }
            let available = self.store.count(class);
            if available >= self.minimum {
                continue;
            }
            info!("Generating {class}-bit parameters since we only have {available}...");
            self.generator.generate(class).await;
            started += 1;
        }
        started
    }

    /// Ticks until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            minimum = self.minimum,
            tick_ms = self.tick.as_millis() as u64,
            "Replenisher starting"
        );

        let mut interval = tokio::time::interval(self.tick);
        // A pass may outlast many ticks; don't fire a backlog afterwards.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,

                _ = interval.tick() => {
                    let started = self.tick(&shutdown).await;
                    debug!(started, "Replenish pass done");
                }
            }
        }

        info!("Exiting replenisher");
    }
}
