use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};

use backrun::engine::JobSpec;
use backrun::exec::JobExecutor;

/// A fake executor that:
/// - records which jobs were "run", in order
/// - optionally sleeps to simulate work (visible to the paused test clock)
/// - fails the next N invocations of a job when told to.
pub struct FakeExecutor {
    executed: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<HashMap<String, usize>>>,
    delay: Duration,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self {
            executed: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            delay: Duration::ZERO,
        }
    }

    /// Simulate each run taking `delay` of (tokio) time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared list of executed job names, in execution order.
    pub fn executed(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.executed)
    }

    pub fn executed_names(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn executed_count(&self, job: &str) -> usize {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .filter(|name| name.as_str() == job)
            .count()
    }

    /// Make the next `count` executions of `job` fail.
    pub fn fail_next(&self, job: &str, count: usize) {
        self.failures
            .lock()
            .unwrap()
            .insert(job.to_string(), count);
    }
}

impl Default for FakeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl JobExecutor for FakeExecutor {
    fn execute<'a>(
        &'a self,
        spec: &'a JobSpec,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        let executed = Arc::clone(&self.executed);
        let failures = Arc::clone(&self.failures);
        let delay = self.delay;
        let name = spec.name.clone();

        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            executed.lock().unwrap().push(name.clone());

            let should_fail = {
                let mut failures = failures.lock().unwrap();
                match failures.get_mut(&name) {
                    Some(remaining) if *remaining > 0 => {
                        *remaining -= 1;
                        true
                    }
                    _ => false,
                }
            };

            if should_fail {
                bail!("injected failure for job '{name}'");
            }
            Ok(())
        })
    }
}
