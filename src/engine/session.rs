// Long-lived engine session: lifecycle and single-flight job execution

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use super::{Engine, EngineEvent, EngineResources, FilterPlan, INPUT_NAME, OUTPUT_NAME};
use crate::error::EngineError;

/// Receives every engine event for the rest of the session.
pub type EventListener = Box<dyn Fn(EngineEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnginePhase {
    Unloaded,
    Loading,
    Ready,
    LoadFailed,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Log lines attached to an execution failure
    pub tail_lines: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { tail_lines: 20 }
    }
}

struct Inner {
    engine: Mutex<Box<dyn Engine>>,
    phase: Mutex<EnginePhase>,
    listener: OnceLock<EventListener>,
    in_flight: AtomicBool,
    config: SessionConfig,
}

/// Cloneable handle to the one engine instance. Clones share the instance,
/// so worker threads can run jobs while the controller observes the phase.
#[derive(Clone)]
pub struct EngineSession {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EngineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSession")
            .field("phase", &self.phase())
            .field("running", &self.is_running())
            .finish()
    }
}

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EngineSession {
    pub fn new(engine: Box<dyn Engine>, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine: Mutex::new(engine),
                phase: Mutex::new(EnginePhase::Unloaded),
                listener: OnceLock::new(),
                in_flight: AtomicBool::new(false),
                config,
            }),
        }
    }

    pub fn phase(&self) -> EnginePhase {
        *lock(&self.inner.phase)
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == EnginePhase::Ready
    }

    pub fn is_running(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Load the engine. Blocks until the load resolves.
    ///
    /// `listener` is registered on the first successful load only; listeners
    /// passed to later calls are dropped.
    pub fn initialize(
        &self,
        resources: &EngineResources,
        listener: EventListener,
    ) -> Result<(), EngineError> {
        {
            let mut phase = lock(&self.inner.phase);
            match *phase {
                EnginePhase::Loading => return Err(EngineError::AlreadyLoading),
                EnginePhase::Ready => return Ok(()),
                EnginePhase::Unloaded | EnginePhase::LoadFailed => {
                    *phase = EnginePhase::Loading;
                }
            }
        }

        tracing::info!(core = %resources.core, "loading engine");
        let result = lock(&self.inner.engine).load(resources);

        let mut phase = lock(&self.inner.phase);
        match result {
            Ok(()) => {
                *phase = EnginePhase::Ready;
                if self.inner.listener.set(listener).is_err() {
                    tracing::debug!("engine listener already registered");
                }
                tracing::info!("engine ready");
                Ok(())
            }
            Err(e) => {
                *phase = EnginePhase::LoadFailed;
                let message = format!("{:#}", e);
                tracing::warn!(error = %message, "engine load failed");
                Err(EngineError::LoadFailed { message })
            }
        }
    }

    /// Execute one job: stage the input, run the plan, collect the output.
    pub fn run_job(&self, input: &[u8], plan: &FilterPlan) -> Result<Vec<u8>, EngineError> {
        if !self.is_ready() {
            return Err(EngineError::NotReady);
        }
        let _flight = InFlight::acquire(&self.inner.in_flight).ok_or(EngineError::JobAlreadyRunning)?;

        let mut scratch = Scratch {
            engine: lock(&self.inner.engine),
        };
        scratch.write(INPUT_NAME, input)?;

        let tail_lines = self.inner.config.tail_lines;
        let mut tail: VecDeque<String> = VecDeque::with_capacity(tail_lines);
        let listener = self.inner.listener.get();

        tracing::debug!(args = ?plan.engine_arguments, "executing plan");
        let status = scratch.engine.exec(&plan.engine_arguments, &mut |event| {
            if let EngineEvent::Log(line) = &event {
                #[cfg(feature = "dev-logging")]
                tracing::trace!(target: "lightmode::engine_log", "{}", line);
                if tail_lines > 0 {
                    while tail.len() >= tail_lines {
                        tail.pop_front();
                    }
                    tail.push_back(line.clone());
                }
            }
            if let Some(listener) = listener {
                listener(event);
            }
        });

        match status {
            Ok(0) => scratch.read(OUTPUT_NAME),
            Ok(code) => Err(EngineError::ExecutionFailed {
                message: format!("engine exited with code {}", code),
                tail: tail.into(),
            }),
            Err(e) => Err(EngineError::ExecutionFailed {
                message: format!("{:#}", e),
                tail: tail.into(),
            }),
        }
    }
}

/// Marks a job in flight; released on every exit path.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Exclusive access to the engine for one job. Dropping it removes the
/// input and output entries from working storage.
struct Scratch<'a> {
    engine: MutexGuard<'a, Box<dyn Engine>>,
}

impl Scratch<'_> {
    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        self.engine
            .write_file(name, data)
            .map_err(|e| EngineError::Storage {
                name: name.to_string(),
                message: format!("{:#}", e),
            })
    }

    fn read(&mut self, name: &str) -> Result<Vec<u8>, EngineError> {
        self.engine.read_file(name).map_err(|e| EngineError::Storage {
            name: name.to_string(),
            message: format!("{:#}", e),
        })
    }
}

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        for name in [INPUT_NAME, OUTPUT_NAME] {
            if let Err(e) = self.engine.delete_file(name) {
                tracing::warn!(name, error = %format!("{:#}", e), "failed to release working entry");
            }
        }
    }
}
