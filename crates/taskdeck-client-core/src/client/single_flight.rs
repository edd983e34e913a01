//! Coalesces concurrent requests for the same operation into one execution

use std::{fmt::Debug, future::Future, sync::Mutex};

use futures::future::{BoxFuture, FutureExt as _, Shared};
use taskdeck_shared::{time::Seconds, uac::SessionError};
use tracing::{debug, instrument};

type Flight<T> = Shared<BoxFuture<'static, Result<T, SessionError>>>;

/// Runs at most one instance of an operation at a time. Callers arriving while
/// it is running await the same outcome instead of starting their own.
///
/// In memoizing mode a successful outcome is kept and handed out until
/// [`SingleFlight::clear`] is called. Errors are never kept.
pub struct SingleFlight<T> {
    name: &'static str,
    memoize: bool,
    inner: Mutex<FlightInner<T>>,
}

struct FlightInner<T> {
    /// Bumped every time a flight starts or the state is reset so an outcome
    /// can tell if it is still the one the state is waiting on
    generation: u64,
    state: FlightState<T>,
}

enum FlightState<T> {
    Idle,
    InFlight { generation: u64, flight: Flight<T> },
    Completed(T),
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Outcomes are handed to the callers that were waiting, then forgotten
    pub fn new(name: &'static str) -> Self {
        Self::with_mode(name, false)
    }

    /// Successful outcomes are kept until cleared
    pub fn memoized(name: &'static str) -> Self {
        Self::with_mode(name, true)
    }

    fn with_mode(name: &'static str, memoize: bool) -> Self {
        Self {
            name,
            memoize,
            inner: Mutex::new(FlightInner {
                generation: 0,
                state: FlightState::Idle,
            }),
        }
    }

    /// Joins the running flight, returns the kept value, or starts a new
    /// flight from `start`.
    ///
    /// The flight is registered before `start`'s future is first polled and
    /// while the lock is held, so no second caller can start a duplicate.
    pub async fn run<F>(&self, start: F) -> Result<T, SessionError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<T, SessionError>>,
    {
        let (generation, flight) = {
            let mut guard = self.inner.lock().expect("mutex poisoned");
            match &guard.state {
                FlightState::Completed(value) => return Ok(value.clone()),
                FlightState::InFlight { generation, flight } => {
                    debug!(name = self.name, "joining flight in progress");
                    (*generation, flight.clone())
                }
                FlightState::Idle => {
                    debug!(name = self.name, "starting new flight");
                    guard.generation += 1;
                    let generation = guard.generation;
                    let flight = start().shared();
                    guard.state = FlightState::InFlight {
                        generation,
                        flight: flight.clone(),
                    };
                    (generation, flight)
                }
            }
        };
        let outcome = flight.await;
        self.settle(generation, &outcome);
        outcome
    }

    /// The kept value, never starts a flight
    pub fn completed(&self) -> Option<T> {
        match &self.inner.lock().expect("mutex poisoned").state {
            FlightState::Completed(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(
            self.inner.lock().expect("mutex poisoned").state,
            FlightState::InFlight { .. }
        )
    }

    /// Drops the kept value and detaches any running flight. Waiters of the
    /// detached flight still get its outcome but it is not kept
    #[instrument(skip(self), fields(name = self.name))]
    pub fn clear(&self) {
        let mut guard = self.inner.lock().expect("mutex poisoned");
        guard.generation += 1;
        guard.state = FlightState::Idle;
    }

    fn settle(&self, generation: u64, outcome: &Result<T, SessionError>) {
        let mut guard = self.inner.lock().expect("mutex poisoned");
        let is_current = matches!(
            &guard.state,
            FlightState::InFlight { generation: current, .. } if *current == generation
        );
        if !is_current {
            // Already settled by another waiter or cleared in the meantime
            return;
        }
        guard.state = match outcome {
            Ok(value) if self.memoize => FlightState::Completed(value.clone()),
            _ => FlightState::Idle,
        };
    }
}

impl<T> Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.inner.lock().map(|guard| match guard.state {
            FlightState::Idle => "Idle",
            FlightState::InFlight { .. } => "InFlight",
            FlightState::Completed(_) => "Completed",
        }) {
            Ok(state) => state,
            Err(_) => "Poisoned",
        };
        f.debug_struct("SingleFlight")
            .field("name", &self.name)
            .field("memoize", &self.memoize)
            .field("state", &state)
            .finish()
    }
}

/// Bounds `future` so a hung network call eventually releases its flight
pub async fn with_timeout<T, F>(
    operation: &'static str,
    after: Seconds,
    future: F,
) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, SessionError>>,
{
    match tokio::time::timeout(after.into(), future).await {
        Ok(outcome) => outcome,
        Err(_elapsed) => Err(SessionError::Timeout { operation, after }),
    }
}
