use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::FeedbackConfig;
use crate::feedback::prompt::{AdvicePrompt, FeedbackRequest};
use crate::pipeline::traits::AdviceProvider;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum FeedbackOutcome {
    Ok(String),
    /// Cooldown active or another request in flight; no call was made.
    Throttled(String),
    /// The provider failed or timed out; cooldown was not advanced.
    Failed(String),
}

impl FeedbackOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Ok(text) | Self::Throttled(text) | Self::Failed(text) => text,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackPoll {
    /// Nothing has been requested.
    Idle,
    Pending,
    Ready(FeedbackOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Idle,
    InFlight,
    Cooldown { remaining: Duration },
}

/// Rate limiter in front of an [`AdviceProvider`].
///
/// Cloning is cheap and every clone shares one cooldown slot, so a single gate
/// can serve many recognizers. Admission (check cooldown, reserve the slot) is
/// one critical section; only a successful call moves the cooldown timestamp.
#[derive(Clone)]
pub struct FeedbackGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    provider: Arc<dyn AdviceProvider>,
    config: FeedbackConfig,
    state: Mutex<GateState>,
}

#[derive(Debug, Default)]
struct GateState {
    last_success: Option<Instant>,
    in_flight: Option<u64>,
    next_reservation: u64,
}

impl FeedbackGate {
    pub fn new(provider: Arc<dyn AdviceProvider>, config: FeedbackConfig) -> Self {
        Self {
            inner: Arc::new(GateInner {
                provider,
                config,
                state: Mutex::new(GateState::default()),
            }),
        }
    }

    pub fn config(&self) -> &FeedbackConfig {
        &self.inner.config
    }

    pub fn status(&self) -> GateStatus {
        let now = Instant::now();
        let state = self.inner.lock_state();
        if state.in_flight.is_some() {
            return GateStatus::InFlight;
        }
        match state.last_success {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                let cooldown = self.inner.config.cooldown();
                if elapsed < cooldown {
                    GateStatus::Cooldown {
                        remaining: cooldown - elapsed,
                    }
                } else {
                    GateStatus::Idle
                }
            }
            None => GateStatus::Idle,
        }
    }

    /// Issues the request if the gate is idle and waits for the result.
    pub async fn request_feedback(&self, request: &FeedbackRequest) -> FeedbackOutcome {
        match self.admit() {
            Some(reservation) => run_call(reservation, request.prompt()).await,
            None => self.throttled(request),
        }
    }

    /// Non-blocking variant of [`Self::request_feedback`]: the call runs on the
    /// current tokio runtime and the returned ticket is polled for the result.
    /// Dropping the ticket cancels the call.
    pub fn dispatch(&self, request: &FeedbackRequest) -> FeedbackTicket {
        let Some(reservation) = self.admit() else {
            return FeedbackTicket::ready(self.throttled(request));
        };
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(error = %err, "feedback: no tokio runtime to run advice request");
                return FeedbackTicket::ready(self.inner.failed());
            }
        };

        let reservation_id = reservation.id;
        let prompt = request.prompt();
        let (tx, rx) = oneshot::channel();
        let task = runtime.spawn(async move {
            let outcome = run_call(reservation, prompt).await;
            let _ = tx.send(outcome);
        });

        FeedbackTicket {
            state: TicketState::Pending(PendingCall {
                rx,
                task,
                gate: Arc::clone(&self.inner),
                reservation_id,
            }),
        }
    }

    fn admit(&self) -> Option<Reservation> {
        let now = Instant::now();
        let mut state = self.inner.lock_state();
        if state.in_flight.is_some() {
            return None;
        }
        if let Some(last) = state.last_success {
            if now.saturating_duration_since(last) < self.inner.config.cooldown() {
                return None;
            }
        }
        let id = state.next_reservation;
        state.next_reservation = state.next_reservation.wrapping_add(1);
        state.in_flight = Some(id);
        drop(state);

        Some(Reservation {
            gate: Arc::clone(&self.inner),
            id,
            issued_at: now,
            committed: false,
        })
    }

    fn throttled(&self, request: &FeedbackRequest) -> FeedbackOutcome {
        tracing::debug!(
            stable_label = request.stable_label.as_str(),
            target_label = request.target_label.as_str(),
            "feedback: throttled by cooldown"
        );
        FeedbackOutcome::Throttled(self.inner.config.throttled_message.clone())
    }
}

impl std::fmt::Debug for FeedbackGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackGate")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .finish()
    }
}

impl GateInner {
    fn lock_state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failed(&self) -> FeedbackOutcome {
        FeedbackOutcome::Failed(self.config.failure_message.clone())
    }

    fn commit(&self, id: u64, issued_at: Instant) {
        let mut state = self.lock_state();
        if state.in_flight == Some(id) {
            state.in_flight = None;
            state.last_success = Some(issued_at);
        }
    }

    fn release(&self, id: u64) {
        let mut state = self.lock_state();
        if state.in_flight == Some(id) {
            state.in_flight = None;
        }
    }
}

/// Holds the gate's in-flight slot. Released on drop unless committed, so a
/// cancelled or failed call never counts against the cooldown.
struct Reservation {
    gate: Arc<GateInner>,
    id: u64,
    issued_at: Instant,
    committed: bool,
}

impl Reservation {
    fn commit(mut self) {
        self.gate.commit(self.id, self.issued_at);
        self.committed = true;
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.committed {
            self.gate.release(self.id);
        }
    }
}

async fn run_call(reservation: Reservation, prompt: AdvicePrompt) -> FeedbackOutcome {
    let gate = Arc::clone(&reservation.gate);
    let timeout = gate.config.request_timeout();
    let target = prompt.request.target_label.clone();
    let call = gate.provider.advise(prompt);

    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(text)) => {
            reservation.commit();
            tracing::debug!(target_label = target.as_str(), "feedback: advice received");
            FeedbackOutcome::Ok(text)
        }
        Ok(Err(err)) => {
            drop(reservation);
            tracing::warn!(
                error = %err,
                target_label = target.as_str(),
                "feedback: advice request failed"
            );
            gate.failed()
        }
        Err(_) => {
            drop(reservation);
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                target_label = target.as_str(),
                "feedback: advice request timed out"
            );
            gate.failed()
        }
    }
}

/// Handle to a feedback request. `Pending` until the advice call settles.
pub struct FeedbackTicket {
    state: TicketState,
}

enum TicketState {
    Ready(FeedbackOutcome),
    Pending(PendingCall),
}

struct PendingCall {
    rx: oneshot::Receiver<FeedbackOutcome>,
    task: JoinHandle<()>,
    gate: Arc<GateInner>,
    reservation_id: u64,
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.task.abort();
        self.gate.release(self.reservation_id);
    }
}

impl FeedbackTicket {
    fn ready(outcome: FeedbackOutcome) -> Self {
        Self {
            state: TicketState::Ready(outcome),
        }
    }

    pub fn poll(&mut self) -> FeedbackPoll {
        let settled = match &mut self.state {
            TicketState::Ready(outcome) => return FeedbackPoll::Ready(outcome.clone()),
            TicketState::Pending(call) => match call.rx.try_recv() {
                Ok(outcome) => outcome,
                Err(oneshot::error::TryRecvError::Empty) => return FeedbackPoll::Pending,
                Err(oneshot::error::TryRecvError::Closed) => call.gate.failed(),
            },
        };
        self.state = TicketState::Ready(settled.clone());
        FeedbackPoll::Ready(settled)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, TicketState::Pending(_))
    }

    /// Waits for the call to settle.
    pub async fn wait(mut self) -> FeedbackOutcome {
        match &mut self.state {
            TicketState::Ready(outcome) => outcome.clone(),
            TicketState::Pending(call) => match (&mut call.rx).await {
                Ok(outcome) => outcome,
                Err(_) => call.gate.failed(),
            },
        }
    }
}

impl std::fmt::Debug for FeedbackTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            TicketState::Ready(outcome) => {
                f.debug_tuple("FeedbackTicket::Ready").field(outcome).finish()
            }
            TicketState::Pending(call) => f
                .debug_struct("FeedbackTicket::Pending")
                .field("reservation_id", &call.reservation_id)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::AdviceError;
    use crate::pipeline::traits::AdviceFuture;

    #[derive(Clone, Copy)]
    enum Behaviour {
        Reply,
        Fail,
        Stall(Duration),
    }

    struct ScriptedProvider {
        calls: Arc<AtomicUsize>,
        script: Mutex<Vec<Behaviour>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Behaviour>) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let provider = Arc::new(Self {
                calls: Arc::clone(&calls),
                script: Mutex::new(script.into_iter().rev().collect()),
            });
            (provider, calls)
        }
    }

    impl AdviceProvider for ScriptedProvider {
        fn advise(&self, prompt: AdvicePrompt) -> AdviceFuture {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let behaviour = self
                .script
                .lock()
                .expect("script lock")
                .pop()
                .unwrap_or(Behaviour::Reply);
            let target = prompt.request.target_label;
            Box::pin(async move {
                match behaviour {
                    Behaviour::Reply => Ok(format!("tip for {target}")),
                    Behaviour::Fail => Err(AdviceError::provider("quota exceeded")),
                    Behaviour::Stall(d) => {
                        tokio::time::sleep(d).await;
                        Ok(format!("late tip for {target}"))
                    }
                }
            })
        }
    }

    fn request() -> FeedbackRequest {
        FeedbackRequest {
            raw_label: "R".to_string(),
            stable_label: "R".to_string(),
            confidence_pct: 64,
            second_label: Some("U".to_string()),
            target_label: "U".to_string(),
        }
    }

    fn gate(script: Vec<Behaviour>) -> (FeedbackGate, Arc<AtomicUsize>) {
        let (provider, calls) = ScriptedProvider::new(script);
        (FeedbackGate::new(provider, FeedbackConfig::default()), calls)
    }

    #[tokio::test(start_paused = true)]
    async fn second_request_inside_cooldown_is_throttled() {
        let (gate, calls) = gate(vec![]);
        let first = gate.request_feedback(&request()).await;
        assert_eq!(first, FeedbackOutcome::Ok("tip for U".to_string()));

        tokio::time::advance(Duration::from_secs(2)).await;
        let second = gate.request_feedback(&request()).await;
        assert_eq!(
            second,
            FeedbackOutcome::Throttled(FeedbackConfig::default().throttled_message)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(gate.status(), GateStatus::Cooldown { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn requests_past_cooldown_both_call_out() {
        let (gate, calls) = gate(vec![]);
        assert!(gate.request_feedback(&request()).await.is_ok());
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(gate.status(), GateStatus::Idle);
        assert!(gate.request_feedback(&request()).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_does_not_start_cooldown() {
        let (gate, calls) = gate(vec![Behaviour::Fail]);
        let failed = gate.request_feedback(&request()).await;
        assert_eq!(
            failed,
            FeedbackOutcome::Failed(FeedbackConfig::default().failure_message)
        );
        assert_eq!(gate.status(), GateStatus::Idle);

        let retry = gate.request_feedback(&request()).await;
        assert!(retry.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_after_expired_cooldown_allows_immediate_retry() {
        let (gate, calls) = gate(vec![Behaviour::Reply, Behaviour::Fail]);
        assert!(gate.request_feedback(&request()).await.is_ok());
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(matches!(
            gate.request_feedback(&request()).await,
            FeedbackOutcome::Failed(_)
        ));
        assert!(gate.request_feedback(&request()).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported_as_failure() {
        let (gate, _) = gate(vec![Behaviour::Stall(Duration::from_secs(60))]);
        let outcome = gate.request_feedback(&request()).await;
        assert!(matches!(outcome, FeedbackOutcome::Failed(_)));
        assert_eq!(gate.status(), GateStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_request_blocks_a_concurrent_one() {
        let (gate, calls) = gate(vec![Behaviour::Stall(Duration::from_secs(3))]);
        let mut ticket = gate.dispatch(&request());
        assert_eq!(ticket.poll(), FeedbackPoll::Pending);
        assert_eq!(gate.status(), GateStatus::InFlight);

        let concurrent = gate.request_feedback(&request()).await;
        assert!(matches!(concurrent, FeedbackOutcome::Throttled(_)));

        let outcome = ticket.wait().await;
        assert_eq!(outcome, FeedbackOutcome::Ok("late tip for U".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(gate.status(), GateStatus::Cooldown { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_a_ticket_cancels_without_cooldown() {
        let (gate, calls) = gate(vec![Behaviour::Stall(Duration::from_secs(3))]);
        let ticket = gate.dispatch(&request());
        drop(ticket);
        assert_eq!(gate.status(), GateStatus::Idle);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(gate.status(), GateStatus::Idle);
        // The aborted call never reached the provider.
        assert!(gate.request_feedback(&request()).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_dispatch_is_ready_immediately() {
        let (gate, _) = gate(vec![]);
        assert!(gate.request_feedback(&request()).await.is_ok());
        let mut ticket = gate.dispatch(&request());
        assert!(!ticket.is_pending());
        assert!(matches!(
            ticket.poll(),
            FeedbackPoll::Ready(FeedbackOutcome::Throttled(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_one_cooldown() {
        let (gate, calls) = gate(vec![]);
        let other = gate.clone();
        assert!(gate.request_feedback(&request()).await.is_ok());
        assert!(matches!(
            other.request_feedback(&request()).await,
            FeedbackOutcome::Throttled(_)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatch_without_runtime_fails_softly() {
        let (gate, calls) = gate(vec![]);
        let mut ticket = gate.dispatch(&request());
        assert!(matches!(
            ticket.poll(),
            FeedbackPoll::Ready(FeedbackOutcome::Failed(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(gate.status(), GateStatus::Idle);
    }
}
