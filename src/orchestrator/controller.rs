//! Action lifecycle controller.
//!
//! Owns request execution for the TUI and emits events for the presentation
//! layer, which folds them into its `SessionState`.

use super::actions::execute;
use super::navigator::Navigator;
use crate::api::EngineClient;
use crate::session::{Action, ActionTicket, Outcome};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::Duration;

/// How long quit waits for an in-flight request before abandoning it.
const QUIT_GRACE: Duration = Duration::from_secs(3);

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Run(Action),
    Quit,
}

/// Events sent back to the UI layer.
#[derive(Debug, Clone)]
pub(crate) enum SessionEvent {
    Outcome {
        ticket: ActionTicket,
        outcome: Outcome,
    },
    /// The action's task is over; release its busy slot.
    Finished { ticket: ActionTicket },
}

/// Internal handle for a running action task.
struct Running {
    ticket: ActionTicket,
    handle: Option<tokio::task::JoinHandle<()>>,
}

fn spawn_action<N: Navigator + 'static>(
    client: &EngineClient,
    navigator: &Arc<N>,
    action: Action,
    event_tx: &UnboundedSender<SessionEvent>,
) -> Running {
    let ticket = action.ticket;
    let client = client.clone();
    let navigator = navigator.clone();
    let tx = event_tx.clone();
    tracing::info!(kind = ?ticket.kind, generation = ticket.generation, "action started");
    let handle = tokio::spawn(async move {
        execute(&client, navigator.as_ref(), &action.request, move |outcome| {
            let _ = tx.send(SessionEvent::Outcome { ticket, outcome });
        })
        .await;
    });
    Running {
        ticket,
        handle: Some(handle),
    }
}

/// Wait for the task in `slot`, or forever if there is none.
async fn join(slot: &mut Option<Running>) -> (ActionTicket, Result<(), tokio::task::JoinError>) {
    if let Some(r) = slot {
        if let Some(h) = r.handle.as_mut() {
            return (r.ticket, h.await);
        }
    }
    futures::future::pending().await
}

/// Report a finished task. A panicked task is surfaced as a failure so the busy slot is still released.
fn report_done(
    event_tx: &UnboundedSender<SessionEvent>,
    ticket: ActionTicket,
    res: Result<(), tokio::task::JoinError>,
) {
    if let Err(e) = res {
        tracing::warn!(kind = ?ticket.kind, error = %e, "action task failed");
        let _ = event_tx.send(SessionEvent::Outcome {
            ticket,
            outcome: Outcome::Failed(format!("{:?} task failed: {e}", ticket.kind)),
        });
    }
    tracing::info!(kind = ?ticket.kind, generation = ticket.generation, "action finished");
    let _ = event_tx.send(SessionEvent::Finished { ticket });
}

/// Run actions requested by the UI, at most one user action at a time.
///
/// The startup health check runs in its own slot so user actions are never
/// blocked behind it. In-flight requests are never cancelled; on quit the
/// controller waits briefly for them and then abandons their results.
pub(crate) async fn run_controller<N: Navigator + 'static>(
    client: EngineClient,
    navigator: Arc<N>,
    event_tx: UnboundedSender<SessionEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut active: Option<Running> = None;
    let mut startup: Option<Running> = None;
    let mut quit_deadline: Option<tokio::time::Instant> = None;
    let mut watchdog = tokio::time::interval(Duration::from_millis(250));

    loop {
        if quit_deadline.is_some() && active.is_none() && startup.is_none() {
            return Ok(());
        }

        tokio::select! {
            cmd = cmd_rx.recv(), if quit_deadline.is_none() => {
                match cmd {
                    Some(UiCommand::Run(action)) => {
                        if !action.ticket.kind.holds_busy() {
                            // A superseded startup keeps running detached; its result is stale anyway.
                            startup = Some(spawn_action(&client, &navigator, action, &event_tx));
                        } else if let Some(r) = &active {
                            // The UI gates actions on its busy flag; this only triggers if that was bypassed.
                            tracing::warn!(running = ?r.ticket.kind, requested = ?action.ticket.kind, "rejecting overlapping action");
                            let ticket = action.ticket;
                            let _ = event_tx.send(SessionEvent::Outcome {
                                ticket,
                                outcome: Outcome::Failed(format!("{:?} is still in progress", r.ticket.kind)),
                            });
                            let _ = event_tx.send(SessionEvent::Finished { ticket });
                        } else {
                            active = Some(spawn_action(&client, &navigator, action, &event_tx));
                        }
                    }
                    Some(UiCommand::Quit) | None => {
                        if let Some(r) = &active {
                            tracing::info!(kind = ?r.ticket.kind, "waiting for in-flight action before exit");
                        }
                        quit_deadline = Some(tokio::time::Instant::now() + QUIT_GRACE);
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it can be dropped
            // if another select branch is chosen, and we'll never observe completion.
            (ticket, res) = join(&mut active) => {
                active = None;
                report_done(&event_tx, ticket, res);
            }
            (ticket, res) = join(&mut startup) => {
                startup = None;
                report_done(&event_tx, ticket, res);
            }
            _ = watchdog.tick() => {
                if let Some(deadline) = quit_deadline {
                    if tokio::time::Instant::now() >= deadline {
                        tracing::warn!("abandoning in-flight request on quit");
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClientConfig, Mode};
    use crate::orchestrator::actions::tests::RecordingNavigator;
    use crate::session::{ActionKind, SessionState};
    use serde_json::json;
    use tokio::sync::mpsc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Apply events until `ticket` is finished.
    async fn drain_until_finished(
        state: &mut SessionState,
        rx: &mut UnboundedReceiver<SessionEvent>,
        ticket: ActionTicket,
    ) {
        while let Some(ev) = rx.recv().await {
            match ev {
                SessionEvent::Outcome { ticket: t, outcome } => {
                    state.apply(&t, outcome);
                }
                SessionEvent::Finished { ticket: t } => {
                    state.finish(&t);
                    if t == ticket {
                        return;
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn startup_and_convert_flow_through_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "brand": "Acme"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/engine/convert"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "abc123"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/engine/artifacts/abc123"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "abc123", "structured_output": {"foo": 1}})),
            )
            .mount(&server)
            .await;

        let client = EngineClient::new(&ClientConfig::new(server.uri(), None)).unwrap();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let ctrl = tokio::spawn(run_controller(
            client,
            Arc::new(RecordingNavigator::default()),
            event_tx,
            cmd_rx,
        ));

        let mut state = SessionState::new(Mode::Plan);
        let health = state.begin(ActionKind::Startup).unwrap();
        cmd_tx.send(UiCommand::Run(health.clone())).unwrap();
        drain_until_finished(&mut state, &mut event_rx, health.ticket).await;
        assert_eq!(state.connection.label(), "OK (Acme)");

        state.raw_input = "hello".into();
        let convert = state.begin(ActionKind::Convert).unwrap();
        assert!(state.busy);
        cmd_tx.send(UiCommand::Run(convert.clone())).unwrap();
        drain_until_finished(&mut state, &mut event_rx, convert.ticket).await;

        assert!(!state.busy);
        assert_eq!(state.artifact_id, "abc123");
        assert_eq!(state.artifact.as_ref().unwrap().id, "abc123");

        cmd_tx.send(UiCommand::Quit).unwrap();
        ctrl.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn overlapping_user_action_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/engine/artifacts/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "slow", "structured_output": {}}))
                    .set_delay(std::time::Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let client = EngineClient::new(&ClientConfig::new(server.uri(), None)).unwrap();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let ctrl = tokio::spawn(run_controller(
            client,
            Arc::new(RecordingNavigator::default()),
            event_tx,
            cmd_rx,
        ));

        // Two independent sessions bypassing each other's busy flag.
        let mut a = SessionState::default();
        a.artifact_id = "slow".into();
        let first = a.begin(ActionKind::Load).unwrap();
        let mut b = SessionState::default();
        b.artifact_id = "slow".into();
        let second = b.begin(ActionKind::Load).unwrap();

        cmd_tx.send(UiCommand::Run(first)).unwrap();
        cmd_tx.send(UiCommand::Run(second.clone())).unwrap();

        let mut rejected = None;
        let mut fetched = false;
        let mut finished = 0;
        while finished < 2 {
            match event_rx.recv().await {
                Some(SessionEvent::Outcome {
                    outcome: Outcome::Failed(msg),
                    ..
                }) => rejected = Some(msg),
                Some(SessionEvent::Outcome {
                    outcome: Outcome::ArtifactFetched(_),
                    ..
                }) => fetched = true,
                Some(SessionEvent::Finished { .. }) => finished += 1,
                Some(_) => {}
                None => break,
            }
        }
        assert!(fetched);
        assert_eq!(rejected.as_deref(), Some("Load is still in progress"));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);

        cmd_tx.send(UiCommand::Quit).unwrap();
        ctrl.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn quit_waits_for_in_flight_action() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/engine/artifacts/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "slow", "structured_output": {}}))
                    .set_delay(std::time::Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let client = EngineClient::new(&ClientConfig::new(server.uri(), None)).unwrap();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let mut state = SessionState::default();
        state.artifact_id = "slow".into();
        let load = state.begin(ActionKind::Load).unwrap();
        cmd_tx.send(UiCommand::Run(load.clone())).unwrap();
        cmd_tx.send(UiCommand::Quit).unwrap();

        run_controller(
            client,
            Arc::new(RecordingNavigator::default()),
            event_tx,
            cmd_rx,
        )
        .await
        .unwrap();

        // The controller has returned; only the action's own events were sent.
        let mut events = Vec::new();
        while let Some(ev) = event_rx.recv().await {
            events.push(ev);
        }
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            SessionEvent::Outcome { outcome: Outcome::ArtifactFetched(a), .. } if a.id == "slow"
        ));
        assert!(matches!(&events[1], SessionEvent::Finished { ticket } if *ticket == load.ticket));
    }

    #[tokio::test]
    async fn quit_with_nothing_running_returns_immediately() {
        let client = EngineClient::new(&ClientConfig::new("http://127.0.0.1:9", None)).unwrap();
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        cmd_tx.send(UiCommand::Quit).unwrap();
        run_controller(
            client,
            Arc::new(RecordingNavigator::default()),
            event_tx,
            cmd_rx,
        )
        .await
        .unwrap();
    }
}
