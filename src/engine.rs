//! Engine - drives one stream session from a provider
//!
//! The engine owns the session, the pacing interval and the subscription to
//! the provider's event stream. Callers (the TUI loop or the headless runner)
//! await [`Engine::step`] and redraw from [`Engine::snapshot`].

use crate::config::RenderConfig;
use crate::event::StreamEvent;
use crate::logging;
use crate::provider::{EventStream, Provider};
use crate::stream::{Phase, RenderScheduler, SessionSnapshot, StreamSession, TickReport};
use anyhow::Result;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

/// Scoped handle on a provider event stream.
///
/// A forwarding task pulls events into a channel owned by this handle.
/// Dropping the handle aborts the task, so events from a superseded request
/// never reach the next session.
pub struct Subscription {
    task: JoinHandle<()>,
    rx: mpsc::Receiver<Result<StreamEvent>>,
}

impl Subscription {
    fn spawn(mut stream: EventStream) -> Self {
        let (tx, rx) = mpsc::channel(256);
        let task = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });
        Self { task, rx }
    }

    /// Next event, or None once the provider stream is exhausted
    async fn recv(&mut self) -> Option<Result<StreamEvent>> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// What a call to [`Engine::step`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Pacing tick moved buffered text into the token stores
    Ticked(TickReport),
    /// A fragment was accepted (`changed` if the phase moved)
    Fragment { changed: bool },
    /// The session reached a terminal phase
    Finished(Phase),
}

enum Wake {
    Tick,
    Event(Option<Result<StreamEvent>>),
}

pub struct Engine {
    provider: Arc<dyn Provider>,
    session: StreamSession,
    scheduler: RenderScheduler,
    subscription: Option<Subscription>,
    pacing: Option<Interval>,
}

impl Engine {
    pub fn new(provider: Arc<dyn Provider>, render: &RenderConfig) -> Self {
        Self::with_parts(
            provider,
            StreamSession::from_config(render),
            RenderScheduler::from_config(render),
        )
    }

    pub fn with_parts(
        provider: Arc<dyn Provider>,
        session: StreamSession,
        scheduler: RenderScheduler,
    ) -> Self {
        logging::set_provider(provider.name());
        Self {
            provider,
            session,
            scheduler,
            subscription: None,
            pacing: None,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn session(&self) -> &StreamSession {
        &self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    /// Submit a prompt and start streaming.
    ///
    /// Fails only if a request is already in flight. A provider that rejects
    /// the request ends the session in `Phase::Error` with the reason as
    /// answer text.
    pub async fn submit(&mut self, prompt: &str) -> Result<()> {
        self.session.submit(prompt)?;
        self.stop_streaming();

        match self.provider.complete(prompt).await {
            Ok(stream) => {
                self.subscription = Some(Subscription::spawn(stream));
                let mut pacing = tokio::time::interval(self.scheduler.interval());
                pacing.set_missed_tick_behavior(MissedTickBehavior::Skip);
                self.pacing = Some(pacing);
            }
            Err(e) => {
                self.session.fail(&format!("{:#}", e));
            }
        }
        Ok(())
    }

    /// Cancel the request in flight. Returns false if there was nothing to cancel.
    pub async fn cancel(&mut self) -> bool {
        self.stop_streaming();
        if !self.session.cancel() {
            return false;
        }
        if let Err(e) = self.provider.cancel().await {
            logging::warn(&format!("Provider cancel failed: {:#}", e));
        }
        true
    }

    /// Wait for the next tick or provider event and apply it.
    ///
    /// Returns None when no request is in flight. Cancel-safe: if the future
    /// is dropped before completing, no tick or event is lost.
    pub async fn step(&mut self) -> Option<Step> {
        if !self.session.is_active() {
            return None;
        }
        let (Some(subscription), Some(pacing)) =
            (self.subscription.as_mut(), self.pacing.as_mut())
        else {
            return None;
        };

        let wake = tokio::select! {
            _ = pacing.tick() => Wake::Tick,
            item = subscription.recv() => Wake::Event(item),
        };
        Some(self.apply(wake))
    }

    /// Step until the session ends and return the final phase.
    pub async fn run_to_end(&mut self) -> Phase {
        while let Some(step) = self.step().await {
            if let Step::Finished(phase) = step {
                return phase;
            }
        }
        self.session.phase()
    }

    fn apply(&mut self, wake: Wake) -> Step {
        match wake {
            Wake::Tick => Step::Ticked(self.scheduler.tick(&mut self.session)),
            Wake::Event(Some(Ok(event))) => {
                let changed = self.session.apply(&event);
                if event.is_terminal() || !self.session.is_active() {
                    self.finish()
                } else {
                    Step::Fragment { changed }
                }
            }
            Wake::Event(Some(Err(e))) => {
                self.session.fail(&format!("{:#}", e));
                self.finish()
            }
            Wake::Event(None) => {
                logging::warn("Provider stream ended without a completion event");
                self.session.complete();
                self.finish()
            }
        }
    }

    fn finish(&mut self) -> Step {
        self.stop_streaming();
        Step::Finished(self.session.phase())
    }

    fn stop_streaming(&mut self) {
        self.pacing = None;
        self.subscription = None;
    }
}
