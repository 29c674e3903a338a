//! At-most-once guard for cooperatively scheduled tasks.
//!
//! The guard's [`Transition`] is owned by a single actor task. Callers
//! never touch the state directly: they send `Begin` and `Complete`
//! messages and the actor applies them one at a time. No lock is taken
//! and no thread ever blocks; a caller whose block is suspended holds
//! nothing but its admission.
//!
//! The actor publishes every transition to an atomic snapshot. Skipped
//! callers read that snapshot and return without a round trip, and
//! [`Guard::state`] stays synchronous.

use crate::select::Variant;
use crate::state::{Admission, Guard, GuardState, Transition};
use std::borrow::Cow;
use std::convert::Infallible;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{mpsc, oneshot};

enum Command {
    Begin {
        reply: oneshot::Sender<Admission>,
    },
    Complete {
        ack: Option<oneshot::Sender<()>>,
    },
}

pub(crate) struct Mailbox {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: Arc<AtomicU8>,
}

pub struct CooperativeGuard {
    mailbox: OnceLock<Mailbox>,
    label: Cow<'static, str>,
}

impl CooperativeGuard {
    /// Create an unlabeled guard. Usable in `static` items; the actor is
    /// spawned on first use.
    pub const fn new() -> Self {
        Self::labeled("anonymous")
    }

    pub const fn labeled(label: &'static str) -> Self {
        Self {
            mailbox: OnceLock::new(),
            label: Cow::Borrowed(label),
        }
    }

    pub fn with_label(label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            mailbox: OnceLock::new(),
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Await `block` if this is the first call ever made on the guard.
    ///
    /// Returns `Some` on the one call that awaited `block`, `None` on every
    /// other call. A call made while the execution is suspended inside
    /// `block` (from another task or re-entrantly) is skipped, not parked.
    ///
    /// # Panics
    ///
    /// The first call on a guard spawns its actor and must therefore be
    /// polled inside a Tokio runtime.
    pub async fn run<T, Fut>(&self, block: Fut) -> Option<T>
    where
        Fut: Future<Output = T>,
    {
        match self
            .try_run(async move { Ok::<T, Infallible>(block.await) })
            .await
        {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible form of [`run`](Self::run).
    ///
    /// The guard reaches `Completed` before an error from `block` is handed
    /// back to this caller. Skipped calls never return an error.
    pub async fn try_run<T, E, Fut>(&self, block: Fut) -> Result<Option<T>, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let mailbox = self.mailbox();

        // 1. Transitions never revert, so a published non-idle state is final
        let published = GuardState::from_u8(mailbox.snapshot.load(Ordering::Acquire));
        if published != GuardState::Idle {
            tracing::trace!(guard = %self.label, state = %published, "guarded block skipped");
            return Ok(None);
        }

        // 2. Ask the owner for admission. A grant that arrives after this
        //    future is dropped is handed back by `PendingAdmission`
        let (reply, admission) = oneshot::channel();
        if mailbox.commands.send(Command::Begin { reply }).is_err() {
            self.abandon(mailbox);
            return Ok(None);
        }
        let mut pending = PendingAdmission {
            admission,
            commands: &mailbox.commands,
            settled: false,
        };
        let received = (&mut pending.admission).await;
        pending.settled = true;
        match received {
            Ok(Admission::Granted) => {}
            Ok(Admission::Skipped(state)) => {
                tracing::trace!(guard = %self.label, %state, "guarded block skipped");
                return Ok(None);
            }
            Err(_) => {
                self.abandon(mailbox);
                return Ok(None);
            }
        }

        // 3. Await the block; completion is sent even if this future is
        //    dropped or the block panics
        tracing::debug!(guard = %self.label, "guarded block started");
        let completion = Completion {
            commands: &mailbox.commands,
            armed: true,
        };
        let outcome = block.await;
        completion.finish().await;
        tracing::debug!(guard = %self.label, "guarded block completed");

        outcome.map(Some)
    }

    /// The actor is gone with its runtime; nobody can be admitted any more.
    fn abandon(&self, mailbox: &Mailbox) {
        tracing::warn!(guard = %self.label, "guard actor is gone, treating guard as spent");
        mailbox
            .snapshot
            .store(GuardState::Completed.as_u8(), Ordering::Release);
    }

    pub(crate) fn mailbox(&self) -> &Mailbox {
        self.mailbox.get_or_init(|| {
            let (commands, inbox) = mpsc::unbounded_channel();
            let snapshot = Arc::new(AtomicU8::new(GuardState::Idle.as_u8()));
            tokio::spawn(serve(inbox, Arc::clone(&snapshot)));
            Mailbox { commands, snapshot }
        })
    }
}

impl Default for CooperativeGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Guard for CooperativeGuard {
    fn state(&self) -> GuardState {
        self.mailbox
            .get()
            .map(|mailbox| GuardState::from_u8(mailbox.snapshot.load(Ordering::Acquire)))
            .unwrap_or(GuardState::Idle)
    }

    fn variant(&self) -> Variant {
        Variant::Cooperative
    }
}

impl std::fmt::Debug for CooperativeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CooperativeGuard")
            .field("label", &self.label)
            .field("state", &self.state())
            .finish()
    }
}

/// The owning actor. Runs until every sender (the guard) is dropped.
async fn serve(mut inbox: mpsc::UnboundedReceiver<Command>, snapshot: Arc<AtomicU8>) {
    let mut machine = Transition::new();

    while let Some(command) = inbox.recv().await {
        match command {
            Command::Begin { reply } => {
                let admission = machine.begin();
                publish(&snapshot, &machine);
                // A granted caller that vanished before hearing back never
                // started the block; it still consumed the guard.
                if reply.send(admission).is_err() && admission == Admission::Granted {
                    machine.complete();
                    publish(&snapshot, &machine);
                }
            }
            Command::Complete { ack } => {
                machine.complete();
                publish(&snapshot, &machine);
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
            }
        }
    }
}

fn publish(snapshot: &AtomicU8, machine: &Transition) {
    snapshot.store(machine.state().as_u8(), Ordering::Release);
}

/// Sends `Complete` to the actor exactly once: acknowledged through
/// [`finish`](Self::finish) on the normal path, fire-and-forget on drop.
struct Completion<'a> {
    commands: &'a mpsc::UnboundedSender<Command>,
    armed: bool,
}

impl Completion<'_> {
    async fn finish(mut self) {
        self.armed = false;
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Complete { ack: Some(ack) }).is_ok() {
            let _ = done.await;
        }
    }
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.commands.send(Command::Complete { ack: None });
        }
    }
}

/// Reply slot of a `Begin` that is still in flight. If the caller goes away
/// before reading it, a grant already sent by the actor is returned as a
/// completion so the guard cannot stay `Running`.
struct PendingAdmission<'a> {
    admission: oneshot::Receiver<Admission>,
    commands: &'a mpsc::UnboundedSender<Command>,
    settled: bool,
}

impl Drop for PendingAdmission<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        // After close a late send fails and the actor completes the guard
        // itself; a send that beat it is still readable here
        self.admission.close();
        if let Ok(Admission::Granted) = self.admission.try_recv() {
            tracing::debug!("admission dropped after grant, completing guard");
            let _ = self.commands.send(Command::Complete { ack: None });
        }
    }
}
