use futures::FutureExt;
use std::any::Any;
use std::fmt::{self, Debug, Display, Formatter};
use std::panic::AssertUnwindSafe;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActorError {
    #[error("actor logic encountered an error: {0}")]
    LogicError(String),
    #[error("actor lost its mailbox")]
    MailboxClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorStatus {
    Starting,
    Running,
    ExitedGracefully,
    ExitedWithError,
    Panicked,
}

impl Display for ActorStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActorStatus::Starting => "starting",
            ActorStatus::Running => "running",
            ActorStatus::ExitedGracefully => "exited_gracefully",
            ActorStatus::ExitedWithError => "exited_with_error",
            ActorStatus::Panicked => "panicked",
        })
    }
}

/// A long-lived task that owns its state and is driven to completion by [`run`].
pub trait Actor: Send + Sized {
    type ID: Display + Debug + Clone + Send + Sync + 'static;

    fn kind(&self) -> &'static str;
    fn id(&self) -> Self::ID;

    /// The main loop. Returning ends the actor.
    fn run(&mut self) -> impl Future<Output = Result<(), ActorError>> + Send;
}

pub async fn run<A>(actor: A) -> ActorStatus
where
    A: Actor + 'static,
{
    let actor_kind = actor.kind();
    let actor_id = actor.id();

    run_instrumented(actor, actor_kind, actor_id).await
}

#[tracing::instrument(
    name = "actor_run",
    skip_all,
    fields(
        actor.kind = %actor_kind,
        actor.id = %actor_id,
        status = tracing::field::Empty,
    )
)]
async fn run_instrumented<A>(mut actor: A, actor_kind: &'static str, actor_id: A::ID) -> ActorStatus
where
    A: Actor + 'static,
{
    let span = tracing::Span::current();
    span.record("status", tracing::field::display(ActorStatus::Starting));
    tracing::debug!("starting actor");

    span.record("status", tracing::field::display(ActorStatus::Running));
    let status = match AssertUnwindSafe(actor.run()).catch_unwind().await {
        Ok(Ok(())) => ActorStatus::ExitedGracefully,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "actor exited with an error");
            ActorStatus::ExitedWithError
        }
        Err(payload) => {
            let panic_msg = extract_panic_message(&payload);
            tracing::error!(panic.message = %panic_msg, "actor panicked");
            ActorStatus::Panicked
        }
    };

    span.record("status", tracing::field::display(status));
    tracing::info!(%status, "actor shut down");
    status
}

fn extract_panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        format!("{:?}", payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Countdown {
        left: u32,
        fail: bool,
    }

    impl Actor for Countdown {
        type ID = &'static str;

        fn kind(&self) -> &'static str {
            "countdown"
        }

        fn id(&self) -> Self::ID {
            "test"
        }

        async fn run(&mut self) -> Result<(), ActorError> {
            while self.left > 0 {
                self.left -= 1;
                tokio::task::yield_now().await;
            }
            if self.fail {
                return Err(ActorError::LogicError("boom".to_string()));
            }
            Ok(())
        }
    }

    struct Panicky;

    impl Actor for Panicky {
        type ID = u8;

        fn kind(&self) -> &'static str {
            "panicky"
        }

        fn id(&self) -> Self::ID {
            0
        }

        async fn run(&mut self) -> Result<(), ActorError> {
            panic!("bad state");
        }
    }

    #[tokio::test]
    async fn reports_final_status() {
        let ok = run(Countdown { left: 3, fail: false }).await;
        assert_eq!(ok, ActorStatus::ExitedGracefully);

        let err = run(Countdown { left: 1, fail: true }).await;
        assert_eq!(err, ActorStatus::ExitedWithError);
    }

    #[tokio::test]
    async fn panics_are_caught() {
        assert_eq!(run(Panicky).await, ActorStatus::Panicked);
    }
}
