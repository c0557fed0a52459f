use crate::api::Notifier;
use crate::models::Sticker;
use std::future::Future;
use std::process::ExitCode;

/// How a supervised task ended
#[derive(Debug)]
pub enum Termination<T> {
    Finished(T),
    Interrupted,
    Failed(anyhow::Error),
}

impl<T> Termination<T> {
    pub fn exit_code(&self) -> u8 {
        match self {
            Termination::Finished(_) => 0,
            Termination::Interrupted => 130,
            Termination::Failed(_) => 1,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Termination::Finished(_))
    }
}

impl<T> From<&Termination<T>> for ExitCode {
    fn from(termination: &Termination<T>) -> Self {
        ExitCode::from(termination.exit_code())
    }
}

/// Run `task` until it completes or `interrupt` resolves
///
/// Errors and interrupts are reported through `notifier` before returning.
/// The task future is dropped on interrupt, so any in-flight poll is abandoned.
pub async fn supervise<N, T, F, S>(
    notifier: &N,
    label: &str,
    task: F,
    interrupt: S,
) -> Termination<T>
where
    N: Notifier + ?Sized,
    F: Future<Output = anyhow::Result<T>>,
    S: Future<Output = ()>,
{
    tokio::select! {
        result = task => match result {
            Ok(value) => {
                tracing::info!("{} finished", label);
                Termination::Finished(value)
            }
            Err(e) => {
                tracing::error!("{} failed: {:#}", label, e);
                let message = format!("{} stopped on error: {:#}", label, e);
                notifier.notify(&message, Some(Sticker::SYSTEM_ERROR)).await;
                Termination::Failed(e)
            }
        },
        _ = interrupt => {
            tracing::warn!("{} interrupted", label);
            let message = format!("{} interrupted by user", label);
            notifier.notify(&message, Some(Sticker::INTERRUPTED)).await;
            Termination::Interrupted
        }
    }
}
