//! Demo computation - 지정한 결과로 끝나는 계산을 observer로 감시

use clap::ValueEnum;
use std::time::Duration;
use task_notify_foundation::{Attribute, Error, NotifyConfig};
use task_notify_task::{
    CancellationToken, ChangeEvent, ObserverSnapshot, TaskHandle, TaskObserver,
};
use tracing::debug;

/// How the demo computation ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Outcome {
    /// Resolve with the configured value
    Success,
    /// Canceled by the caller halfway through the delay
    Cancel,
    /// Fail with a single error
    Fault,
    /// Fail with several errors at once
    Aggregate,
    /// Panic inside the computation
    Panic,
}

/// Demo run parameters
#[derive(Debug, Clone)]
pub struct DemoPlan {
    pub outcome: Outcome,
    pub delay: Duration,
    pub value: i64,
}

impl DemoPlan {
    /// Build the computation. Nothing runs until the returned closure is called.
    fn factory(&self, token: CancellationToken) -> impl FnOnce() -> TaskHandle<i64> + Send {
        let plan = self.clone();
        move || {
            TaskHandle::spawn_cancellable(token, async move {
                tokio::time::sleep(plan.delay).await;
                match plan.outcome {
                    Outcome::Success | Outcome::Cancel => Ok(plan.value),
                    Outcome::Fault => Err(anyhow::anyhow!("demo computation failed")),
                    Outcome::Aggregate => Err(Error::aggregate([
                        anyhow::anyhow!("primary demo failure"),
                        anyhow::anyhow!("secondary demo failure"),
                    ])
                    .into()),
                    Outcome::Panic => panic!("demo computation panicked"),
                }
            })
        }
    }
}

fn print_change(observer: &TaskObserver<i64>, event: &ChangeEvent) {
    println!(
        "{:>3}  {:<22} {} {}",
        event.sequence,
        event.attribute,
        observer.status().symbol(),
        observer.status()
    );
}

/// Watch one demo computation, printing every notification as it arrives
pub async fn run(config: NotifyConfig, plan: DemoPlan) -> anyhow::Result<ObserverSnapshot<i64>> {
    let token = CancellationToken::new();
    let observer = TaskObserver::builder()
        .config(config)
        .factory(plan.factory(token.clone()))
        .build()?;

    observer.subscribe(print_change);
    let mut rx = observer.bus().receiver();

    observer.start()?;
    debug!(outcome = ?plan.outcome, delay_ms = plan.delay.as_millis() as u64, "Demo started");

    if plan.outcome == Outcome::Cancel {
        let half = plan.delay / 2;
        tokio::spawn(async move {
            tokio::time::sleep(half).await;
            token.cancel();
        });
    }

    while let Ok(event) = rx.recv().await {
        if event.attribute == Attribute::NotCompleted {
            break;
        }
    }

    Ok(observer.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_notify_task::TaskStatus;

    fn plan(outcome: Outcome) -> DemoPlan {
        DemoPlan {
            outcome,
            delay: Duration::from_millis(20),
            value: 42,
        }
    }

    #[tokio::test]
    async fn test_success_outcome() {
        let snapshot = run(NotifyConfig::default(), plan(Outcome::Success))
            .await
            .unwrap();

        assert_eq!(snapshot.status, TaskStatus::RanToCompletion);
        assert_eq!(snapshot.result, Some(42));
    }

    #[tokio::test]
    async fn test_cancel_outcome() {
        let snapshot = run(NotifyConfig::default(), plan(Outcome::Cancel))
            .await
            .unwrap();

        assert_eq!(snapshot.status, TaskStatus::Canceled);
        assert_eq!(snapshot.result, None);
        assert!(snapshot.error_message.is_none());
    }

    #[tokio::test]
    async fn test_failure_outcomes() {
        let fault = run(NotifyConfig::default(), plan(Outcome::Fault)).await.unwrap();
        assert_eq!(fault.error_message.as_deref(), Some("demo computation failed"));

        let aggregate = run(NotifyConfig::default(), plan(Outcome::Aggregate))
            .await
            .unwrap();
        assert_eq!(aggregate.error_message.as_deref(), Some("primary demo failure"));

        let panicked = run(NotifyConfig::default(), plan(Outcome::Panic)).await.unwrap();
        assert!(panicked.is_faulted);
    }

    #[tokio::test]
    async fn test_label_from_config() {
        let config = NotifyConfig::default().with_label("nightly-build");
        let snapshot = run(config, plan(Outcome::Success)).await.unwrap();

        assert_eq!(snapshot.label, "nightly-build");
    }
}
