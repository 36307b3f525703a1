//! End-to-end engine tests: schedule through a running pool and assert the
//! recorded lifecycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use jobvisor::{
    BackoffPolicy, Error, Executor, Job, JobState, Manager, ManagerConfig, Policy, Query,
    ScheduleOptions, StateRecord,
};

/// Routes engine traces through the test harness, filtered by `RUST_LOG`.
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn manager(workers: usize) -> Manager {
    init_tracing();
    Manager::builder()
        .with_config(ManagerConfig {
            workers,
            poll_interval: Duration::from_millis(10),
            bus_capacity: 256,
        })
        .build()
}

fn fast_retry_policy(max_retries: i32) -> Policy {
    Policy::default()
        .with_max_retries(max_retries)
        .with_backoff(BackoffPolicy::fixed(Duration::from_millis(10)))
}

/// Polls history until the instance reaches a terminal state.
async fn wait_final(manager: &Manager, uuid: Uuid) -> Vec<StateRecord> {
    let query = Query::unset().with_uuid(uuid);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let history = manager.lookup_instance_history(&query).await.unwrap();
        if history.last().is_some_and(|r| r.state.is_final()) {
            return history;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "instance {uuid} did not finish; history so far: {history:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn states(history: &[StateRecord]) -> Vec<JobState> {
    history.iter().map(|r| r.state).collect()
}

#[tokio::test]
async fn sum_runs_to_completion_with_coerced_arguments() {
    let m = manager(2);
    m.start().await.unwrap();

    m.register_job(Job::new("sum", Executor::from_fn2(|a: i64, b: i64| a + b)))
        .await
        .unwrap();

    let inst = m
        .schedule_registered("sum", ScheduleOptions::new(vec![json!(1), json!("2")]))
        .await
        .unwrap();

    let history = wait_final(&m, inst.uuid).await;
    m.stop_wait().await.unwrap();

    assert_eq!(
        states(&history),
        vec![
            JobState::Created,
            JobState::Scheduled,
            JobState::Processing,
            JobState::Completed,
        ]
    );
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let done = history.last().unwrap();
    assert_eq!(done.options.get("results"), Some(&json!([3])));
}

#[tokio::test]
async fn bad_arguments_fail_before_enqueue() {
    let m = manager(1);
    m.register_job(Job::new("sum", Executor::from_fn2(|a: i64, b: i64| a + b)))
        .await
        .unwrap();

    let err = m
        .schedule_registered("sum", ScheduleOptions::new(vec![json!(1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Argument { .. }));

    let err = m
        .schedule_registered("sum", ScheduleOptions::new(vec![json!(1), json!("x")]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Argument { position: 1, .. }));

    // Nothing was enqueued or recorded.
    assert!(m
        .lookup_instances(&Query::unset())
        .await
        .unwrap()
        .is_empty());
    assert!(m
        .lookup_instance_history(&Query::unset())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn retry_budget_runs_exactly_budgeted_attempts() {
    let m = manager(1);
    m.start().await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let job = Job::new(
        "always-fails",
        Executor::from_fn0(move || -> Result<(), Error> {
            seen.fetch_add(1, Ordering::SeqCst);
            Err(Error::execution("boom"))
        }),
    )
    .with_policy(fast_retry_policy(2));

    let inst = m
        .schedule_job(job, ScheduleOptions::new(vec![]))
        .await
        .unwrap();

    let history = wait_final(&m, inst.uuid).await;
    m.stop_wait().await.unwrap();

    // max_retries = 2 → attempts 1, 2, 3.
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let processing = history
        .iter()
        .filter(|r| r.state == JobState::Processing)
        .count();
    assert_eq!(processing, 3);

    let last = history.last().unwrap();
    assert_eq!(last.state, JobState::Terminated);
    assert!(last
        .options
        .get("error")
        .and_then(Value::as_str)
        .is_some_and(|e| e.contains("boom")));
}

#[tokio::test]
async fn on_error_recovery_completes_the_instance() {
    let m = manager(1);
    m.start().await.unwrap();

    let job = Job::new(
        "flaky-but-fine",
        Executor::from_fn0(|| -> Result<(), Error> { Err(Error::execution("ignorable")) }),
    )
    .with_on_error(|_, _| None);

    let inst = m
        .schedule_job(job, ScheduleOptions::new(vec![]))
        .await
        .unwrap();

    let history = wait_final(&m, inst.uuid).await;
    m.stop_wait().await.unwrap();

    let last = history.last().unwrap();
    assert_eq!(last.state, JobState::Completed);
    assert!(last
        .options
        .get("recovered_error")
        .and_then(Value::as_str)
        .is_some_and(|e| e.contains("ignorable")));
}

#[tokio::test]
async fn timeout_on_final_attempt_finalizes_as_timed_out() {
    let m = manager(1);
    m.start().await.unwrap();

    let job = Job::new(
        "sleeper",
        Executor::new(
            vec![],
            Arc::new(|_args| -> jobvisor::ExecFuture {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Vec::new())
                })
            }),
        ),
    )
    .with_policy(Policy::default().with_timeout(Duration::from_millis(50)));

    let inst = m
        .schedule_job(job, ScheduleOptions::new(vec![]))
        .await
        .unwrap();

    let history = wait_final(&m, inst.uuid).await;
    m.stop_wait().await.unwrap();

    assert_eq!(history.last().unwrap().state, JobState::TimedOut);
}

#[tokio::test]
async fn cancel_pending_instance_removes_it_from_the_queue() {
    let m = manager(1);
    m.register_job(Job::new("later", Executor::from_fn0(|| ())))
        .await
        .unwrap();

    // Not started yet and scheduled in the future: stays pending.
    let inst = m
        .schedule_registered(
            "later",
            ScheduleOptions::new(vec![])
                .with_schedule(jobvisor::Schedule::at(Utc::now() + chrono::Duration::hours(1))),
        )
        .await
        .unwrap();

    m.cancel_instance(inst.uuid).await.unwrap();

    assert!(m
        .lookup_instances(&Query::unset())
        .await
        .unwrap()
        .is_empty());
    let history = m
        .lookup_instance_history(&Query::unset().with_uuid(inst.uuid))
        .await
        .unwrap();
    assert_eq!(history.last().unwrap().state, JobState::Cancelled);

    // Cancelling a finished instance is rejected.
    let err = m.cancel_instance(inst.uuid).await.unwrap_err();
    assert!(matches!(err, Error::Invalid { .. }));

    // Unknown uuids are rejected too.
    let err = m.cancel_instance(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn resize_rules() {
    let m = manager(2);
    m.start().await.unwrap();
    assert_eq!(m.num_workers().await, 2);

    // No-op at the current size.
    m.resize(2).await.unwrap();
    assert_eq!(m.num_workers().await, 2);

    m.resize(4).await.unwrap();
    assert_eq!(m.num_workers().await, 4);

    m.resize(1).await.unwrap();
    assert_eq!(m.num_workers().await, 1);

    let err = m.resize(0).await.unwrap_err();
    assert!(matches!(err, Error::Invalid { .. }));

    m.stop().await.unwrap();
    assert_eq!(m.num_workers().await, 0);
}

#[tokio::test]
async fn stop_waits_out_an_in_flight_resize() {
    let m = Arc::new(manager(2));
    m.start().await.unwrap();

    // Keep both workers busy so the shrink below has to drain one.
    m.register_job(Job::new(
        "slow",
        Executor::new(
            vec![],
            Arc::new(|_args| -> jobvisor::ExecFuture {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(400)).await;
                    Ok(Vec::new())
                })
            }),
        ),
    ))
    .await
    .unwrap();
    for _ in 0..2 {
        m.schedule_registered("slow", ScheduleOptions::new(vec![]))
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let resizer = {
        let m = m.clone();
        tokio::spawn(async move { m.resize(1).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Shutdown must queue behind the drain, not fail fast.
    m.stop().await.unwrap();
    resizer.await.unwrap().unwrap();
    assert_eq!(m.num_workers().await, 0);
}

#[tokio::test]
async fn cron_schedule_recurs_with_fresh_instances() {
    let m = manager(1);
    m.start().await.unwrap();

    let runs = Arc::new(AtomicUsize::new(0));
    let seen = runs.clone();
    let job = Job::new(
        "tick",
        Executor::from_fn0(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .with_schedule(jobvisor::Schedule::cron("* * * * * *").unwrap());
    m.register_job(job).await.unwrap();
    m.schedule_registered("tick", ScheduleOptions::new(vec![]))
        .await
        .unwrap();

    // An every-second cadence must fire more than once.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while runs.load(Ordering::SeqCst) < 2 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "cron instance did not recur"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    m.stop().await.unwrap();

    // Each occurrence ran as its own instance.
    let completed = m
        .lookup_instance_history(&Query::unset().with_states(jobvisor::StateMask::SUCCESS))
        .await
        .unwrap();
    let uuids: std::collections::HashSet<Uuid> = completed.iter().map(|r| r.uuid).collect();
    assert!(uuids.len() >= 2, "history: {completed:?}");
}

#[tokio::test]
async fn cancel_executing_instance_is_observed_at_executor_return() {
    let m = manager(1);
    m.start().await.unwrap();

    let started = Arc::new(tokio::sync::Notify::new());
    let release = Arc::new(tokio::sync::Notify::new());
    let (s, r) = (started.clone(), release.clone());
    m.register_job(Job::new(
        "gated",
        Executor::new(
            vec![],
            Arc::new(move |_args| -> jobvisor::ExecFuture {
                let (s, r) = (s.clone(), r.clone());
                Box::pin(async move {
                    s.notify_one();
                    r.notified().await;
                    Ok(Vec::new())
                })
            }),
        ),
    ))
    .await
    .unwrap();

    let inst = m
        .schedule_registered("gated", ScheduleOptions::new(vec![]))
        .await
        .unwrap();
    started.notified().await;

    // Executing, not pending: this lands as a cooperative request.
    m.cancel_instance(inst.uuid).await.unwrap();
    release.notify_one();

    let history = wait_final(&m, inst.uuid).await;
    m.stop().await.unwrap();
    assert_eq!(history.last().unwrap().state, JobState::Cancelled);
    assert_eq!(
        history
            .iter()
            .filter(|rec| rec.state == JobState::Processing)
            .count(),
        1
    );
}

#[tokio::test]
async fn priority_orders_execution() {
    // Single worker so execution order mirrors dequeue order.
    let m = manager(1);

    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    for (kind, prio) in [("low", 10), ("high", -10), ("mid", 0)] {
        let order = order.clone();
        let job = Job::new(
            kind,
            Executor::from_fn0(move || {
                order.lock().unwrap().push(kind);
            }),
        )
        .with_policy(Policy::default().with_priority(prio));
        m.register_job(job).await.unwrap();
    }

    // Enqueue everything before any worker exists.
    let mut uuids = Vec::new();
    for kind in ["low", "high", "mid"] {
        let inst = m
            .schedule_registered(kind, ScheduleOptions::new(vec![]))
            .await
            .unwrap();
        uuids.push(inst.uuid);
    }

    m.start().await.unwrap();
    for uuid in uuids {
        wait_final(&m, uuid).await;
    }
    m.stop_wait().await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["high", "mid", "low"]);
}

#[tokio::test]
async fn clear_wipes_definitions_queue_and_records() {
    let m = manager(1);
    m.register_job(Job::new("noop", Executor::from_fn0(|| ())))
        .await
        .unwrap();
    m.schedule_registered(
        "noop",
        ScheduleOptions::new(vec![])
            .with_schedule(jobvisor::Schedule::at(Utc::now() + chrono::Duration::hours(1))),
    )
    .await
    .unwrap();

    m.clear().await.unwrap();

    assert!(m.list_jobs().await.is_empty());
    assert!(m
        .lookup_instances(&Query::unset())
        .await
        .unwrap()
        .is_empty());
    assert!(m
        .lookup_instance_history(&Query::unset())
        .await
        .unwrap()
        .is_empty());
}
