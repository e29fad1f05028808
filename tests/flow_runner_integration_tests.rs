//! End-to-end runs of the flow runner against mock processors.

mod common;

use common::*;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use flow_runner::collector::FileItemSource;
use flow_runner::persistence::{InMemoryJobStore, JobStore};
use flow_runner::{Flow, FlowError, FlowRunner, JobStatus, JobTicket, VecItemSource};

#[test]
fn test_all_items_succeed() {
    let factory = Arc::new(MockFactory::succeeding());
    let log = EventLog::default();
    let mut runner = logged_runner(250, factory.clone(), &log)
        .with_batch_size(100)
        .with_thread_count(2);

    let ticket = runner.run().unwrap();
    runner.await_completion().unwrap();

    let job = ticket.job();
    assert_eq!(job.status, JobStatus::Finished);
    assert_eq!(job.success_count(), 250);
    assert_eq!(job.failure_count(), 0);
    assert_eq!(job.counts.successful_batches, 3);
    assert_eq!(job.counts.failed_batches, 0);
    assert_eq!(job.id.as_deref(), Some(ticket.job_id()));
    assert!(job.end_time.is_some());
    assert!(job.output.is_empty());

    assert_eq!(factory.requests().len(), 3);
    assert_eq!(factory.creations(), 1);
    assert_eq!(log.count("completed:"), 250);
    assert_eq!(log.count("failed:"), 0);
}

#[test]
fn test_notification_order() {
    let log = EventLog::default();
    let mut runner = logged_runner(250, Arc::new(MockFactory::succeeding()), &log)
        .with_batch_size(100)
        .with_thread_count(2);

    runner.run().unwrap();
    runner.await_completion().unwrap();

    let events = log.events();
    assert_eq!(events.first().map(String::as_str), Some("status:0:starting flow"));
    assert_eq!(log.percents(), vec![0, 100]);
    assert_eq!(log.count("finished"), 1);

    let finished = events.iter().position(|e| e == "finished").unwrap();
    let hundred = events.iter().position(|e| e.starts_with("status:100")).unwrap();
    assert_eq!(finished, events.len() - 1);
    assert!(hundred < finished);
}

#[test]
fn test_every_item_failing_is_failed() {
    let factory = Arc::new(MockFactory::new(Behavior::FailAll));
    let log = EventLog::default();
    let mut runner = logged_runner(100, factory, &log).with_batch_size(100);

    let ticket = runner.run().unwrap();
    runner.await_completion().unwrap();

    let job = ticket.job();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_count(), 100);
    assert_eq!(job.success_count(), 0);
    assert_eq!(job.counts.failed_batches, 1);
    assert_eq!(log.count("failed:"), 100);
    // A batch with no successes does not advance progress; 100% comes from completion
    assert_eq!(log.percents(), vec![0, 100]);
}

#[test]
fn test_stop_on_failure_halts_intake() {
    let failing: HashSet<String> = ["/item/60.json".to_string()].into_iter().collect();
    let factory = Arc::new(MockFactory::new(Behavior::FailItems(failing)));
    let log = EventLog::default();
    let mut runner = logged_runner(200, factory.clone(), &log)
        .with_batch_size(50)
        .with_thread_count(1)
        .with_stop_on_failure(true);

    let ticket = runner.run().unwrap();
    runner.await_completion().unwrap();

    let job = ticket.job();
    assert_eq!(job.status, JobStatus::StopOnError);
    assert_eq!(job.success_count(), 99);
    assert_eq!(job.failure_count(), 1);
    assert_eq!(factory.requests().len(), 2);
    assert!(ticket.is_stopped());
    assert_eq!(log.count("finished"), 1);
}

#[test]
fn test_collection_failure() {
    let factory = Arc::new(MockFactory::succeeding());
    let finished = Arc::new(AtomicUsize::new(0));
    let finished_sink = finished.clone();
    let store = Arc::new(InMemoryJobStore::new());

    let mut runner = FlowRunner::new(Arc::new(FailingSource), factory.clone())
        .with_flow(Arc::new(Flow::new("customers")))
        .with_job_store(store.clone())
        .on_finished(move || {
            finished_sink.fetch_add(1, Ordering::SeqCst);
        });

    let ticket = runner.run().unwrap();
    assert!(!runner.is_running());
    runner.await_completion().unwrap();

    let job = ticket.job();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.success_count(), 0);
    assert_eq!(job.failure_count(), 0);
    assert_eq!(job.counts.successful_batches, 0);
    assert_eq!(job.counts.failed_batches, 0);
    assert!(job.end_time.is_some());
    assert_eq!(job.output.len(), 1);
    assert!(job.output[0].contains("collector endpoint returned 500"));

    assert_eq!(factory.creations(), 0);
    assert_eq!(finished.load(Ordering::SeqCst), 0);
    assert_eq!(
        store.find(ticket.job_id()).unwrap().map(|job| job.status),
        Some(JobStatus::Failed)
    );
}

#[test]
fn test_duplicate_listener_is_called_twice() {
    let count = Arc::new(AtomicUsize::new(0));
    let sink = count.clone();
    let listener = move |_: &str, _: &str| {
        sink.fetch_add(1, Ordering::SeqCst);
    };

    let mut runner = FlowRunner::new(
        Arc::new(VecItemSource::new(item_ids(30))),
        Arc::new(MockFactory::succeeding()),
    )
    .with_flow(Arc::new(Flow::new("customers")))
    .with_batch_size(7)
    .on_item_complete(listener.clone())
    .on_item_complete(listener);

    runner.run().unwrap();
    runner.await_completion().unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 60);
}

#[test]
fn test_error_output_is_bounded() {
    let log = EventLog::default();
    let mut runner = logged_runner(50, Arc::new(MockFactory::new(Behavior::FailAll)), &log)
        .with_batch_size(5)
        .with_thread_count(4);

    let ticket = runner.run().unwrap();
    runner.await_completion().unwrap();

    let job = ticket.job();
    assert_eq!(job.failure_count(), 50);
    assert_eq!(job.output.len(), 10);
    assert!(job.output.iter().all(|message| message.contains("validation failed")));
}

#[test]
fn test_invocation_failure_counts_whole_batch() {
    let factory = Arc::new(MockFactory::new(Behavior::InvocationErrorOn(
        "/item/15.json".to_string(),
    )));
    let log = EventLog::default();
    let mut runner = logged_runner(30, factory, &log).with_batch_size(10);

    let ticket = runner.run().unwrap();
    runner.await_completion().unwrap();

    let job = ticket.job();
    assert_eq!(job.status, JobStatus::FinishedWithErrors);
    assert_eq!(job.success_count(), 20);
    assert_eq!(job.failure_count(), 10);
    assert_eq!(job.counts.failed_batches, 1);
    assert_eq!(job.output.len(), 1);
    assert!(job.output[0].starts_with("Batch invocation failed"));
    assert_eq!(log.count("failed:"), 10);
    assert_eq!(log.count("completed:"), 20);
}

#[test]
fn test_processors_cached_per_connection() {
    let factory = Arc::new(MockFactory::succeeding());
    let mut runner = FlowRunner::new(Arc::new(VecItemSource::new(item_ids(100))), factory.clone())
        .with_flow(Arc::new(Flow::new("customers")))
        .with_batch_size(10)
        .with_thread_count(4)
        .with_source_connections(["a", "b", "c"]);

    let ticket = runner.run().unwrap();
    runner.await_completion().unwrap();

    assert_eq!(ticket.status(), JobStatus::Finished);
    assert_eq!(factory.creations(), 3);
    assert_eq!(factory.processor("a").unwrap().requests().len(), 4);
    assert_eq!(factory.processor("b").unwrap().requests().len(), 3);
    assert_eq!(factory.processor("c").unwrap().requests().len(), 3);
}

#[test]
fn test_infrastructure_failure_fails_the_batch() {
    let factory = Arc::new(MockFactory::succeeding().with_broken_connection("b"));
    let mut runner = FlowRunner::new(Arc::new(VecItemSource::new(item_ids(90))), factory.clone())
        .with_flow(Arc::new(Flow::new("customers")))
        .with_batch_size(10)
        .with_source_connections(["a", "b"]);

    let ticket = runner.run().unwrap();
    runner.await_completion().unwrap();

    let job = ticket.job();
    assert_eq!(job.status, JobStatus::FinishedWithErrors);
    assert_eq!(job.success_count(), 50);
    assert_eq!(job.failure_count(), 40);
    assert_eq!(job.counts.failed_batches, 4);
    assert!(job
        .output
        .iter()
        .all(|message| message.contains("no client for connection b")));
    assert!(factory.processor("b").is_none());
}

#[test]
fn test_batch_request_carries_run_settings() {
    let factory = Arc::new(MockFactory::succeeding());
    let mut runner = FlowRunner::new(Arc::new(VecItemSource::new(item_ids(3))), factory.clone())
        .with_flow(Arc::new(
            Flow::new("customers")
                .with_step("ingest", "INGESTION")
                .with_step("map", "MAPPING"),
        ))
        .with_step(2)
        .with_batch_size(3)
        .with_destination_database("data-hub-FINAL")
        .with_option("entity", "Customer")
        .with_option("flow", "overwritten");

    let ticket = runner.run().unwrap();
    runner.await_completion().unwrap();

    let requests = factory.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.job_id, ticket.job_id());
    assert_eq!(request.flow_name, "customers");
    assert_eq!(request.step, 2);
    assert_eq!(request.target_database.as_deref(), Some("data-hub-FINAL"));
    assert_eq!(request.options.get("entity"), Some(&json!("Customer")));
    assert_eq!(request.options.get("flow"), Some(&json!("customers")));
    assert_eq!(
        request.options.get("uri"),
        Some(&Value::Array(item_ids(3).into_iter().map(Value::String).collect()))
    );
}

#[test]
fn test_ticket_stop_cancels_job() {
    let factory = Arc::new(MockFactory::succeeding().with_delay(Duration::from_millis(20)));
    let log = EventLog::default();
    let mut runner = logged_runner(100, factory, &log)
        .with_batch_size(1)
        .with_thread_count(2);

    let ticket = runner.run().unwrap();
    assert!(ticket.stop());
    assert!(!ticket.stop());
    runner.await_completion().unwrap();

    let job = ticket.job();
    assert_eq!(job.status, JobStatus::Canceled);
    assert!(job.success_count() < 100);
    assert_eq!(log.count("finished"), 1);
    assert_eq!(log.percents().last(), Some(&100));
}

#[test]
fn test_await_timeout_then_completion() {
    let factory = Arc::new(MockFactory::succeeding().with_delay(Duration::from_millis(50)));
    let mut runner = FlowRunner::new(Arc::new(VecItemSource::new(item_ids(4))), factory)
        .with_flow(Arc::new(Flow::new("customers")))
        .with_batch_size(1)
        .with_thread_count(1);

    let ticket = runner.run().unwrap();
    assert!(!runner.await_completion_timeout(Duration::from_millis(1)).unwrap());
    assert!(runner.await_completion_timeout(Duration::from_secs(10)).unwrap());
    assert_eq!(ticket.status(), JobStatus::Finished);

    // Nothing left to wait for
    assert!(runner.await_completion_timeout(Duration::from_millis(1)).unwrap());
    runner.await_completion().unwrap();
}

#[test]
fn test_panicking_listener_interrupts_await() {
    let mut runner = FlowRunner::new(
        Arc::new(VecItemSource::new(item_ids(2))),
        Arc::new(MockFactory::succeeding()),
    )
    .with_flow(Arc::new(Flow::new("customers")))
    .on_finished(|| panic!("listener bug"));

    runner.run().unwrap();
    assert!(matches!(
        runner.await_completion(),
        Err(FlowError::Interrupted(_))
    ));
}

#[test]
fn test_job_store_receives_terminal_record() {
    let store = Arc::new(InMemoryJobStore::new());
    let mut runner = FlowRunner::new(
        Arc::new(VecItemSource::new(item_ids(12))),
        Arc::new(MockFactory::succeeding()),
    )
    .with_flow(Arc::new(Flow::new("customers")))
    .with_batch_size(5)
    .with_job_store(store.clone());

    let ticket = runner.run().unwrap();
    runner.await_completion().unwrap();

    let stored = store.find(ticket.job_id()).unwrap().unwrap();
    assert_eq!(stored, ticket.job());
    assert_eq!(stored.status, JobStatus::Finished);
    assert_eq!(stored.success_count(), 12);
    assert_eq!(stored.counts.successful_batches, 3);
}

#[test]
fn test_file_source_run() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for id in item_ids(25) {
        writeln!(file, "{id}").unwrap();
    }

    let factory = Arc::new(MockFactory::succeeding());
    let mut runner = FlowRunner::new(Arc::new(FileItemSource::new(file.path())), factory.clone())
        .with_flow(Arc::new(Flow::new("customers")))
        .with_batch_size(10);

    let ticket = runner.run().unwrap();
    runner.await_completion().unwrap();

    assert_eq!(ticket.status(), JobStatus::Finished);
    assert_eq!(ticket.job().success_count(), 25);
    assert_eq!(factory.requests().len(), 3);
}

#[test]
fn test_runner_can_run_again() {
    let factory = Arc::new(MockFactory::succeeding());
    let mut runner = FlowRunner::new(Arc::new(VecItemSource::new(item_ids(5))), factory.clone())
        .with_flow(Arc::new(Flow::new("customers")));

    let first = runner.run().unwrap();
    runner.await_completion().unwrap();
    let second = runner.run().unwrap();
    runner.await_completion().unwrap();

    assert_ne!(first.job_id(), second.job_id());
    assert_eq!(second.status(), JobStatus::Finished);
    assert_eq!(runner.job().and_then(|job| job.id), Some(second.job_id().to_string()));
    // Each run builds its own processor cache
    assert_eq!(factory.creations(), 2);
}

#[test]
fn test_many_concurrent_workers_report_consistent_progress() {
    const ITEMS: u64 = 1000;
    let failing: HashSet<String> = item_ids(ITEMS as usize)
        .into_iter()
        .enumerate()
        .filter(|(i, _)| i % 7 == 0)
        .map(|(_, id)| id)
        .collect();
    let expected_failures = failing.len() as u64;
    let factory = Arc::new(
        MockFactory::new(Behavior::FailItems(failing)).with_delay(Duration::from_millis(1)),
    );

    let log = EventLog::default();
    let shared: Arc<OnceLock<JobTicket>> = Arc::new(OnceLock::new());
    let overcounted = Arc::new(AtomicUsize::new(0));
    let (reader, violations) = (shared.clone(), overcounted.clone());
    let mut runner = logged_runner(ITEMS as usize, factory, &log)
        .with_batch_size(3)
        .with_thread_count(8)
        .on_status_changed(move |_, _, _| {
            if let Some(ticket) = reader.get() {
                let counts = ticket.counts();
                if counts.success_count + counts.failure_count > ITEMS {
                    violations.fetch_add(1, Ordering::Relaxed);
                }
            }
        });

    let ticket = runner.run().unwrap();
    shared.set(ticket.clone()).unwrap();
    while !runner.await_completion_timeout(Duration::from_millis(1)).unwrap() {
        let counts = ticket.counts();
        assert!(counts.success_count + counts.failure_count <= ITEMS);
    }

    let percents = log.percents();
    assert!(percents.len() > 2, "{percents:?}");
    assert!(percents.windows(2).all(|pair| pair[0] < pair[1]), "{percents:?}");
    assert!(percents.iter().all(|percent| percent % 5 == 0), "{percents:?}");
    assert_eq!(percents.last(), Some(&100));
    assert_eq!(log.events().last().map(String::as_str), Some("finished"));
    assert_eq!(log.count("finished"), 1);
    assert_eq!(overcounted.load(Ordering::Relaxed), 0);

    let job = ticket.job();
    assert_eq!(job.status, JobStatus::FinishedWithErrors);
    assert_eq!(job.failure_count(), expected_failures);
    assert_eq!(job.success_count() + job.failure_count(), ITEMS);
    assert_eq!(ticket.counts(), job.counts);
}

#[test]
fn test_panicking_item_listener_does_not_drop_batches() {
    let factory = Arc::new(MockFactory::succeeding());
    let mut runner = FlowRunner::new(Arc::new(VecItemSource::new(item_ids(40))), factory.clone())
        .with_flow(Arc::new(Flow::new("customers")))
        .with_batch_size(10)
        .with_thread_count(2)
        .on_item_complete(|_, item| panic!("listener bug on {item}"));

    let ticket = runner.run().unwrap();
    runner.await_completion().unwrap();

    let job = ticket.job();
    assert_eq!(job.status, JobStatus::Finished);
    assert_eq!(job.success_count(), 40);
    assert_eq!(job.counts.successful_batches, 4);
    assert_eq!(factory.requests().len(), 4);
}
