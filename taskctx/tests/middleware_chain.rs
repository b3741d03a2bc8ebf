use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use futures::future::BoxFuture;
use taskctx::{
    layers::{
        pass_value::MIDDLEWARE_VALUE,
        prometheus::TaskMetrics,
        return_value::handle_return_value,
        PassValueLayer, PrometheusLayer, ReturnValueLayer,
    },
    patterns::{build_mux, Pattern},
    tasks::{handle_email_delivery_task, new_email_delivery_task, TYPE_EMAIL_DELIVERY},
    telemetry::Telemetry,
};
use taskctx_core::{
    broker::MemoryBroker,
    client::{Client, EnqueueOptions},
    config::Config,
    context::Key,
    error::BoxDynError,
    handler::{handler_fn, BoxHandler, Handler},
    mux::ServeMux,
    server::Server,
    task::{Task, TaskId},
};
use tower_layer::Layer;

type Journal = Arc<Mutex<Vec<String>>>;

fn config() -> Config {
    Config::default()
        .concurrency(4)
        .queues([("critical", 6), ("default", 3), ("low", 1)])
        .poll_interval(Duration::from_millis(5))
        .shutdown_timeout(Duration::from_millis(500))
}

/// Runs `mux` until `done` reaches `expected`
async fn serve(
    broker: MemoryBroker,
    mux: ServeMux,
    done: Arc<AtomicUsize>,
    expected: usize,
    on_error: impl Fn(&Task, &BoxDynError) + Send + Sync + 'static,
) {
    let server = Server::new(broker, config()).on_error(on_error);
    let shutdown = async move {
        while done.load(Ordering::SeqCst) < expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), server.run_until(mux, shutdown))
        .await
        .expect("server did not finish in time")
        .unwrap();
}

fn ignore_errors(_: &Task, _: &BoxDynError) {}

/// Counts every task that made it back out of the chain
#[derive(Clone)]
struct CountLayer(Arc<AtomicUsize>);

impl<S> Layer<S> for CountLayer {
    type Service = Count<S>;
    fn layer(&self, inner: S) -> Self::Service {
        Count(inner, self.0.clone())
    }
}

struct Count<S>(S, Arc<AtomicUsize>);

impl<S: Handler> Handler for Count<S> {
    fn process_task<'a>(&'a self, task: &'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>> {
        Box::pin(async move {
            let res = self.0.process_task(task).await;
            self.1.fetch_add(1, Ordering::SeqCst);
            res
        })
    }
}

#[derive(Clone)]
struct RecordLayer {
    name: &'static str,
    journal: Journal,
}

impl<S> Layer<S> for RecordLayer {
    type Service = Record<S>;
    fn layer(&self, inner: S) -> Self::Service {
        Record {
            inner,
            layer: self.clone(),
        }
    }
}

struct Record<S> {
    inner: S,
    layer: RecordLayer,
}

impl<S: Handler> Handler for Record<S> {
    fn process_task<'a>(&'a self, task: &'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>> {
        Box::pin(async move {
            let journal = &self.layer.journal;
            journal.lock().unwrap().push(format!("{}-pre", self.layer.name));
            let res = self.inner.process_task(task).await;
            journal.lock().unwrap().push(format!("{}-post", self.layer.name));
            res
        })
    }
}

#[tokio::test]
async fn middleware_runs_in_registration_order_around_the_handler() {
    let broker = MemoryBroker::new();
    Client::new(broker.clone())
        .enqueue(&new_email_delivery_task(1, "welcome").unwrap())
        .await
        .unwrap();

    let journal = Journal::default();
    let done = Arc::new(AtomicUsize::new(0));
    let leaf_journal = journal.clone();
    let mut mux = ServeMux::new();
    mux.use_layer(CountLayer(done.clone()))
        .use_layer(RecordLayer {
            name: "m1",
            journal: journal.clone(),
        })
        .use_layer(RecordLayer {
            name: "m2",
            journal: journal.clone(),
        })
        .handle_func(TYPE_EMAIL_DELIVERY, move |task| {
            let journal = leaf_journal.clone();
            Box::pin(async move {
                journal.lock().unwrap().push(format!("h:{}", task.type_name()));
                Ok::<_, BoxDynError>(())
            })
        });

    serve(broker, mux, done, 1, ignore_errors).await;

    assert_eq!(
        *journal.lock().unwrap(),
        ["m1-pre", "m2-pre", "h:email:deliver", "m2-post", "m1-post"]
    );
}

#[tokio::test]
async fn values_flow_down_and_back_up_through_the_server() {
    let broker = MemoryBroker::new();
    let client = Client::new(broker.clone());
    let mut enqueued = BTreeSet::new();
    for (user, queue) in [(1, "critical"), (2, "default"), (3, "low")] {
        let info = client
            .enqueue_with(
                &new_email_delivery_task(user, "welcome").unwrap(),
                EnqueueOptions::default().queue(queue),
            )
            .await
            .unwrap();
        enqueued.insert(info.id);
    }

    let returned = Arc::new(Mutex::new(Vec::new()));
    let passed_down = Arc::new(Mutex::new(BTreeSet::<(TaskId, Option<String>)>::new()));
    let done = Arc::new(AtomicUsize::new(0));

    let sink = returned.clone();
    let seen = passed_down.clone();
    let mut mux = ServeMux::new();
    mux.use_layer(CountLayer(done.clone()))
        .use_layer(ReturnValueLayer::on_value(move |_, value| {
            sink.lock().unwrap().push(value.cloned());
        }))
        .use_fn(move |inner: BoxHandler| -> BoxHandler {
            // reads the downward value, then lets the return value handler run
            let seen = seen.clone();
            Arc::new(handler_fn(move |task| {
                let inner = inner.clone();
                let seen = seen.clone();
                Box::pin(async move {
                    let value = task.context().value(&MIDDLEWARE_VALUE).cloned();
                    seen.lock().unwrap().insert((task.id().unwrap(), value));
                    inner.process_task(task).await
                })
            }))
        })
        .handle_func(TYPE_EMAIL_DELIVERY, handle_return_value);
    let mux = {
        // PassValueLayer outermost, wrapping the whole mux
        let mut outer = ServeMux::new();
        outer
            .use_layer(PassValueLayer::new())
            .handle("email:", mux);
        outer
    };

    serve(broker.clone(), mux, done, 3, ignore_errors).await;

    assert!(broker.is_empty());
    assert_eq!(
        *returned.lock().unwrap(),
        vec![Some("value from task".to_owned()); 3]
    );
    let passed_down = passed_down.lock().unwrap();
    assert_eq!(
        passed_down.iter().map(|(id, _)| *id).collect::<BTreeSet<_>>(),
        enqueued
    );
    assert!(passed_down
        .iter()
        .all(|(_, value)| value.as_deref() == Some("value from middleware")));
}

static OTHER_KEY: Key<String> = Key::new("myKey");

#[tokio::test]
async fn keys_with_the_same_name_stay_apart() {
    let broker = MemoryBroker::new();
    Client::new(broker.clone())
        .enqueue(&new_email_delivery_task(1, "welcome").unwrap())
        .await
        .unwrap();

    let seen = Arc::new(Mutex::new(None));
    let done = Arc::new(AtomicUsize::new(0));
    let sink = seen.clone();
    let mut mux = ServeMux::new();
    mux.use_layer(CountLayer(done.clone()))
        .use_fn(|inner: BoxHandler| -> BoxHandler {
            Arc::new(handler_fn(move |task| {
                let inner = inner.clone();
                Box::pin(async move {
                    let ctx = task.context().with(&OTHER_KEY, "other".to_owned());
                    let mut scoped = task.with_context(ctx);
                    inner.process_task(&mut scoped).await
                })
            }))
        })
        .use_layer(PassValueLayer::new())
        .handle_func(TYPE_EMAIL_DELIVERY, move |task| {
            let sink = sink.clone();
            Box::pin(async move {
                let ctx = task.context();
                *sink.lock().unwrap() = Some((
                    ctx.value(&MIDDLEWARE_VALUE).cloned(),
                    ctx.value(&OTHER_KEY).cloned(),
                ));
                Ok::<_, BoxDynError>(())
            })
        });

    serve(broker, mux, done, 1, ignore_errors).await;

    assert_eq!(
        *seen.lock().unwrap(),
        Some((
            Some("value from middleware".to_owned()),
            Some("other".to_owned())
        ))
    );
}

#[tokio::test]
async fn failures_unwind_through_every_middleware_and_are_counted() {
    let broker = MemoryBroker::new();
    let client = Client::new(broker.clone());
    client
        .enqueue(&new_email_delivery_task(1, "welcome").unwrap())
        .await
        .unwrap();
    client
        .enqueue(&Task::new(TYPE_EMAIL_DELIVERY, "not json"))
        .await
        .unwrap();

    let metrics = TaskMetrics::new();
    let journal = Journal::default();
    let failures = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(AtomicUsize::new(0));
    let mut mux = ServeMux::new();
    mux.use_layer(CountLayer(done.clone()))
        .use_layer(RecordLayer {
            name: "m1",
            journal: journal.clone(),
        })
        .use_layer(PrometheusLayer::new(metrics.clone()))
        .handle_func(TYPE_EMAIL_DELIVERY, handle_email_delivery_task);

    let sink = failures.clone();
    serve(broker, mux, done, 2, move |task, err| {
        sink.lock()
            .unwrap()
            .push((task.type_name().to_owned(), err.to_string()));
    })
    .await;

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, TYPE_EMAIL_DELIVERY);
    assert!(failures[0].1.starts_with("invalid `email:deliver` payload"));
    let mut journal = journal.lock().unwrap().clone();
    journal.sort();
    assert_eq!(journal, ["m1-post", "m1-post", "m1-pre", "m1-pre"]);
    assert!(metrics
        .render()
        .contains(r#"processed_tasks_total{task_type="email:deliver"} 2"#));
}

#[tokio::test]
async fn metrics_pattern_counts_through_the_worker() {
    let broker = MemoryBroker::new();
    let client = Client::new(broker.clone());
    for user in 0..5 {
        client
            .enqueue(&new_email_delivery_task(user, "digest").unwrap())
            .await
            .unwrap();
    }

    let telemetry = Telemetry::with_metrics(TaskMetrics::new());
    let done = Arc::new(AtomicUsize::new(0));
    let mut mux = ServeMux::new();
    mux.use_layer(CountLayer(done.clone()))
        .handle("email:", build_mux(Pattern::Metrics, &telemetry));

    serve(broker, mux, done, 5, ignore_errors).await;

    assert!(telemetry
        .metrics()
        .render()
        .contains(r#"processed_tasks_total{task_type="email:deliver"} 5"#));
}
