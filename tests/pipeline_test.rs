use std::sync::Arc;

use snapflow::engine::core::exchange::LocalExchangeTransport;
use snapflow::engine::core::operator::{
    Driver, ExchangeOperatorFactory, ExchangeSinkOperatorFactory, OperatorFactory, PageCollector,
    PageConsumerOperatorFactory, Split, TaskContext, TopNOperatorFactory, ValuesOperatorFactory,
};
use snapflow::engine::core::page::{MarkerPage, Page, PageBuilder};
use snapflow::engine::core::snapshot::{SnapshotStatus, SnapshotStore};
use snapflow::engine::core::topn::TopNSpec;
use snapflow::engine::types::{ScalarValue, SortOrder, Type};
use snapflow::shared::config::ExchangeConfig;
use tokio::runtime::Handle;

const LOCATION: &str = "stage-1/task-0";

fn input_pages() -> Vec<Page> {
    (0..10)
        .map(|page| {
            let mut builder = PageBuilder::new(vec![Type::BigInt]);
            for i in page * 10..page * 10 + 10 {
                Type::BigInt
                    .write_value(
                        builder.builder(0).unwrap(),
                        &ScalarValue::BigInt((i * 37) % 100),
                    )
                    .unwrap();
                builder.declare_position();
            }
            builder.build().unwrap()
        })
        .collect()
}

fn task(id: &str, store: &Arc<SnapshotStore>) -> Arc<TaskContext> {
    Arc::new(
        TaskContext::new(id)
            .with_snapshot_store(store.clone())
            .with_snapshot_enabled(true),
    )
}

fn producer(task: &Arc<TaskContext>, transport: &Arc<LocalExchangeTransport>) -> Driver {
    let mut factories: Vec<Box<dyn OperatorFactory>> = vec![
        Box::new(ValuesOperatorFactory::new(0, "values", input_pages())),
        Box::new(ExchangeSinkOperatorFactory::new(
            1,
            "sink",
            transport.clone(),
            LOCATION,
        )),
    ];
    let driver = Driver::create(task.add_driver_context(0, 0), &mut factories).unwrap();
    for factory in factories.iter_mut() {
        factory.no_more_operators();
    }
    driver
}

fn consumer(
    task: &Arc<TaskContext>,
    transport: &Arc<LocalExchangeTransport>,
    collector: &PageCollector,
) -> Driver {
    let mut factories: Vec<Box<dyn OperatorFactory>> = vec![
        Box::new(ExchangeOperatorFactory::new(
            0,
            "exchange",
            transport.clone(),
            ExchangeConfig::default(),
            Handle::current(),
        )),
        Box::new(TopNOperatorFactory::new(
            1,
            "topn",
            TopNSpec::new(vec![Type::BigInt], 5, vec![0], vec![SortOrder::DescNullsLast]),
        )),
        Box::new(PageConsumerOperatorFactory::new(2, "collect", collector.clone())),
    ];
    let mut driver = Driver::create(task.add_driver_context(0, 0), &mut factories).unwrap();
    for factory in factories.iter_mut() {
        factory.no_more_operators();
    }
    driver.add_split(Split::remote(LOCATION)).unwrap();
    driver.no_more_splits().unwrap();
    driver
}

fn top_values(collector: &PageCollector) -> Vec<i64> {
    collector
        .data_pages()
        .iter()
        .flat_map(|page| {
            (0..page.position_count()).map(move |position| {
                Type::BigInt
                    .get_value(page.block(0).unwrap(), position)
                    .unwrap()
                    .as_i64()
                    .unwrap()
            })
        })
        .collect()
}

/// Runs the producer and consumer stages concurrently.
async fn run_stages(producer: Driver, consumer: Driver) {
    let producer = tokio::spawn(producer.run());
    consumer.run().await.unwrap();
    producer.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn resumed_query_matches_the_uninterrupted_result() {
    let producer_store = Arc::new(SnapshotStore::new("producer"));
    let consumer_store = Arc::new(SnapshotStore::new("consumer"));

    // First attempt: snapshot 1 is taken after four input pages.
    let transport = Arc::new(LocalExchangeTransport::new());
    let mut first_producer = producer(&task("producer", &producer_store), &transport);
    for _ in 0..4 {
        first_producer.process().unwrap();
    }
    first_producer
        .inject_marker(MarkerPage::snapshot_page(1).with_task_count(1))
        .unwrap();
    let collector = PageCollector::new();
    let first_consumer = consumer(&task("consumer", &consumer_store), &transport, &collector);
    run_stages(first_producer, first_consumer).await;

    let expected = top_values(&collector);
    assert_eq!(expected, vec![99, 98, 97, 96, 95]);
    assert_eq!(producer_store.status(1), SnapshotStatus::Complete);
    assert_eq!(consumer_store.status(1), SnapshotStatus::Complete);

    // Second attempt resumes from snapshot 1 on a fresh exchange.
    let transport = Arc::new(LocalExchangeTransport::new());
    let mut second_producer = producer(&task("producer", &producer_store), &transport);
    second_producer
        .inject_marker(MarkerPage::resume_page(1).with_task_count(1))
        .unwrap();
    let resumed = PageCollector::new();
    let second_consumer = consumer(&task("consumer", &consumer_store), &transport, &resumed);
    run_stages(second_producer, second_consumer).await;

    assert_eq!(top_values(&resumed), expected);
    assert!(resumed.pages()[0].is_marker());
}
