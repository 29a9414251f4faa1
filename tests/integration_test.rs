use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use datastream::prelude::*;
use futures::{StreamExt, future};

#[derive(Debug, Clone, PartialEq)]
struct Item {
    val: u64,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Stream of `count` items, ended on the next scheduler turn
fn get_stream(count: u64) -> DataStream<Item> {
    let stream = DataStream::new();
    for val in 0..count {
        stream.write(Item { val }).unwrap();
    }
    let ending = stream.clone();
    tokio::spawn(async move { ending.end() });
    stream
}

fn collect_into(slot: &Arc<Mutex<Option<Deferred<Vec<Item>>>>>) -> impl FnOnce(DataStream<Item>) {
    let slot = slot.clone();
    move |branch| *slot.lock().unwrap() = Some(branch.to_array())
}

fn taken(slot: &Arc<Mutex<Option<Deferred<Vec<Item>>>>>) -> Deferred<Vec<Item>> {
    slot.lock().unwrap().take().unwrap()
}

#[tokio::test]
async fn when_end_resolves_only_after_the_end() {
    init_tracing();
    let ended = Arc::new(AtomicBool::new(false));
    let flag = ended.clone();

    let stream = get_stream(100)
        .each(|_| future::ready(Ok(())))
        .on_end(move || flag.store(true, Ordering::SeqCst));

    let waiting = stream.when_end();
    assert!(!waiting.is_finished());

    waiting.await.unwrap();
    assert!(ended.load(Ordering::SeqCst));
}

#[tokio::test]
async fn from_stream_reads_another_stream() {
    let passthrough = DataStream::new();
    passthrough.write(1).unwrap();
    passthrough.write(2).unwrap();
    passthrough.end_with(3).unwrap();

    let adapted = DataStream::from_stream(passthrough.into_stream().unwrap());
    assert_eq!(adapted.to_array().await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn from_stream_keeps_the_string_variant() {
    let passthrough = DataStream::new();
    passthrough.end_with("aaa".to_string()).unwrap();

    let text: StringStream = StringStream::from_stream_in(Text, passthrough.into_stream().unwrap());
    assert_eq!(text.to_array().await.unwrap(), vec!["aaa".to_string()]);
}

#[test]
fn options_can_be_set_in_constructor_and_later() {
    let stream =
        DataStream::<Item>::with_options(StreamOptions::new().set("test", 1)).unwrap();
    assert_eq!(stream.option("test"), Some(OptionValue::Int(1)));

    stream
        .set_options(StreamOptions::new().set("test", 2).max_parallel(17))
        .unwrap();
    assert_eq!(stream.option("test").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(stream.options().max_parallel(), 17);
}

#[tokio::test]
async fn options_follow_the_referrer() {
    let x = DataStream::<Item>::with_options(StreamOptions::new().set("test", 1)).unwrap();
    let y = DataStream::<Item>::with_options(StreamOptions::new().set("test", 3)).unwrap();

    x.pipe(y.clone());
    x.set_options(StreamOptions::new().set("test", 2).max_parallel(17))
        .unwrap();

    assert!(y.options().is_referred_by(x.options()));
    assert_eq!(x.option("test"), Some(OptionValue::Int(2)));
    assert_eq!(y.option("test"), Some(OptionValue::Int(3)));
    assert_eq!(y.options().max_parallel(), 17);
}

#[test]
fn options_load_from_json() {
    let options =
        StreamOptions::from_json(r#"{"max_parallel": 4, "high_water_mark": 32, "tag": "ingest"}"#)
            .unwrap();
    let stream = DataStream::<Item>::with_options(options).unwrap();

    assert_eq!(stream.options().max_parallel(), 4);
    assert_eq!(stream.options().high_water_mark(), 32);
    assert_eq!(stream.option("tag").as_ref().and_then(OptionValue::as_str), Some("ingest"));
}

#[tokio::test]
async fn take_while_does_not_read_past_last_match() {
    let data = get_stream(100)
        .take_while(|item| future::ready(Ok(item.val < 50)))
        .to_array()
        .await
        .unwrap();

    assert_eq!(data.len(), 50);
}

#[tokio::test]
async fn until_does_not_read_past_last_non_match() {
    let data = get_stream(100)
        .until(|item| future::ready(Ok(item.val >= 50)))
        .to_array()
        .await
        .unwrap();

    assert_eq!(data.len(), 50);
}

#[tokio::test]
async fn tee_creates_an_identical_new_stream() {
    let slot = Arc::new(Mutex::new(None));
    let original = get_stream(100);
    let handle = original.clone();

    let original = original.tee(|branch| {
        assert!(!branch.same_stream(&handle));
        collect_into(&slot)(branch);
    });

    let items = original.to_array().await.unwrap();
    let copies = taken(&slot).await.unwrap();
    assert_eq!(items[0], copies[0]);
    assert_eq!(items, copies);
}

#[derive(Clone)]
struct Extended {
    marker: Arc<String>,
}

impl Variant for Extended {
    fn origin(&self) -> &Path {
        module_dir(file!())
    }
}

trait Marked {
    fn marker(&self) -> Arc<String>;
}

impl<T: Send + 'static> Marked for DataStream<T, Extended> {
    fn marker(&self) -> Arc<String> {
        self.variant().marker.clone()
    }
}

#[tokio::test]
async fn tee_and_operators_keep_the_extended_variant() {
    let cmp = Arc::new("cmp".to_string());
    let org = DataStream::<u32, Extended>::with_variant(
        Extended {
            marker: cmp.clone(),
        },
        StreamOptions::new(),
    )
    .unwrap();
    let handle = org.clone();

    let mut branch = None;
    let org = org.tee(|stream| branch = Some(stream));
    let branch = branch.unwrap();

    assert!(!branch.same_stream(&handle));
    assert!(Arc::ptr_eq(&branch.marker(), &cmp));

    let mapped = org.map(|n| async move { Ok(n + 1) });
    assert!(Arc::ptr_eq(&mapped.marker(), &cmp));
}

#[derive(Debug, Default)]
struct Acc {
    sum: u64,
    cnt: usize,
}

#[tokio::test]
async fn reduce_sees_every_item_and_resolves_after_end() {
    let ended = Arc::new(AtomicBool::new(false));
    let flag = ended.clone();

    let acc = get_stream(100)
        .on_end(move || flag.store(true, Ordering::SeqCst))
        .reduce(
            |mut acc: Acc, item| {
                acc.sum += item.val;
                acc.cnt += 1;
                future::ready(Ok(acc))
            },
            Acc::default(),
        )
        .await
        .unwrap();

    assert_eq!(acc.cnt, 100);
    assert_eq!(acc.sum, 4950);
    assert!(ended.load(Ordering::SeqCst));
}

#[tokio::test]
async fn reduce_passes_plain_accumulators() {
    let sum = get_stream(100)
        .reduce(|acc, item| future::ready(Ok(acc + item.val)), 0)
        .await
        .unwrap();

    assert_eq!(sum, 4950);
}

#[derive(Debug, Clone, PartialEq)]
struct Mapped {
    even: bool,
    num: u64,
}

#[tokio::test]
async fn map_emits_new_values_in_order() {
    let slot = Arc::new(Mutex::new(None));
    let mapped = get_stream(100)
        .tee(collect_into(&slot))
        .map(|item| async move {
            Ok(Mapped {
                even: item.val % 2 == 0,
                num: item.val,
            })
        })
        .on_error(|e| panic!("Should not error: {e}"))
        .to_array();

    let (mapped, unmapped) = (mapped.await.unwrap(), taken(&slot).await.unwrap());
    assert_eq!(mapped[10].num, unmapped[10].val);
    assert!(mapped[2].even && mapped[2].num == 2);
}

#[tokio::test]
async fn filtered_items_never_reach_later_stages() {
    let slot = Arc::new(Mutex::new(None));
    let merge_leaks = Arc::new(AtomicUsize::new(0));
    let leaks = merge_leaks.clone();

    let filtered = get_stream(100)
        .tee(collect_into(&slot))
        .filter(|item| future::ready(Ok(item.val % 2 == 0)))
        .filter(move |_| {
            leaks.fetch_add(1, Ordering::SeqCst);
            future::ready(Ok(true))
        })
        .to_array();

    let (filtered, unfiltered) = (filtered.await.unwrap(), taken(&slot).await.unwrap());
    assert_eq!(filtered[1], unfiltered[2]);
    assert!(!filtered.contains(&unfiltered[1]));
    assert_eq!(filtered.iter().position(|i| *i == unfiltered[8]), Some(4));
    assert_eq!(merge_leaks.load(Ordering::SeqCst), 50);
}

#[tokio::test]
async fn from_array_and_from_iterator() {
    let arr = vec![1, 2, 3, 4, 5, 6, 7, 8, 9];
    assert_eq!(DataStream::from_array(arr.clone()).to_array().await.unwrap(), arr);

    let stream = DataStream::from_iterator(1..10).catch(|e| async move { Err(e) });
    assert_eq!(stream.to_array().await.unwrap(), arr);
}

#[tokio::test]
async fn pipe_delivers_items_to_a_new_stream() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let org_stream = DataStream::<Item>::new();
    let piped = org_stream.pipe(DataStream::new()).on_data(move |chunk: &Item| {
        sink.lock().unwrap().push(chunk.val);
    });
    assert!(!piped.same_stream(&org_stream));

    org_stream.end_with(Item { val: 123 }).unwrap();
    piped.when_end().await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![123]);
}

#[tokio::test]
async fn pipe_lets_destination_capture_errors() {
    let err = StreamError::item("Hello!");
    let err2 = StreamError::item("Hello 2!");
    let (expected, replacement) = (err.clone(), err2.clone());

    let org_stream = DataStream::<Item>::new().catch(move |e| {
        assert!(e.ptr_eq(&expected));
        let replacement = replacement.clone();
        async move { Err(replacement) }
    });

    let upstream = org_stream.clone();
    let forwarded = err2.clone();
    let thrown = Arc::new(AtomicBool::new(false));
    let flag = thrown.clone();
    let piped = org_stream
        .pipe(DataStream::new())
        .catch(move |e| {
            assert!(e.ptr_eq(&forwarded));
            upstream.end();
            async { Ok(()) }
        })
        .on_error(move |_| flag.store(true, Ordering::SeqCst));

    let _ = org_stream.raise(err).await;
    piped.when_end().await.unwrap();
    assert!(!thrown.load(Ordering::SeqCst));
}

#[tokio::test]
async fn pipe_propagates_errors() {
    init_tracing();
    let org_stream = DataStream::<Item>::new();
    let received = Arc::new(Mutex::new(None));
    let slot = received.clone();
    let piped = org_stream
        .pipe(DataStream::new())
        .on_error(move |e| *slot.lock().unwrap() = Some(e.clone()));

    let err = StreamError::item("Hello!");
    let _ = org_stream.raise(err.clone()).await;

    assert!(piped.when_end().await.is_err());
    let received = received.lock().unwrap().take().unwrap();
    assert!(received.ptr_eq(&err));
}

#[tokio::test]
async fn use_plugin_resolves_relative_to_stream_origin() {
    Registry::global().register::<u32, Plain>(
        "src/lib/modtest",
        OperatorChain::new().map(|n: u32| future::ready(Ok(n + 1))),
    );

    let ret = DataStream::from_array(vec![0u32, 1, 2, 3, 4])
        .use_plugin("../lib/modtest")
        .unwrap()
        .to_array()
        .await
        .unwrap();

    assert_eq!(ret, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn unknown_plugin_is_a_config_error() {
    let result = DataStream::from_array(vec![1u32]).use_plugin("../lib/missing");

    assert!(matches!(result.map_err(|e| e.kind()), Err(ErrorKind::Config)));
}

#[tokio::test]
async fn producer_suspends_above_high_water_mark() {
    let stream = DataStream::<u32>::with_options(
        StreamOptions::new().high_water_mark(4).low_water_mark(2),
    )
    .unwrap();
    let producer = {
        let stream = stream.clone();
        tokio::spawn(async move {
            for i in 0..10 {
                stream.send(i).await?;
            }
            stream.end();
            Ok::<_, StreamError>(())
        })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(stream.buffered(), 4);
    assert!(!producer.is_finished());

    assert_eq!(stream.to_array().await.unwrap(), (0..10).collect::<Vec<_>>());
    producer.await.unwrap().unwrap();
}

#[tokio::test]
async fn dropping_the_consumer_stops_an_infinite_source() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = pulled.clone();
    let stream = DataStream::from_iterator((0u64..).inspect(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let mut reader = stream.into_stream().unwrap();
    assert_eq!(reader.next().await.unwrap().unwrap(), 0);
    drop(reader);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let settled = pulled.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(pulled.load(Ordering::SeqCst), settled);
}
