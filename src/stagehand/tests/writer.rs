use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use stagehand::{QueuedWriter, WriterBuilder};

#[derive(Debug, PartialEq)]
struct SinkClosed;

fn collecting_writer(
    poll_interval: Duration,
) -> (QueuedWriter<String, SinkClosed>, Arc<Mutex<Vec<String>>>) {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let writer = {
        let sink = sink.clone();
        WriterBuilder::new()
            .poll_interval(poll_interval)
            .spawn(move |item: String| {
                sink.lock().unwrap().push(item);
                Ok(())
            })
            .unwrap()
    };

    (writer, sink)
}

#[test]
fn writes_scenario_in_order() {
    let (writer, sink) = collecting_writer(Duration::ZERO);

    for item in ["a", "a2", "a3", "a4", "a5"] {
        writer.write(item.to_string());
    }
    writer.close().unwrap();

    assert_eq!(*sink.lock().unwrap(), ["a", "a2", "a3", "a4", "a5"]);
}

#[test]
fn drains_slow_consumer_before_shutdown() {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let writer = {
        let sink = sink.clone();
        QueuedWriter::new(move |item: u32| {
            thread::sleep(Duration::from_millis(1));
            sink.lock().unwrap().push(item);
            Ok::<_, SinkClosed>(())
        })
        .unwrap()
    };

    for i in 0..100 {
        writer.write(i);
    }
    assert!(writer.queued_count() > 0);
    writer.dispose(true).unwrap();

    assert_eq!(*sink.lock().unwrap(), (0..100).collect::<Vec<_>>());
}

#[test]
fn accepts_writes_from_many_threads() {
    let (writer, sink) = collecting_writer(Duration::from_millis(1));

    thread::scope(|s| {
        for t in 0..4 {
            let writer = &writer;
            s.spawn(move || {
                for i in 0..250 {
                    writer.write(format!("{t}-{i}"));
                }
            });
        }
    });
    writer.close().unwrap();

    let written = sink.lock().unwrap();
    assert_eq!(written.len(), 1000);

    // Every thread's own items stay in the order they were written.
    for t in 0..4 {
        let prefix = format!("{t}-");
        let mine: Vec<usize> = written
            .iter()
            .filter_map(|item| item.strip_prefix(&prefix))
            .map(|i| i.parse().unwrap())
            .collect();
        assert_eq!(mine, (0..250).collect::<Vec<_>>());
    }
}

#[test]
fn defers_error_to_dispose() {
    let writer = WriterBuilder::new()
        .poll_interval(Duration::from_millis(1))
        .spawn(|_: &'static str| Err(SinkClosed))
        .unwrap();

    writer.write("x");
    assert_eq!(writer.close(), Err(SinkClosed));
}

#[test]
fn stops_writing_after_first_error() {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let writer = {
        let sink = sink.clone();
        WriterBuilder::new()
            .poll_interval(Duration::from_millis(1))
            .spawn(move |item: u32| {
                if item == 3 {
                    return Err(SinkClosed);
                }
                sink.lock().unwrap().push(item);
                Ok(())
            })
            .unwrap()
    };

    for i in 0..10 {
        writer.write(i);
    }

    // Writes keep succeeding after the failure.
    thread::sleep(Duration::from_millis(20));
    assert!(writer.has_failed());
    writer.write(10);

    assert_eq!(writer.dispose(true), Err(SinkClosed));
    assert_eq!(*sink.lock().unwrap(), [0, 1, 2]);
}

#[test]
fn discards_backlog_without_finishing() {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let writer = {
        let sink = sink.clone();
        WriterBuilder::new()
            .poll_interval(Duration::from_millis(1))
            .spawn(move |item: u32| {
                thread::sleep(Duration::from_millis(10));
                sink.lock().unwrap().push(item);
                Ok::<_, SinkClosed>(())
            })
            .unwrap()
    };

    for i in 0..50 {
        writer.write(i);
    }
    writer.dispose(false).unwrap();

    let written = sink.lock().unwrap();
    assert!(written.len() < 50);
    assert!(written.iter().copied().eq(0..written.len() as u32));
}

#[test]
fn drop_finishes_writing() {
    let (writer, sink) = collecting_writer(Duration::from_millis(1));

    writer.write("first".into());
    writer.write("second".into());
    drop(writer);

    assert_eq!(*sink.lock().unwrap(), ["first", "second"]);
}
