use conclave::council::{FinalAnswer, ModelAnswer};
use conclave::events::{CouncilEvent, EventSink, JsonlEventSink};
use tempfile::tempdir;

#[test]
fn jsonl_event_sink_writes_tagged_lines_and_flushes_on_join() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.jsonl");

    let (sink, worker) = JsonlEventSink::new(&path).unwrap();
    sink.emit(CouncilEvent::Stage1Start).unwrap();
    sink.emit(CouncilEvent::Stage1Complete {
        data: vec![ModelAnswer::ok("alpha/one", "an answer")],
    })
    .unwrap();
    sink.emit(CouncilEvent::Stage3Complete {
        data: FinalAnswer {
            model: "chair/final".into(),
            content: "done".into(),
        },
    })
    .unwrap();
    sink.emit(CouncilEvent::Complete).unwrap();

    drop(sink);
    worker.join().unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines.len(), 4);

    let tags: Vec<String> = lines
        .iter()
        .map(|line| {
            let v: serde_json::Value = serde_json::from_str(line).unwrap();
            v["type"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        tags,
        ["stage1_start", "stage1_complete", "stage3_complete", "complete"]
    );

    // Rows deserialize back into the same event.
    let replayed: CouncilEvent = serde_json::from_str(lines[1]).unwrap();
    match replayed {
        CouncilEvent::Stage1Complete { data } => {
            assert_eq!(data.len(), 1);
            assert_eq!(data[0].model, "alpha/one");
            assert!(!data[0].failed);
        }
        other => panic!("expected stage1_complete, got {other:?}"),
    }
}

#[test]
fn sink_clones_share_one_writer() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.jsonl");

    let (sink, worker) = JsonlEventSink::new(&path).unwrap();
    let second = sink.clone();
    sink.emit(CouncilEvent::Stage1Start).unwrap();
    second.emit(CouncilEvent::Complete).unwrap();

    drop(sink);
    drop(second);
    worker.join().unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert_eq!(raw.lines().count(), 2);
}
