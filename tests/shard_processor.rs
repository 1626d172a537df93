use std::io::Read;
use std::path::{Path, PathBuf};

use pileshard::error::Error;
use pileshard::io::compression::{open_reader, ShardFile};
use pileshard::io::writer::shadow_path;
use pileshard::io::{read_records, write_shards, Record};
use pileshard::pipelines::{Pipeline, ProcessorConfig, RecordContext, ShardProcessor};

/// 3 shards of 10 records each, `s{shard}-{record}`.
fn corpus(dir: &Path) -> Vec<PathBuf> {
    (0..3)
        .map(|shard| {
            let records =
                (0..10).map(move |i| Record::new(format!("s{}-{}", shard, i)).with_text("some text"));
            let summary =
                write_shards(records, dir, &format!("part{}.jsonl.gz", shard), 1_000_000).unwrap();
            dir.join(&summary.shards[0])
        })
        .collect()
}

fn pattern(dir: &Path) -> String {
    dir.join("*.jsonl.gz").to_string_lossy().into_owned()
}

fn ids(path: &Path) -> Vec<String> {
    read_records(path)
        .unwrap()
        .map(|r| r.unwrap().id().to_string())
        .collect()
}

fn config() -> ProcessorConfig {
    ProcessorConfig {
        processes: 2,
        ..Default::default()
    }
}

fn identity(record: Record, _: &RecordContext) -> Result<Option<Record>, Error> {
    Ok(Some(record))
}

#[test]
fn filtering_drops_records() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    corpus(src.path());

    let processor = ShardProcessor::new(
        &pattern(src.path()),
        dst.path(),
        |record: Record, _: &RecordContext| {
            let keep = !record.id().ends_with('3');
            Ok(Some(record).filter(|_| keep))
        },
    )
    .with_config(ProcessorConfig {
        update_interval: 4,
        ..config()
    });
    let summary = processor.run().unwrap();

    assert_eq!(summary.shards, 3);
    assert_eq!(summary.documents, 30);
    assert_eq!(summary.dropped, 3);
    assert_eq!(summary.failed_shards, 0);
    assert_eq!(processor.progress().summary(), summary);

    let out = ids(&dst.path().join("00000_part1.jsonl.gz"));
    assert_eq!(out.len(), 9);
    assert!(!out.contains(&"s1-3".to_string()));
}

#[test]
fn malformed_lines_are_skipped() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let mut f = ShardFile::create(&src.path().join("00000_x.jsonl.gz")).unwrap();
    for line in [r#"{"id":"a"}"#, r#"{"id":"b""#, "", r#"{"no":"id"}"#, r#"{"id":"c"}"#] {
        f.write_line(line).unwrap();
    }
    f.finish().unwrap();

    let lines = std::sync::Mutex::new(Vec::new());
    let summary = ShardProcessor::new(
        &pattern(src.path()),
        dst.path(),
        |record: Record, ctx: &RecordContext| {
            lines.lock().unwrap().push(ctx.line);
            Ok(Some(record))
        },
    )
    .with_config(config())
    .run()
    .unwrap();

    assert_eq!(summary.malformed, 2);
    assert_eq!(summary.documents, 2);
    assert_eq!(*lines.lock().unwrap(), vec![0, 4]);
    assert_eq!(ids(&dst.path().join("00000_x.jsonl.gz")), vec!["a", "c"]);
}

#[test]
fn loosely_typed_records_pass_through() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let lines = [
        r#"{"id":"a","created":1700000000}"#,
        r#"{"id":"b","metadata":["tag"]}"#,
        r#"{"id":"c","source":5}"#,
        r#"{"id":"d","text":null}"#,
    ];
    let mut f = ShardFile::create(&src.path().join("00000_x.jsonl.gz")).unwrap();
    for line in lines.iter().chain(["null"].iter()) {
        f.write_line(line).unwrap();
    }
    f.finish().unwrap();

    let summary = ShardProcessor::new(&pattern(src.path()), dst.path(), identity)
        .with_config(config())
        .run()
        .unwrap();

    assert_eq!(summary.documents, 4);
    assert_eq!(summary.malformed, 0);
    assert_eq!(summary.nones, 1);
    let mut out = String::new();
    open_reader(&dst.path().join("00000_x.jsonl.gz"))
        .unwrap()
        .read_to_string(&mut out)
        .unwrap();
    assert_eq!(out.lines().collect::<Vec<_>>(), lines);
}

#[test]
fn existing_outputs_are_skipped() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    corpus(src.path());

    let first = ShardProcessor::new(&pattern(src.path()), dst.path(), identity)
        .with_config(config())
        .run()
        .unwrap();
    assert_eq!(first.skipped_shards, 0);
    let target = dst.path().join("00000_part0.jsonl.gz");
    let before = std::fs::read(&target).unwrap();

    let second = ShardProcessor::new(
        &pattern(src.path()),
        dst.path(),
        |_: Record, _: &RecordContext| -> Result<Option<Record>, Error> {
            panic!("skipped shards are never read")
        },
    )
    .with_config(config())
    .run()
    .unwrap();
    assert_eq!(second.shards, 3);
    assert_eq!(second.skipped_shards, 3);
    assert_eq!(second.documents, 0);
    assert_eq!(std::fs::read(&target).unwrap(), before);

    let third = ShardProcessor::new(
        &pattern(src.path()),
        dst.path(),
        |record: Record, _: &RecordContext| {
            Ok(Some(Record::new(record.id())))
        },
    )
    .with_config(ProcessorConfig {
        overwrite: true,
        ..config()
    })
    .run()
    .unwrap();
    assert_eq!(third.skipped_shards, 0);
    assert_ne!(std::fs::read(&target).unwrap(), before);
}

#[test]
fn stale_shadow_files_are_replaced() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    corpus(src.path());

    // left behind by a killed run
    let target = dst.path().join("00000_part2.jsonl.gz");
    std::fs::write(shadow_path(&target), b"half a gzip stream").unwrap();

    let summary = ShardProcessor::new(&pattern(src.path()), dst.path(), identity)
        .with_config(config())
        .run()
        .unwrap();
    assert_eq!(summary.failed_shards, 0);
    assert!(!shadow_path(&target).exists());
    assert_eq!(ids(&target).len(), 10);
}

#[test]
fn failing_shards_leave_nothing_behind() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    corpus(src.path());

    let summary = ShardProcessor::new(
        &pattern(src.path()),
        dst.path(),
        |record: Record, _: &RecordContext| match record.id() {
            "s0-5" => Err(Error::transform("refusing s0-5")),
            "s1-7" => panic!("unexpected record"),
            _ => Ok(Some(record)),
        },
    )
    .with_config(config())
    .run()
    .unwrap();

    assert_eq!(summary.shards, 1);
    assert_eq!(summary.failed_shards, 2);
    // only the records of the completed shard are accounted for
    assert_eq!(summary.documents, 10);

    for failed in ["00000_part0.jsonl.gz", "00000_part1.jsonl.gz"] {
        let target = dst.path().join(failed);
        assert!(!target.exists());
        assert!(!shadow_path(&target).exists());
    }
    assert_eq!(ids(&dst.path().join("00000_part2.jsonl.gz")).len(), 10);
}

#[test]
fn failures_without_shadowing() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    corpus(src.path());

    let summary = ShardProcessor::new(
        &pattern(src.path()),
        dst.path(),
        |record: Record, _: &RecordContext| {
            if record.id() == "s2-9" {
                Err(Error::transform("last record"))
            } else {
                Ok(Some(record))
            }
        },
    )
    .with_config(ProcessorConfig {
        shadow: false,
        ..config()
    })
    .run()
    .unwrap();

    assert_eq!(summary.failed_shards, 1);
    assert!(!dst.path().join("00000_part2.jsonl.gz").exists());
    assert!(dst.path().join("00000_part0.jsonl.gz").exists());
}

#[test]
fn single_file_input() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let shards = corpus(src.path());

    let summary = ShardProcessor::new(shards[1].to_str().unwrap(), dst.path(), identity)
        .with_config(ProcessorConfig {
            debug: true,
            report_every: Some(std::time::Duration::from_millis(1)),
            ..config()
        })
        .run()
        .unwrap();

    assert_eq!(summary.shards, 1);
    assert_eq!(ids(&dst.path().join("00000_part1.jsonl.gz")).len(), 10);
}
