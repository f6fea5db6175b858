// rhythm_loom_protocol: data model and message vocabulary for Rhythm Loom.
//
// This crate defines what rhythm producers (the enumerator and the
// agglutination engine in `rhythm_loom_engine`) and their hosts exchange. It
// has no dependency on the engine, so a host can read or write record streams
// without pulling in the search code.
//
// Module overview:
// - `types.rs`:    `Radix`, `Meter`, `RhythmRecord` and the catalog key.
// - `config.rs`:   `FilterConfig` (JSON-loadable, validated, with presets),
//                  `OddityType`, `ContourOptions`, `ConfigError`.
// - `message.rs`:  `WorkerEvent` (meta/batch/progress/done), `ControlMessage`
//                  (start/stop), `StartPayload`.
// - `framing.rs`:  4-byte big-endian length prefix + JSON payload, used to
//                  persist event streams to files.
//
// Design decisions:
// - **JSON everywhere.** Records, configs, and events share one serde shape
//   (camelCase keys), the same one the persisted record format uses.
// - **No async runtime.** Framing works over `std::io::Read`/`Write`.

pub mod config;
pub mod framing;
pub mod message;
pub mod types;

pub use config::{ConfigError, ContourOptions, FilterConfig, MAX_DIGITS, OddityType};
pub use framing::{MAX_FRAME_SIZE, read_event, read_frame, write_event, write_frame};
pub use message::{ControlMessage, StartPayload, WorkerEvent};
pub use types::{Meter, Radix, RhythmRecord, catalog_key};

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn record(grouped: &str, index: usize) -> RhythmRecord {
        RhythmRecord {
            id: format!("binary:{grouped}:{index}"),
            radix: Radix::Binary,
            grouped_digits_string: grouped.into(),
            onset_count: grouped.chars().filter(|&c| c == '1').count(),
            canonical_contour: "DU".into(),
            numerator: Some(2),
            denominator: Some(2),
            digits: None,
        }
    }

    #[test]
    fn run_stream_replays_from_frames() {
        let events = vec![
            WorkerEvent::Meta { total_pairs: 4 },
            WorkerEvent::Batch {
                items: vec![record("11 00", 0), record("01 10", 1)],
            },
            WorkerEvent::Progress {
                processed: 4,
                emitted: 2,
            },
            WorkerEvent::Done,
        ];
        let mut wire = Vec::new();
        for event in &events {
            write_event(&mut wire, event).unwrap();
        }

        let mut cursor = Cursor::new(wire);
        let mut replayed = Vec::new();
        while let Some(event) = read_event(&mut cursor).unwrap() {
            replayed.push(event);
        }
        assert_eq!(replayed, events);
        assert!(replayed.last().unwrap().is_done());
    }

    #[test]
    fn events_use_tagged_camel_case_json() {
        let meta = serde_json::to_value(WorkerEvent::Meta { total_pairs: 9 }).unwrap();
        assert_eq!(meta["type"], "meta");
        assert_eq!(meta["totalPairs"], 9);

        let done = serde_json::to_value(WorkerEvent::Done).unwrap();
        assert_eq!(done, serde_json::json!({ "type": "done" }));
    }

    #[test]
    fn control_messages_parse_from_host_json() {
        let start: ControlMessage = serde_json::from_str(
            r#"{ "type": "start", "payload": { "kind": "generate", "filters": { "radix": "octal" } } }"#,
        )
        .unwrap();
        match start {
            ControlMessage::Start { payload } => {
                assert_eq!(payload.filters().radix, Radix::Octal);
                assert_eq!(payload.filters().numerator, 2);
            }
            other => panic!("expected Start, got {other:?}"),
        }

        let stop: ControlMessage = serde_json::from_str(r#"{ "type": "stop" }"#).unwrap();
        assert_eq!(stop, ControlMessage::Stop);
    }

    #[test]
    fn agglutinate_payload_carries_pool() {
        let payload = StartPayload::Agglutinate {
            items: vec![record("10 10", 0)],
            filters: FilterConfig::exhaustive(),
        };
        let json = serde_json::to_string(&ControlMessage::Start {
            payload: payload.clone(),
        })
        .unwrap();
        let back: ControlMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ControlMessage::Start { payload });
    }
}
