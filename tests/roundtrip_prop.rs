use proptest::prelude::*;
use proptest::sample::select;
use templight_tools::entries::{BeginEntry, EndEntry, EntryKind, SourceLocation, TraceHeader};
use templight_tools::output::TraceWriter;
use templight_tools::protobuf::{CompressionMode, ProtobufWriter, TraceChunk, TraceReader};

const ALL_MODES: [CompressionMode; 3] = [
    CompressionMode::None,
    CompressionMode::Zlib,
    CompressionMode::Dictionary,
];

/// C++-like names: scopes, template argument lists, call signatures and
/// operator spellings that contain angle brackets
fn template_name() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        4 => "[A-Za-z_][A-Za-z0-9_]{0,6}",
        1 => Just("int".to_string()),
        1 => Just("unsigned long".to_string()),
        1 => Just("std::size_t".to_string()),
        1 => Just("operator<<".to_string()),
        1 => Just("operator<".to_string()),
        1 => Just("operator()".to_string()),
        1 => Just("operator->*".to_string()),
        1 => (0u32..64).prop_map(|n| n.to_string()),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            (inner.clone(), prop::collection::vec(inner.clone(), 0..4))
                .prop_map(|(name, args)| format!("{}<{}>", name, args.join(", "))),
            (inner.clone(), inner.clone()).prop_map(|(scope, name)| format!("{scope}::{name}")),
            (inner.clone(), prop::collection::vec(inner, 0..3))
                .prop_map(|(ret, params)| format!("{}({})", ret, params.join(", "))),
        ]
    })
}

fn location() -> impl Strategy<Value = SourceLocation> {
    (
        select(vec!["a.cpp", "b.h", "include/c.hpp"]),
        any::<u32>(),
        any::<u32>(),
    )
        .prop_map(|(file, line, column)| SourceLocation::new(file, line, column))
}

fn begin(names: Vec<String>) -> impl Strategy<Value = TraceChunk> {
    (
        select(names),
        0u32..=12,
        location(),
        0.0f64..1.0e6,
        any::<u64>(),
        proptest::option::of(location()),
    )
        .prop_map(|(name, kind, location, timestamp, memory_usage, origin)| {
            let mut begin = BeginEntry::new(EntryKind::from_ordinal(kind), name, location)
                .with_timestamp(timestamp)
                .with_memory_usage(memory_usage);
            begin.origin = origin;
            TraceChunk::Begin(begin)
        })
}

fn end() -> impl Strategy<Value = TraceChunk> {
    (0.0f64..1.0e6, any::<u64>())
        .prop_map(|(timestamp, memory_usage)| TraceChunk::End(EndEntry::new(timestamp, memory_usage)))
}

/// Entries drawing names from a small pool, so names and their segments repeat
fn entries() -> impl Strategy<Value = Vec<TraceChunk>> {
    prop::collection::vec(template_name(), 1..6).prop_flat_map(|names| {
        prop::collection::vec(prop_oneof![begin(names), end()], 0..24)
    })
}

fn encode(compression: CompressionMode, traces: &[(String, Vec<TraceChunk>)]) -> Vec<u8> {
    let mut writer = ProtobufWriter::new(Vec::new(), compression);
    for (source, chunks) in traces {
        writer.begin_trace(Some(source.as_str())).unwrap();
        for chunk in chunks {
            match chunk {
                TraceChunk::Begin(begin) => writer.write_begin(begin).unwrap(),
                TraceChunk::End(end) => writer.write_end(end).unwrap(),
                _ => {}
            }
        }
        writer.end_trace().unwrap();
    }
    writer.into_inner()
}

fn expected(traces: &[(String, Vec<TraceChunk>)]) -> Vec<TraceChunk> {
    let mut chunks = Vec::new();
    for (source, entries) in traces {
        chunks.push(TraceChunk::Header(TraceHeader {
            version: 1,
            source_name: Some(source.clone()),
        }));
        chunks.extend(entries.iter().cloned());
    }
    chunks
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        rng_algorithm: proptest::test_runner::RngAlgorithm::ChaCha,
        rng_seed: proptest::test_runner::RngSeed::Fixed(0x7E_4D_11),
        .. ProptestConfig::default()
    })]

    #[test]
    fn entries_survive_every_compression_mode(
        traces in prop::collection::vec(("[a-z]{1,8}\\.cpp", entries()), 1..3),
    ) {
        let want = expected(&traces);
        for mode in ALL_MODES {
            let data = encode(mode, &traces);
            let decoded: Vec<TraceChunk> = TraceReader::new(&data)
                .filter(|chunk| !matches!(chunk, Ok(TraceChunk::Other)))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| TestCaseError::fail(format!("{mode:?}: {e}")))?;
            prop_assert_eq!(&decoded, &want, "mode {:?}", mode);
        }
    }
}
