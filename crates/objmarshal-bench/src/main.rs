//! Benchmark for objmarshal using an arbitrary JSON document.
//!
//! The document is converted into an object graph (object keys interned, so
//! repeated keys become shared objects) and encoded at every format version.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use objmarshal::limits::CURRENT_VERSION;
use objmarshal::{BigInt, FormatDescriptor, Graph, ObjectId, decode_from_slice, encode_to_vec};
use serde::Serialize;
use serde_json::Value as Json;
use tracing::info;
use tracing_subscriber::EnvFilter;

const ENCODE_ITERS: u32 = 10;
const DECODE_ITERS: u32 = 10;

#[derive(Debug, Serialize)]
struct VersionReport {
    version: u8,
    bytes: usize,
    encode_micros: u128,
    decode_micros: u128,
    encode_mb_per_sec: f64,
    decode_mb_per_sec: f64,
}

/// Converts a JSON value into graph nodes.
fn build(graph: &mut Graph, value: &Json) -> ObjectId {
    match value {
        Json::Null => graph.none(),
        Json::Bool(b) => graph.bool(*b),
        Json::Number(n) => {
            if let Some(v) = n.as_i64() {
                graph.int(v)
            } else if let Some(v) = n.as_u64() {
                graph.bigint(BigInt::from(v))
            } else {
                graph.float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => graph.text(s.as_str()),
        Json::Array(items) => {
            let ids = items.iter().map(|item| build(graph, item)).collect();
            graph.list(ids)
        }
        Json::Object(fields) => {
            let entries = fields
                .iter()
                .map(|(key, item)| {
                    let key = graph.intern(key);
                    (key, build(graph, item))
                })
                .collect();
            graph.dict(entries)
        }
    }
}

fn throughput(bytes: usize, elapsed: Duration) -> f64 {
    (bytes as f64 / 1_000_000.0) / elapsed.as_secs_f64().max(f64::MIN_POSITIVE)
}

fn bench_version(graph: &Graph, root: ObjectId, version: u8) -> VersionReport {
    let format = FormatDescriptor::new(version).expect("Unsupported version");

    // Warmup
    let encoded = encode_to_vec(graph, root, format).expect("Failed to encode");

    let encode_start = Instant::now();
    for _ in 0..ENCODE_ITERS {
        let again = encode_to_vec(graph, root, format).expect("Failed to encode");
        assert_eq!(again, encoded, "Encoding should be deterministic");
    }
    let encode_time = encode_start.elapsed() / ENCODE_ITERS;

    let decode_start = Instant::now();
    let mut decoded = None;
    for _ in 0..DECODE_ITERS {
        decoded = Some(decode_from_slice(&encoded, false).expect("Failed to decode"));
    }
    let decode_time = decode_start.elapsed() / DECODE_ITERS;

    let decoded = decoded.expect("at least one decode iteration");
    assert!(
        graph.deep_eq(root, &decoded.graph, decoded.root),
        "Decoded graph differs at version {}",
        version
    );

    println!("\nVersion {}: {} bytes", version, encoded.len());
    println!(
        "  Encode: {:?} ({:.2} MB/s)",
        encode_time,
        throughput(encoded.len(), encode_time)
    );
    println!(
        "  Decode: {:?} ({:.2} MB/s, {} nodes)",
        decode_time,
        throughput(encoded.len(), decode_time),
        decoded.graph.len()
    );

    VersionReport {
        version,
        bytes: encoded.len(),
        encode_micros: encode_time.as_micros(),
        decode_micros: decode_time.as_micros(),
        encode_mb_per_sec: throughput(encoded.len(), encode_time),
        decode_mb_per_sec: throughput(encoded.len(), decode_time),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let data_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/sample.json".to_string());

    println!("=== objmarshal Benchmark ===");
    println!("Loading data from: {}", data_path);

    let load_start = Instant::now();
    let json_data = fs::read_to_string(&data_path).expect("Failed to read JSON file");
    let document: Json = serde_json::from_str(&json_data).expect("Failed to parse JSON");
    println!("Loaded {} bytes of JSON in {:?}", json_data.len(), load_start.elapsed());

    let build_start = Instant::now();
    let mut graph = Graph::new();
    let root = build(&mut graph, &document);
    println!(
        "Built graph: {} nodes, {} interned keys in {:?}",
        graph.len(),
        graph.interning().len(),
        build_start.elapsed()
    );

    let reports: Vec<VersionReport> = (0..=CURRENT_VERSION)
        .map(|version| bench_version(&graph, root, version))
        .collect();

    let fingerprint = objmarshal::fingerprint(&graph, root, CURRENT_VERSION)
        .expect("Failed to fingerprint");
    let fingerprint_hex: String = fingerprint.iter().map(|b| format!("{:02x}", b)).collect();
    info!(fingerprint = %fingerprint_hex, "graph fingerprint");

    // Write the current-version encoding next to the input
    let input_path = Path::new(&data_path);
    let stem = input_path.file_stem().unwrap_or_default().to_string_lossy();
    let parent = input_path.parent().unwrap_or(Path::new("."));
    let output = parent.join(format!("{}.marshal", stem));
    let encoded =
        encode_to_vec(&graph, root, FormatDescriptor::current()).expect("Failed to encode");
    fs::write(&output, &encoded).expect("Failed to write output file");

    println!("\n=== Summary ===");
    println!("Output: {}", output.display());
    println!("Fingerprint: {}", fingerprint_hex);
    for report in &reports {
        println!(
            "v{}: {:.1}% of JSON",
            report.version,
            100.0 * report.bytes as f64 / json_data.len() as f64
        );
    }
    println!(
        "\n{}",
        serde_json::to_string_pretty(&reports).expect("Failed to serialize report")
    );
}
