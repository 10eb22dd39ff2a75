//! Prints the object graphs stored in a file as indented trees.
//!
//! Usage: dump_file <path> [--allow-code]
//!
//! Records stored back to back are dumped one after another.

use std::collections::HashSet;
use std::fs;

use objmarshal::codec::Tag;
use objmarshal::{Graph, ObjectId, Value, decode_from_slice_partial};

fn preview(text: &str) -> String {
    let head: String = text.chars().take(60).collect();
    if text.chars().count() > 60 {
        format!("{:?}...", head)
    } else {
        format!("{:?}", head)
    }
}

fn label(value: &Value) -> String {
    match value {
        Value::Unit => "None".to_string(),
        Value::Bool(b) => format!("{}", b),
        Value::Ellipsis => "...".to_string(),
        Value::Int(v) => format!("{}", v),
        Value::BigInt(v) => format!("{}", v),
        Value::Float(v) => format!("{:?}", v),
        Value::Complex { real, imag } => format!("({:?}{:+?}j)", real, imag),
        Value::Bytes(b) => format!("BYTES[{}]", b.len()),
        Value::Text(t) if t.interned => format!("{} (interned)", preview(&t.value)),
        Value::Text(t) => preview(&t.value),
        Value::Tuple(items) => format!("tuple[{}]", items.len()),
        Value::Sequence(items) => format!("list[{}]", items.len()),
        Value::Mapping(entries) => format!("dict[{}]", entries.len()),
        Value::MutableSet(items) => format!("set[{}]", items.len()),
        Value::ImmutableSet(items) => format!("frozenset[{}]", items.len()),
        Value::Slice { .. } => "slice".to_string(),
        Value::ProcedureRecord(record) => format!(
            "procedure(args={}, stack={}, line={})",
            record.arg_count, record.stack_size, record.first_line
        ),
        other => other.kind_name().to_string(),
    }
}

fn dump(graph: &Graph, id: ObjectId, indent: usize, seen: &mut HashSet<ObjectId>) {
    let pad = "  ".repeat(indent);
    let Some(value) = graph.get(id) else {
        println!("{}<missing #{}>", pad, id.index());
        return;
    };
    let mut children = Vec::new();
    value.for_each_child(|child| children.push(child));

    if !children.is_empty() && !seen.insert(id) {
        println!("{}<see #{}>", pad, id.index());
        return;
    }
    println!("{}#{} {}", pad, id.index(), label(value));
    for child in children {
        dump(graph, child, indent + 1, seen);
    }
}

fn main() {
    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "data/sample.bin".to_string());
    let allow_code = args.any(|a| a == "--allow-code");

    println!("Reading: {}", path);

    let data = fs::read(&path).expect("Failed to read file");
    println!("File size: {} bytes", data.len());

    let mut offset = 0;
    let mut record = 0;
    while offset < data.len() {
        let kind = Tag::from_u8(data[offset]).map_or("unknown tag", Tag::name);
        let (decoded, used) = match decode_from_slice_partial(&data[offset..], allow_code) {
            Ok(result) => result,
            Err(e) => {
                eprintln!(
                    "Record {} ({}) at byte {}: {} ({})",
                    record,
                    kind,
                    offset,
                    e,
                    e.code().name()
                );
                std::process::exit(1);
            }
        };
        println!(
            "\n=== Record {}: {} ({} bytes, {} nodes) ===",
            record,
            kind,
            used,
            decoded.graph.len()
        );
        dump(&decoded.graph, decoded.root, 0, &mut HashSet::new());
        offset += used;
        record += 1;
    }
}
