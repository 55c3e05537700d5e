//! Lossless JSON persistence.
//!
//! The forest is written as a flat list of line records in pre-order (each
//! root followed by its subtree, children in attachment order). Each record
//! carries its child count, which is enough to rebuild every parent link
//! without nesting, so arbitrarily deep trees stay within the JSON parser's
//! nesting limits.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceError};
use crate::geometry::{LineId, Marker};
use crate::trace::{Forest, TraceBit};

#[derive(Debug, Serialize, Deserialize)]
struct ForestRecord {
    next_id: u32,
    lines: Vec<LineRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LineRecord {
    id: LineId,
    num_children: usize,
    bits: Vec<BitRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BitRecord {
    marker: Marker,
    x: f64,
    y: f64,
    z: f64,
    radius: f64,
}

fn to_record(forest: &Forest) -> ForestRecord {
    let lines = forest
        .pre_order()
        .into_iter()
        .filter_map(|id| forest.line(id))
        .map(|line| LineRecord {
            id: line.id(),
            num_children: line.children().len(),
            bits: line
                .bits()
                .iter()
                .map(|b| BitRecord {
                    marker: b.marker,
                    x: b.position.x,
                    y: b.position.y,
                    z: b.position.z,
                    radius: b.radius,
                })
                .collect(),
        })
        .collect();
    ForestRecord {
        next_id: forest.next_id,
        lines,
    }
}

fn from_record(record: ForestRecord) -> Result<Forest> {
    let mut forest = Forest::new();
    // Open lines still waiting for children, with how many remain.
    let mut open: Vec<(LineId, usize)> = Vec::new();

    for line in record.lines {
        while matches!(open.last(), Some(&(_, 0))) {
            open.pop();
        }
        let parent = match open.last_mut() {
            Some((id, remaining)) => {
                *remaining -= 1;
                Some(*id)
            }
            None => None,
        };
        let bits = line
            .bits
            .into_iter()
            .map(|b| TraceBit::new(b.marker, Point3::new(b.x, b.y, b.z), b.radius))
            .collect();
        forest.restore_line(line.id, parent, bits)?;
        open.push((line.id, line.num_children));
    }

    if let Some(&(id, remaining)) = open.iter().find(|(_, remaining)| *remaining > 0) {
        return Err(TraceError::InvalidState(format!(
            "line {} is missing {} child records",
            id, remaining
        )));
    }
    forest.set_next_id(record.next_id);
    Ok(forest)
}

/// Write a forest as JSON.
pub fn to_writer<W: Write>(forest: &Forest, writer: W) -> Result<()> {
    serde_json::to_writer(writer, &to_record(forest))?;
    Ok(())
}

/// Read a forest from JSON.
pub fn from_reader<R: Read>(reader: R) -> Result<Forest> {
    let record: ForestRecord = serde_json::from_reader(reader)?;
    from_record(record)
}

/// Serialize a forest to a JSON string.
pub fn to_string(forest: &Forest) -> Result<String> {
    Ok(serde_json::to_string(&to_record(forest))?)
}

/// Parse a forest from a JSON string.
pub fn from_str(text: &str) -> Result<Forest> {
    from_record(serde_json::from_str(text)?)
}

/// Load a forest from a JSON file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Forest> {
    let file = File::open(path)?;
    from_reader(BufReader::new(file))
}

/// Save a forest to a JSON file.
pub fn save<P: AsRef<Path>>(forest: &Forest, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    to_writer(forest, &mut writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(first: usize, n: usize, y: f64) -> Vec<TraceBit> {
        (0..n)
            .map(|i| {
                TraceBit::new(
                    Marker::new(first + i),
                    Point3::new(i as f64 * 0.1, y, 1.0 / 3.0),
                    0.25 + i as f64,
                )
            })
            .collect()
    }

    fn sample_forest() -> Forest {
        let mut forest = Forest::new();
        let root = forest.add_root(bits(0, 5, 0.0)).unwrap();
        let a = forest.add_child(root, bits(10, 3, 1.0)).unwrap();
        forest.add_child(a, bits(20, 2, 2.0)).unwrap();
        forest.add_child(a, bits(30, 2, 3.0)).unwrap();
        forest.add_child(root, bits(40, 4, -1.0)).unwrap();
        forest.add_root(bits(50, 1, 9.0)).unwrap();
        // Retire a few ids so next_id is not just the line count.
        forest.split(Marker::new(2)).unwrap();
        forest
    }

    #[test]
    fn test_round_trip_is_exact() {
        let forest = sample_forest();
        let text = to_string(&forest).unwrap();
        let loaded = from_str(&text).unwrap();
        assert_eq!(loaded, forest);
        loaded.validate().unwrap();
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forest.json");
        let forest = sample_forest();
        save(&forest, &path).unwrap();
        assert_eq!(load(&path).unwrap(), forest);
    }

    #[test]
    fn test_deep_chain() {
        let mut forest = Forest::new();
        let mut parent = forest.add_root(bits(0, 2, 0.0)).unwrap();
        for k in 1..500 {
            parent = forest.add_child(parent, bits(k * 2, 2, 0.0)).unwrap();
        }
        let loaded = from_str(&to_string(&forest).unwrap()).unwrap();
        assert_eq!(loaded, forest);
    }

    #[test]
    fn test_truncated_records_rejected() {
        let text = r#"{"next_id":1,"lines":[{"id":0,"num_children":2,"bits":[{"marker":0,"x":0,"y":0,"z":0,"radius":0}]}]}"#;
        assert!(matches!(from_str(text), Err(TraceError::InvalidState(_))));
    }

    #[test]
    fn test_duplicate_markers_rejected() {
        let text = r#"{"next_id":2,"lines":[
            {"id":0,"num_children":0,"bits":[{"marker":7,"x":0,"y":0,"z":0,"radius":0}]},
            {"id":1,"num_children":0,"bits":[{"marker":7,"x":1,"y":0,"z":0,"radius":0}]}]}"#;
        assert!(matches!(
            from_str(text),
            Err(TraceError::DuplicateMarker { .. })
        ));
    }
}
