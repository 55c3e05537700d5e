//! SWC sample table support.
//!
//! Each trace bit becomes one row `n type x y z radius parent`, with
//! `n = marker + 1`. A line's first bit points at its parent line's last
//! bit, or at `-1` for a root.
//!
//! SWC has no notion of lines, so loading splits the sample tree at every
//! sample that does not have exactly one child. A saved line with a single
//! child therefore comes back joined with that child.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Point3;

use crate::error::{Result, TraceError};
use crate::geometry::{LineId, Marker};
use crate::trace::{Forest, TraceBit};

/// Sample type written for every row ("undefined").
const SWC_TYPE: i32 = 0;

#[derive(Debug, Clone)]
struct Sample {
    bit: TraceBit,
    parent: Option<u64>,
}

/// Write a forest as SWC.
pub fn to_writer<W: Write>(forest: &Forest, mut writer: W) -> Result<()> {
    writeln!(writer, "# n type x y z radius parent")?;
    for id in forest.pre_order() {
        let Some(line) = forest.line(id) else { continue };
        let mut parent: i64 = line
            .parent()
            .and_then(|p| forest.line(p))
            .and_then(|p| p.tail())
            .map_or(-1, |b| b.marker.raw() as i64 + 1);
        for bit in line.bits() {
            let n = bit.marker.raw() as i64 + 1;
            let p = bit.position;
            writeln!(
                writer,
                "{} {} {} {} {} {} {}",
                n, SWC_TYPE, p.x, p.y, p.z, bit.radius, parent
            )?;
            parent = n;
        }
    }
    Ok(())
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, name: &str, line_number: usize) -> Result<T> {
    let text = field.ok_or_else(|| TraceError::Parse {
        line_number,
        message: format!("missing {}", name),
    })?;
    text.parse().map_err(|_| TraceError::Parse {
        line_number,
        message: format!("invalid {} '{}'", name, text),
    })
}

/// Read a forest from SWC.
pub fn from_reader<R: BufRead>(reader: R) -> Result<Forest> {
    let mut samples: HashMap<u64, Sample> = HashMap::new();
    let mut order: Vec<u64> = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = index + 1;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let mut fields = text.split_whitespace();
        let n: u64 = parse_field(fields.next(), "sample id", line_number)?;
        let _kind: i64 = parse_field(fields.next(), "type", line_number)?;
        let x: f64 = parse_field(fields.next(), "x", line_number)?;
        let y: f64 = parse_field(fields.next(), "y", line_number)?;
        let z: f64 = parse_field(fields.next(), "z", line_number)?;
        let radius: f64 = parse_field(fields.next(), "radius", line_number)?;
        let parent: i64 = parse_field(fields.next(), "parent", line_number)?;

        if n == 0 || n > u32::MAX as u64 {
            return Err(TraceError::Parse {
                line_number,
                message: format!("sample id {} out of range", n),
            });
        }
        let marker = Marker::from((n - 1) as u32);
        let sample = Sample {
            bit: TraceBit::new(marker, Point3::new(x, y, z), radius),
            parent: (parent >= 0).then_some(parent as u64),
        };
        if samples.insert(n, sample).is_some() {
            return Err(TraceError::DuplicateMarker { marker });
        }
        order.push(n);
    }

    let mut children: HashMap<u64, Vec<u64>> = HashMap::new();
    let mut roots = Vec::new();
    for &n in &order {
        match samples[&n].parent {
            Some(p) if samples.contains_key(&p) => children.entry(p).or_default().push(n),
            Some(p) => {
                return Err(TraceError::InvalidState(format!(
                    "sample {} refers to missing parent {}",
                    n, p
                )))
            }
            None => roots.push(n),
        }
    }

    let mut forest = Forest::new();
    let mut placed = 0usize;
    // (first sample of a line, the line it hangs from)
    let mut stack: Vec<(u64, Option<LineId>)> = roots.iter().rev().map(|&r| (r, None)).collect();
    while let Some((start, parent)) = stack.pop() {
        let mut bits = Vec::new();
        let mut cur = start;
        let branches = loop {
            bits.push(samples[&cur].bit);
            placed += 1;
            match children.get(&cur).map(Vec::as_slice) {
                Some([only]) => cur = *only,
                Some(many) => break many.to_vec(),
                None => break Vec::new(),
            }
        };
        let id = match parent {
            Some(p) => forest.add_child(p, bits)?,
            None => forest.add_root(bits)?,
        };
        stack.extend(branches.into_iter().rev().map(|c| (c, Some(id))));
    }

    if placed != samples.len() {
        return Err(TraceError::InvalidState(format!(
            "{} samples are not reachable from a root",
            samples.len() - placed
        )));
    }
    Ok(forest)
}

/// Load a forest from an SWC file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Forest> {
    from_reader(BufReader::new(File::open(path)?))
}

/// Save a forest to an SWC file.
pub fn save<P: AsRef<Path>>(forest: &Forest, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    to_writer(forest, &mut writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(first: usize, n: usize, start: [f64; 3], step: [f64; 3]) -> Vec<TraceBit> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                TraceBit::new(
                    Marker::new(first + i),
                    Point3::new(start[0] + step[0] * t, start[1] + step[1] * t, start[2] + step[2] * t),
                    0.5,
                )
            })
            .collect()
    }

    fn write(forest: &Forest) -> String {
        let mut out = Vec::new();
        to_writer(forest, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_rows_and_parents() {
        let mut forest = Forest::new();
        let root = forest.add_root(bits(0, 2, [0.0; 3], [1.0, 0.0, 0.0])).unwrap();
        forest.add_child(root, bits(5, 1, [2.0, 1.0, 0.0], [0.0; 3])).unwrap();
        let text = write(&forest);
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(rows, vec!["1 0 0 0 0 0.5 -1", "2 0 1 0 0 0.5 1", "6 0 2 1 0 0.5 2"]);
    }

    #[test]
    fn test_branching_round_trip() {
        let mut forest = Forest::new();
        let root = forest.add_root(bits(0, 4, [0.0; 3], [1.0, 0.0, 0.0])).unwrap();
        forest.add_child(root, bits(10, 3, [4.0, 1.0, 0.0], [1.0, 1.0, 0.0])).unwrap();
        forest.add_child(root, bits(20, 3, [4.0, -1.0, 0.0], [1.0, -1.0, 0.0])).unwrap();
        forest.add_root(bits(30, 2, [0.0, 9.0, 0.0], [0.0, 1.0, 0.0])).unwrap();

        let loaded = from_reader(write(&forest).as_bytes()).unwrap();
        loaded.validate().unwrap();
        assert_eq!(loaded.num_lines(), 4);
        assert_eq!(loaded.roots().len(), 2);
        let summary = |f: &Forest| -> Vec<Vec<Marker>> {
            f.pre_order()
                .into_iter()
                .map(|id| f.line(id).unwrap().markers().collect())
                .collect()
        };
        assert_eq!(summary(&loaded), summary(&forest));
    }

    #[test]
    fn test_single_child_is_joined() {
        let mut forest = Forest::new();
        let root = forest.add_root(bits(0, 3, [0.0; 3], [1.0, 0.0, 0.0])).unwrap();
        forest.add_child(root, bits(3, 3, [3.0, 0.0, 0.0], [1.0, 0.0, 0.0])).unwrap();
        let loaded = from_reader(write(&forest).as_bytes()).unwrap();
        assert_eq!(loaded.num_lines(), 1);
        assert_eq!(loaded.num_bits(), 6);
    }

    #[test]
    fn test_parse_errors() {
        let err = from_reader("1 0 0 0 zero 1 -1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TraceError::Parse { line_number: 1, .. }));

        let err = from_reader("# header\n1 0 0 0 0 1 -1\n2 0 1 0 0 1 9\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TraceError::InvalidState(_)));

        let err = from_reader("1 0 0 0 0 1 2\n2 0 1 0 0 1 1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TraceError::InvalidState(_)));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.swc");
        let mut forest = Forest::new();
        forest.add_root(bits(0, 5, [0.0; 3], [0.5, 0.25, 0.0])).unwrap();
        save(&forest, &path).unwrap();
        assert_eq!(load(&path).unwrap(), forest);
    }
}
