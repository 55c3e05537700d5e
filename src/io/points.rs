//! Plain-text skeleton point lists.
//!
//! One point per line as `x y z [radius [cost]]`, whitespace or comma
//! separated. Blank lines and lines starting with `#` are ignored. Markers
//! are assigned in file order starting at 0.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Point3;

use crate::error::{Result, TraceError};
use crate::geometry::{GeometryStore, SkeletonPoint};

/// Read skeleton points.
pub fn from_reader<R: BufRead>(reader: R) -> Result<GeometryStore> {
    let mut store = GeometryStore::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = index + 1;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let values = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|f| !f.is_empty())
            .map(|f| {
                f.parse::<f64>().map_err(|_| TraceError::Parse {
                    line_number,
                    message: format!("invalid number '{}'", f),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        let (position, radius, cost) = match values[..] {
            [x, y, z] => (Point3::new(x, y, z), 0.0, 1.0),
            [x, y, z, r] => (Point3::new(x, y, z), r, 1.0),
            [x, y, z, r, c] => (Point3::new(x, y, z), r, c),
            _ => {
                return Err(TraceError::Parse {
                    line_number,
                    message: format!("expected 3 to 5 values, found {}", values.len()),
                })
            }
        };
        let point = SkeletonPoint::new(store.next_marker(), position)
            .with_radius(radius)
            .with_cost(cost);
        store.insert(point)?;
    }
    log::debug!("read {} skeleton points", store.len());
    Ok(store)
}

/// Write skeleton points as `x y z radius cost`.
pub fn to_writer<W: Write>(store: &GeometryStore, mut writer: W) -> Result<()> {
    for p in store.iter() {
        writeln!(
            writer,
            "{} {} {} {} {}",
            p.position.x, p.position.y, p.position.z, p.radius, p.cost
        )?;
    }
    Ok(())
}

/// Load skeleton points from a file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<GeometryStore> {
    from_reader(BufReader::new(File::open(path)?))
}

/// Save skeleton points to a file.
pub fn save<P: AsRef<Path>>(store: &GeometryStore, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    to_writer(store, &mut writer)?;
    writer.flush()?;
    Ok(())
}
