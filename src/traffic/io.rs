use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use itertools::Itertools;
use tracing::info;

use crate::traffic::events::EventType;
use crate::traffic::system::TrafficSystem;
use crate::traffic::{Result, TrafficError};

/// Flat-text persistence. The field layout is an external contract shared
/// with the presentation layers:
///
/// Network file: vertex count, space-separated vertex labels, edge count,
/// then one `u v base_weight` line per edge.
///
/// Events file: event count, then one `id timestamp type u-v delta` line per
/// event in chronological order.
pub fn save(system: &TrafficSystem, network_path: &Path, events_path: &Path) -> Result<()> {
    let network = system.network();

    let mut writer = BufWriter::new(File::create(network_path)?);
    writeln!(writer, "{}", network.vertex_count())?;
    writeln!(writer, "{}", network.vertices().join(" "))?;
    writeln!(writer, "{}", network.edge_count())?;
    for edge in network.edges() {
        let (u, v) = edge.key.endpoints();
        writeln!(writer, "{} {} {}", u, v, edge.base_weight)?;
    }
    writer.flush()?;

    let events = system.active_events();
    let mut writer = BufWriter::new(File::create(events_path)?);
    writeln!(writer, "{}", events.len())?;
    for event in &events {
        writeln!(
            writer,
            "{} {} {} {} {}",
            event.id, event.timestamp, event.event_type, event.edge, event.delta
        )?;
    }
    writer.flush()?;

    info!(
        vertices = network.vertex_count(),
        edges = network.edge_count(),
        events = events.len(),
        "saved system state"
    );
    Ok(())
}

/// Rebuilds a system from the flat-text files. Events are replayed through
/// the regular registration path, so the current weights are reconstructed
/// from base weights plus deltas instead of being trusted from the file.
/// A missing events file yields an empty index.
pub fn load(network_path: &Path, events_path: &Path) -> Result<TrafficSystem> {
    let mut system = TrafficSystem::new();

    let mut lines = LineReader::new(network_path)?;
    let vertex_count: usize = lines.parse_next("vertex count")?;
    let vertex_line = lines.next_line()?;
    let vertices: Vec<&str> = vertex_line.split_whitespace().collect();
    if vertices.len() != vertex_count {
        return Err(lines.error(format!(
            "expected {} vertices, found {}",
            vertex_count,
            vertices.len()
        )));
    }
    for vertex in vertices {
        system.add_vertex(vertex)?;
    }

    let edge_count: usize = lines.parse_next("edge count")?;
    for _ in 0..edge_count {
        let line = lines.next_line()?;
        let mut fields = line.split_whitespace();
        let (Some(u), Some(v), Some(weight), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(lines.error("expected 'u v base_weight'".to_string()));
        };
        let weight: f64 = lines.parse_field(weight, "base weight")?;
        system.add_edge(u, v, weight)?;
    }

    if events_path.exists() {
        let mut lines = LineReader::new(events_path)?;
        let event_count: usize = lines.parse_next("event count")?;
        for _ in 0..event_count {
            let line = lines.next_line()?;
            let mut fields = line.split_whitespace();
            let (Some(id), Some(timestamp), Some(event_type), Some(location), Some(delta), None) = (
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
            ) else {
                return Err(lines.error("expected 'id timestamp type u-v delta'".to_string()));
            };
            let Some((u, v)) = location.split_once('-') else {
                return Err(lines.error(format!("invalid edge reference '{location}'")));
            };
            let event = crate::traffic::events::Event {
                id: lines.parse_field(id, "event id")?,
                timestamp: lines.parse_field(timestamp, "timestamp")?,
                event_type: lines.parse_field::<EventType>(event_type, "event type")?,
                edge: crate::traffic::network::EdgeKey::new(u, v),
                delta: lines.parse_field(delta, "delta")?,
            };
            system.restore_event(event)?;
        }
    }

    info!(
        vertices = system.network().vertex_count(),
        edges = system.network().edge_count(),
        events = system.active_event_count(),
        "loaded system state"
    );
    Ok(system)
}

/// Buffered line reader that tracks the current line number for error
/// reporting.
struct LineReader {
    lines: std::io::Lines<BufReader<File>>,
    line: usize,
}

impl LineReader {
    fn new(path: &Path) -> Result<Self> {
        Ok(LineReader {
            lines: BufReader::new(File::open(path)?).lines(),
            line: 0,
        })
    }

    fn next_line(&mut self) -> Result<String> {
        self.line += 1;
        match self.lines.next() {
            Some(line) => Ok(line?),
            None => Err(self.error("unexpected end of file".to_string())),
        }
    }

    fn parse_next<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let line = self.next_line()?;
        self.parse_field(line.trim(), what)
    }

    fn parse_field<T: FromStr>(&self, field: &str, what: &str) -> Result<T> {
        field
            .parse()
            .map_err(|_| self.error(format!("invalid {what} '{field}'")))
    }

    fn error(&self, reason: String) -> TrafficError {
        TrafficError::Parse {
            line: self.line,
            reason,
        }
    }
}
