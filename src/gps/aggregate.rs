// src/gps/aggregate.rs
//! Grouping of classified lines into data blocks

use log::warn;
use serde::Serialize;

use super::classify::{classify_line, LineKind, Unrecognized};
use super::record::{CoordinatePoint, DataBlock, RecordHeader};

/// Data-quality counters collected during one aggregation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Lines that could not be used, including unknown header kinds.
    pub unrecognized_lines: usize,
    /// Points seen while no header was open.
    pub orphaned_points: usize,
    /// Header-shaped lines with an unknown letter pair.
    pub unknown_headers: usize,
    /// Blocks whose point count differs from the header's declared count.
    pub count_mismatches: usize,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        self.unrecognized_lines == 0 && self.orphaned_points == 0
    }
}

/// Result of aggregating one export.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseOutcome {
    pub blocks: Vec<DataBlock>,
    /// Points that arrived before any header, in arrival order.
    pub orphaned_points: Vec<CoordinatePoint>,
    pub diagnostics: Diagnostics,
}

impl ParseOutcome {
    pub fn total_points(&self) -> usize {
        self.blocks.iter().map(|b| b.points().len()).sum::<usize>() + self.orphaned_points.len()
    }

    /// Every point in transmission order of blocks, then the orphans.
    pub fn all_points(&self) -> impl Iterator<Item = &CoordinatePoint> {
        self.blocks
            .iter()
            .flat_map(|b| b.points().iter())
            .chain(self.orphaned_points.iter())
    }
}

/// Decode raw export bytes leniently and aggregate them.
pub fn aggregate_bytes(data: &[u8]) -> ParseOutcome {
    aggregate(&String::from_utf8_lossy(data))
}

/// Aggregate export text into data blocks.
///
/// Never fails: anything unusable is counted in the diagnostics and skipped.
pub fn aggregate(text: &str) -> ParseOutcome {
    let mut builder = BlockBuilder::default();

    for (index, line) in text.split('\n').enumerate() {
        let line_no = index + 1;
        match classify_line(line) {
            LineKind::Header(header) => builder.open(header),
            LineKind::Point(point) => builder.push(point, line_no),
            LineKind::Separator => builder.close(),
            LineKind::Blank => {}
            LineKind::Unrecognized(Unrecognized::UnknownHeaderKind { first, second }) => {
                warn!("line {line_no}: unknown header kind ({first},{second}), block skipped");
                builder.outcome.diagnostics.unrecognized_lines += 1;
                builder.outcome.diagnostics.unknown_headers += 1;
                builder.close();
            }
            LineKind::Unrecognized(reason) => {
                warn!("line {line_no}: skipping unrecognized line {:?} ({reason:?})", line.trim());
                builder.outcome.diagnostics.unrecognized_lines += 1;
            }
        }
    }

    builder.finish()
}

#[derive(Default)]
struct BlockBuilder {
    current: Option<(RecordHeader, Vec<CoordinatePoint>)>,
    outcome: ParseOutcome,
}

impl BlockBuilder {
    fn open(&mut self, header: RecordHeader) {
        self.close();
        self.current = Some((header, Vec::new()));
    }

    fn push(&mut self, point: CoordinatePoint, line_no: usize) {
        match self.current.as_mut() {
            Some((_, points)) => points.push(point),
            None => {
                if self.outcome.orphaned_points.is_empty() {
                    warn!("line {line_no}: coordinate with no open header");
                }
                self.outcome.orphaned_points.push(point);
                self.outcome.diagnostics.orphaned_points += 1;
            }
        }
    }

    fn close(&mut self) {
        let Some((header, points)) = self.current.take() else {
            return;
        };
        let block = DataBlock::new(header, points);
        if !block.count_matches_declared() {
            warn!(
                "{}: header declares {} points, received {}",
                block.header().label(),
                block.header().total_count,
                block.points().len()
            );
            self.outcome.diagnostics.count_mismatches += 1;
        }
        self.outcome.blocks.push(block);
    }

    fn finish(mut self) -> ParseOutcome {
        self.close();
        let orphans = self.outcome.orphaned_points.len();
        if orphans > 1 {
            warn!("{orphans} coordinates in total arrived with no open header");
        }
        self.outcome
    }
}
