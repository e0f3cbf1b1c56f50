// src/display/terminal.rs
//! Terminal summary of a download

use crate::{
    error::Result,
    gps::{DataBlock, ParseOutcome},
    session::Capture,
};
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::Write;
use std::path::PathBuf;

pub struct TerminalDisplay;

impl TerminalDisplay {
    pub fn new() -> Self {
        Self
    }

    /// Render the capture statistics, parsed blocks, diagnostics and files.
    pub fn render_summary(
        &self,
        out: &mut impl Write,
        capture: Option<&Capture>,
        outcome: Option<&ParseOutcome>,
        files: &[PathBuf],
    ) -> Result<()> {
        execute!(
            out,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\nWanggan GPS Download Summary\n"),
            Print("=".repeat(60)),
            Print("\n"),
            ResetColor
        )?;

        if let Some(capture) = capture {
            self.render_capture_section(out, capture)?;
        }
        if let Some(outcome) = outcome {
            self.render_blocks_section(out, outcome)?;
            self.render_diagnostics_section(out, outcome)?;
        }
        self.render_files_section(out, files)?;

        execute!(
            out,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            ResetColor
        )?;
        out.flush()?;
        Ok(())
    }

    fn render_capture_section(&self, out: &mut impl Write, capture: &Capture) -> Result<()> {
        execute!(
            out,
            SetForegroundColor(Color::Yellow),
            Print("DOWNLOAD:\n"),
            ResetColor,
            Print(format!("  Mode:      {} (0x{:02X})\n", capture.mode.name(), capture.mode.byte())),
            Print(format!("  Received:  {} bytes in {} chunks\n", capture.data.len(), capture.chunks)),
            Print(format!(
                "  Duration:  {:.1} s ({:?})\n\n",
                capture.elapsed.as_secs_f64(),
                capture.stop_reason
            ))
        )?;
        Ok(())
    }

    fn render_blocks_section(&self, out: &mut impl Write, outcome: &ParseOutcome) -> Result<()> {
        execute!(
            out,
            SetForegroundColor(Color::Cyan),
            Print(format!("RECORDS ({}):\n", outcome.blocks.len())),
            ResetColor
        )?;

        for block in &outcome.blocks {
            execute!(out, Print(format!("  {}\n", Self::block_line(block))))?;
        }
        if !outcome.orphaned_points.is_empty() {
            execute!(
                out,
                Print(format!("  Headerless  {:>5} points\n", outcome.orphaned_points.len()))
            )?;
        }

        execute!(out, Print("\n"))?;
        Ok(())
    }

    fn render_diagnostics_section(&self, out: &mut impl Write, outcome: &ParseOutcome) -> Result<()> {
        let diag = &outcome.diagnostics;
        if diag.is_clean() && diag.count_mismatches == 0 {
            return Ok(());
        }

        execute!(
            out,
            SetForegroundColor(Color::Magenta),
            Print("WARNINGS:\n"),
            ResetColor
        )?;
        if diag.unrecognized_lines > 0 {
            execute!(
                out,
                Print(format!("  {} lines could not be parsed\n", diag.unrecognized_lines))
            )?;
        }
        if diag.unknown_headers > 0 {
            execute!(
                out,
                Print(format!("  {} headers of unknown type were skipped\n", diag.unknown_headers))
            )?;
        }
        if diag.orphaned_points > 0 {
            execute!(
                out,
                Print(format!("  {} points arrived without a header\n", diag.orphaned_points))
            )?;
        }
        if diag.count_mismatches > 0 {
            execute!(
                out,
                Print(format!(
                    "  {} records differ from their declared point count\n",
                    diag.count_mismatches
                ))
            )?;
        }
        execute!(out, Print("\n"))?;
        Ok(())
    }

    fn render_files_section(&self, out: &mut impl Write, files: &[PathBuf]) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        execute!(
            out,
            SetForegroundColor(Color::Blue),
            Print(format!("FILES ({}):\n", files.len())),
            ResetColor
        )?;
        for file in files {
            execute!(out, Print(format!("  {}\n", file.display())))?;
        }
        execute!(out, Print("\n"))?;
        Ok(())
    }

    fn block_line(block: &DataBlock) -> String {
        let header = block.header();
        format!(
            "{:<9} n{:04}  {}  {:>5}/{:<5} points",
            header.kind.name(),
            header.sequence_number,
            header.timestamp.format("%Y-%m-%d %H:%M"),
            block.points().len(),
            header.total_count
        )
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::aggregate;

    #[test]
    fn test_summary_lists_blocks_and_warnings() {
        let outcome = aggregate(
            "n0014,m0000019335,l0000006404;t202510241534,N0004\n\
-008d35'22.330\",+41d06'50.109\",01796;\n\
garbled\n!\n",
        );
        let mut buf = Vec::new();
        TerminalDisplay::new()
            .render_summary(&mut buf, None, Some(&outcome), &[PathBuf::from("out/area.kml")])
            .unwrap();
        let text = String::from_utf8_lossy(&buf);

        assert!(text.contains("RECORDS (1):"));
        assert!(text.contains("Area      n0014  2025-10-24 15:34      1/4     points"));
        assert!(text.contains("1 lines could not be parsed"));
        assert!(text.contains("1 records differ from their declared point count"));
        assert!(text.contains("out/area.kml"));
    }

    #[test]
    fn test_clean_summary_has_no_warnings() {
        let outcome = aggregate(
            "n0001,p0000000000,p0000000000;t202510250039,N0001\n\
+008d00'00.0\",+41d00'00.0\",00010;\n",
        );
        let mut buf = Vec::new();
        TerminalDisplay::new()
            .render_summary(&mut buf, None, Some(&outcome), &[])
            .unwrap();
        let text = String::from_utf8_lossy(&buf);
        assert!(!text.contains("WARNINGS"));
        assert!(!text.contains("FILES"));
    }
}
