// src/export.rs
//! Conversion of parsed exports to GPX, KML, CSV and raw text files

use crate::error::{GpsError, Result};
use crate::gps::{CoordinatePoint, DataBlock, ParseOutcome, RecordKind};
use chrono::NaiveDateTime;
use log::info;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Gpx,
    Kml,
    Csv,
    /// The bytes exactly as received from the device.
    Raw,
}

impl OutputFormat {
    pub fn extension(&self) -> &str {
        match self {
            OutputFormat::Gpx => "gpx",
            OutputFormat::Kml => "kml",
            OutputFormat::Csv => "csv",
            OutputFormat::Raw => "txt",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            OutputFormat::Gpx => "GPX (GPS Exchange)",
            OutputFormat::Kml => "KML (Keyhole)",
            OutputFormat::Csv => "CSV",
            OutputFormat::Raw => "Raw text",
        }
    }
}

/// One output document: a named run of points.
struct Document<'a> {
    name: String,
    timestamp: Option<NaiveDateTime>,
    kind: Option<RecordKind>,
    points: &'a [CoordinatePoint],
}

impl<'a> Document<'a> {
    fn from_block(block: &'a DataBlock) -> Self {
        Self {
            name: block.header().label(),
            timestamp: Some(block.header().timestamp),
            kind: Some(block.kind()),
            points: block.points(),
        }
    }

    fn untitled(name: &str, points: &'a [CoordinatePoint]) -> Self {
        Self {
            name: name.to_string(),
            timestamp: None,
            kind: None,
            points,
        }
    }

    fn render(&self, format: Rendered) -> String {
        match format {
            Rendered::Gpx => to_gpx(self),
            Rendered::Kml => to_kml(self),
            Rendered::Csv => to_csv(self.points),
        }
    }
}

/// Formats built from parsed points, as opposed to the raw passthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rendered {
    Gpx,
    Kml,
    Csv,
}

impl Rendered {
    fn from_format(format: OutputFormat) -> Option<Self> {
        match format {
            OutputFormat::Gpx => Some(Rendered::Gpx),
            OutputFormat::Kml => Some(Rendered::Kml),
            OutputFormat::Csv => Some(Rendered::Csv),
            OutputFormat::Raw => None,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Rendered::Gpx => "gpx",
            Rendered::Kml => "kml",
            Rendered::Csv => "csv",
        }
    }
}

/// Writes parsed exports to an output directory.
#[derive(Debug, Clone)]
pub struct TrackExporter {
    output_dir: PathBuf,
    filename_prefix: String,
    split_by_block: bool,
    auto_create_dir: bool,
}

impl TrackExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            filename_prefix: "track".to_string(),
            split_by_block: false,
            auto_create_dir: true,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.filename_prefix = prefix.into();
        self
    }

    /// Write one file per data block instead of one merged file.
    pub fn split_by_block(mut self, split: bool) -> Self {
        self.split_by_block = split;
        self
    }

    pub fn auto_create_dir(mut self, create: bool) -> Self {
        self.auto_create_dir = create;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Export in `format`; returns the files written.
    ///
    /// `raw` is only used for [`OutputFormat::Raw`], the other formats are
    /// rendered from `outcome`.
    pub fn export(&self, raw: &[u8], outcome: &ParseOutcome, format: OutputFormat) -> Result<Vec<PathBuf>> {
        self.prepare_dir()?;

        let Some(format) = Rendered::from_format(format) else {
            let name = format!("{}.{}", self.filename_prefix, format.extension());
            return Ok(vec![self.write(&name, raw)?]);
        };

        if outcome.total_points() == 0 {
            return Err(GpsError::Export("No coordinates to export".to_string()));
        }

        if self.split_by_block && !outcome.blocks.is_empty() {
            self.export_split(outcome, format)
        } else {
            self.export_merged(outcome, format)
        }
    }

    /// Save the bytes of a download under `filename`.
    pub fn save_raw(&self, filename: &str, raw: &[u8]) -> Result<PathBuf> {
        self.prepare_dir()?;
        self.write(filename, raw)
    }

    fn export_merged(&self, outcome: &ParseOutcome, format: Rendered) -> Result<Vec<PathBuf>> {
        let points: Vec<CoordinatePoint> = outcome.all_points().copied().collect();
        let document = Document::untitled("GPS Track", &points);
        let name = format!("{}.{}", self.filename_prefix, format.extension());
        Ok(vec![self.write(&name, document.render(format).as_bytes())?])
    }

    fn export_split(&self, outcome: &ParseOutcome, format: Rendered) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        let mut used = HashSet::new();

        for block in outcome.blocks.iter().filter(|b| !b.is_empty()) {
            let document = Document::from_block(block);
            let name = unique_name(&mut used, &block_file_stem(block), format.extension());
            created.push(self.write(&name, document.render(format).as_bytes())?);
        }

        if !outcome.orphaned_points.is_empty() {
            let document = Document::untitled("Headerless points", &outcome.orphaned_points);
            let stem = format!("{}_headerless", self.filename_prefix);
            let name = unique_name(&mut used, &stem, format.extension());
            created.push(self.write(&name, document.render(format).as_bytes())?);
        }

        Ok(created)
    }

    fn prepare_dir(&self) -> Result<()> {
        if self.auto_create_dir {
            fs::create_dir_all(&self.output_dir)?;
        }
        Ok(())
    }

    fn write(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.output_dir.join(name);
        fs::write(&path, content)?;
        info!("Saved {}", path.display());
        Ok(path)
    }
}

/// `stem.ext`, or `stem_2.ext`, `stem_3.ext`... when already taken in this run.
/// Sequence numbers repeat across records, so stems can collide.
fn unique_name(used: &mut HashSet<String>, stem: &str, extension: &str) -> String {
    let mut name = format!("{}.{}", stem, extension);
    let mut n = 1;
    while !used.insert(name.clone()) {
        n += 1;
        name = format!("{}_{}.{}", stem, n, extension);
    }
    name
}

/// `area_n0014_20251024_1534`
fn block_file_stem(block: &DataBlock) -> String {
    let header = block.header();
    format!(
        "{}_n{:04}_{}",
        header.kind.name().to_lowercase(),
        header.sequence_number,
        header.timestamp.format("%Y%m%d_%H%M")
    )
}

fn to_gpx(doc: &Document) -> String {
    let mut gpx = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="wanggan-gps"
  xmlns="http://www.topografix.com/GPX/1/1"
  xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
  xsi:schemaLocation="http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd">
"#,
    );
    let name = escape_xml(&doc.name);

    if doc.kind == Some(RecordKind::Waypoint) {
        for (i, p) in doc.points.iter().enumerate() {
            gpx.push_str(&format!(
                "  <wpt lat=\"{:.7}\" lon=\"{:.7}\">\n    <ele>{}</ele>\n    <name>{} #{}</name>\n  </wpt>\n",
                p.latitude,
                p.longitude,
                p.altitude,
                name,
                i + 1
            ));
        }
    } else {
        gpx.push_str(&format!("  <trk>\n    <name>{}</name>\n    <trkseg>\n", name));
        for p in doc.points {
            gpx.push_str(&format!(
                "      <trkpt lat=\"{:.7}\" lon=\"{:.7}\">\n        <ele>{}</ele>\n      </trkpt>\n",
                p.latitude, p.longitude, p.altitude
            ));
        }
        gpx.push_str("    </trkseg>\n  </trk>\n");
    }

    gpx.push_str("</gpx>\n");
    gpx
}

fn to_kml(doc: &Document) -> String {
    let display_name = match doc.timestamp {
        Some(ts) => format!("{} - {}", doc.name, ts.format("%Y-%m-%d %H:%M")),
        None => doc.name.clone(),
    };
    let display_name = escape_xml(&display_name);

    let mut kml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>{0}</name>
    <Placemark>
      <name>{0}</name>
"#,
        display_name
    );

    // Device clock, no zone information
    if let Some(ts) = doc.timestamp {
        kml.push_str(&format!(
            "      <TimeStamp>\n        <when>{}</when>\n      </TimeStamp>\n",
            ts.format("%Y-%m-%dT%H:%M:%S")
        ));
    }

    kml.push_str("      <LineString>\n        <coordinates>\n");
    for p in doc.points {
        kml.push_str(&format!(
            "          {:.7},{:.7},{}\n",
            p.longitude, p.latitude, p.altitude
        ));
    }
    kml.push_str("        </coordinates>\n      </LineString>\n    </Placemark>\n  </Document>\n</kml>\n");
    kml
}

fn to_csv(points: &[CoordinatePoint]) -> String {
    let mut csv = String::from("longitude,latitude,altitude\n");
    for p in points {
        csv.push_str(&format!("{:.7},{:.7},{}\n", p.longitude, p.latitude, p.altitude));
    }
    csv
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::aggregate;

    const TWO_BLOCKS: &str = "n0014,m0000019335,l0000006404;t202510241534,N0002\n\
-008d35'22.330\",+41d06'50.109\",01796;\n\
-008d35'23.00760\",+41d06'52.71840\",01761;\n\
!\n\
n0001,p0000000000,p0000000000;t202510250039,N0001\n\
-008d35'24.00000\",+41d06'53.00000\",01750;\n\
!\n\
n0002,k0000000001,l0000006404;t202510250100,N0000\n\
!\n";

    fn sample_points() -> Vec<CoordinatePoint> {
        vec![CoordinatePoint {
            longitude: -8.5895361,
            latitude: 41.1139192,
            altitude: 1796,
        }]
    }

    #[test]
    fn test_gpx_track() {
        let points = sample_points();
        let gpx = to_gpx(&Document::untitled("Area <14>", &points));
        assert!(gpx.contains("<gpx version=\"1.1\""));
        assert!(gpx.contains("<name>Area &lt;14&gt;</name>"));
        assert!(gpx.contains("<trkpt lat=\"41.1139192\" lon=\"-8.5895361\">"));
        assert!(gpx.contains("<ele>1796</ele>"));
        assert!(!gpx.contains("<wpt"));
    }

    #[test]
    fn test_gpx_waypoints() {
        let points = sample_points();
        let doc = Document {
            kind: Some(RecordKind::Waypoint),
            ..Document::untitled("Waypoint 1", &points)
        };
        let gpx = to_gpx(&doc);
        assert!(gpx.contains("<wpt lat=\"41.1139192\" lon=\"-8.5895361\">"));
        assert!(gpx.contains("<name>Waypoint 1 #1</name>"));
        assert!(!gpx.contains("<trk>"));
    }

    #[test]
    fn test_kml() {
        let outcome = aggregate(TWO_BLOCKS);
        let kml = to_kml(&Document::from_block(&outcome.blocks[0]));
        assert!(kml.contains("<name>Area 14 - 2025-10-24 15:34</name>"));
        assert!(kml.contains("<when>2025-10-24T15:34:00</when>"));
        assert!(kml.contains("          -8.5895361,41.1139192,1796\n"));
    }

    #[test]
    fn test_csv() {
        let csv = to_csv(&sample_points());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec!["longitude,latitude,altitude", "-8.5895361,41.1139192,1796"]);
    }

    #[test]
    fn test_split_export() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = aggregate(TWO_BLOCKS);
        let exporter = TrackExporter::new(dir.path()).split_by_block(true);

        let files = exporter.export(TWO_BLOCKS.as_bytes(), &outcome, OutputFormat::Kml).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        // the empty Track block is skipped
        assert_eq!(
            names,
            vec!["area_n0014_20251024_1534.kml", "waypoint_n0001_20251025_0039.kml"]
        );
        assert!(files.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_merged_export() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = aggregate(TWO_BLOCKS);
        let exporter = TrackExporter::new(dir.path().join("out")).with_prefix("all");

        let files = exporter.export(TWO_BLOCKS.as_bytes(), &outcome, OutputFormat::Csv).unwrap();
        assert_eq!(files, vec![dir.path().join("out").join("all.csv")]);

        let content = std::fs::read_to_string(&files[0]).unwrap();
        assert_eq!(content.lines().count(), 4);
    }

    #[test]
    fn test_raw_export_is_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let raw = b"\x01\x02not even text\xff";
        let exporter = TrackExporter::new(dir.path()).with_prefix("dump");

        let files = exporter.export(raw, &ParseOutcome::default(), OutputFormat::Raw).unwrap();
        assert_eq!(std::fs::read(&files[0]).unwrap(), raw);
        assert!(files[0].ends_with("dump.txt"));
    }

    #[test]
    fn test_headerless_dump_falls_back_to_merged() {
        let dir = tempfile::tempdir().unwrap();
        let text = "+008d00'00.0\",+41d00'00.0\",00010;\n+008d00'01.0\",+41d00'01.0\",00011;\n";
        let outcome = aggregate(text);
        let exporter = TrackExporter::new(dir.path()).split_by_block(true);

        let files = exporter.export(text.as_bytes(), &outcome, OutputFormat::Gpx).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("track.gpx"));
    }

    #[test]
    fn test_nothing_to_export() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = aggregate("!\n");
        let exporter = TrackExporter::new(dir.path());
        assert!(matches!(
            exporter.export(b"!\n", &outcome, OutputFormat::Gpx),
            Err(GpsError::Export(_))
        ));
    }

    #[test]
    fn test_split_export_keeps_blocks_with_the_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let text = "n0001,m0000019335,l0000006404;t202510241534,N0001\n\
+008d00'00.0\",+41d00'00.0\",00010;\n\
!\n\
n0001,m0000019335,l0000006404;t202510241534,N0001\n\
+009d00'00.0\",+42d00'00.0\",00020;\n\
!\n";
        let outcome = aggregate(text);
        let exporter = TrackExporter::new(dir.path()).split_by_block(true);

        let files = exporter.export(text.as_bytes(), &outcome, OutputFormat::Csv).unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join("area_n0001_20251024_1534.csv"),
                dir.path().join("area_n0001_20251024_1534_2.csv"),
            ]
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
        assert!(std::fs::read_to_string(&files[0]).unwrap().contains(",10\n"));
        assert!(std::fs::read_to_string(&files[1]).unwrap().contains(",20\n"));
    }

    #[test]
    fn test_unique_name() {
        let mut used = HashSet::new();
        assert_eq!(unique_name(&mut used, "a", "gpx"), "a.gpx");
        assert_eq!(unique_name(&mut used, "a", "gpx"), "a_2.gpx");
        assert_eq!(unique_name(&mut used, "a", "gpx"), "a_3.gpx");
        assert_eq!(unique_name(&mut used, "a", "kml"), "a.kml");
    }
}
