use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ReportError;
use crate::tabulate::{MonthlyReport, ReportYear, Section, MONTHS};

/// Label column + 12 months + Total.
pub const COLUMNS: usize = 14;

const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Number(u32),
}

impl Cell {
    fn text(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(value) => write!(f, "{value}"),
        }
    }
}

/// An empty row is a section separator.
pub type SheetRow = Vec<Cell>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }
}

pub fn file_name(year: ReportYear, format: ExportFormat) -> String {
    format!("ALO_Performance_Report_{year}.{}", format.extension())
}

pub fn layout(report: &MonthlyReport) -> Vec<SheetRow> {
    let mut rows = Vec::new();

    for (index, section) in Section::ALL.into_iter().enumerate() {
        if index > 0 {
            rows.push(Vec::new());
        }

        let mut header = vec![Cell::text(section.title())];
        header.extend(MONTHS.iter().map(|month| Cell::text(month)));
        header.push(Cell::text("Total"));
        rows.push(header);

        for row in report.section(section) {
            let mut cells = vec![Cell::text(row.category)];
            cells.extend(row.months.iter().map(|count| Cell::Number(*count)));
            cells.push(Cell::Number(row.total()));
            rows.push(cells);
        }
    }

    rows
}

pub fn export(
    report: &MonthlyReport,
    format: ExportFormat,
    dir: &Path,
) -> Result<PathBuf, ReportError> {
    let path = dir.join(file_name(report.year, format));
    let rows = layout(report);

    match format {
        ExportFormat::Csv => write_csv(&rows, File::create(&path)?)?,
        ExportFormat::Xlsx => write_xlsx(&rows, &format!("Report {}", report.year), &path)?,
    }

    tracing::info!(path = %path.display(), rows = rows.len(), "exported monthly report");
    Ok(path)
}

pub fn write_csv<W: Write>(rows: &[SheetRow], writer: W) -> Result<(), ReportError> {
    let mut csv = csv::Writer::from_writer(writer);

    for row in rows {
        let mut fields: Vec<String> = row.iter().map(Cell::to_string).collect();
        fields.resize(COLUMNS, String::new());
        csv.write_record(&fields)?;
    }

    csv.flush()?;
    Ok(())
}

pub fn write_xlsx(rows: &[SheetRow], sheet_name: &str, path: &Path) -> Result<(), ReportError> {
    let mut zip = ZipWriter::new(File::create(path)?);

    for (name, contents) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
    ] {
        zip.start_file(name, entry_options())?;
        zip.write_all(contents.as_bytes())?;
    }

    zip.start_file("xl/workbook.xml", entry_options())?;
    zip.write_all(&workbook_xml(sheet_name)?)?;

    zip.start_file("xl/worksheets/sheet1.xml", entry_options())?;
    zip.write_all(&sheet_xml(rows)?)?;

    zip.finish()?;
    Ok(())
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

fn workbook_xml(sheet_name: &str) -> Result<Vec<u8>, ReportError> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    writer.write_event(Event::Start(BytesStart::new("workbook").with_attributes([
        ("xmlns", SPREADSHEET_NS),
        ("xmlns:r", RELATIONSHIPS_NS),
    ])))?;
    writer.write_event(Event::Start(BytesStart::new("sheets")))?;
    writer.write_event(Event::Empty(BytesStart::new("sheet").with_attributes([
        ("name", sheet_name),
        ("sheetId", "1"),
        ("r:id", "rId1"),
    ])))?;
    writer.write_event(Event::End(BytesEnd::new("sheets")))?;
    writer.write_event(Event::End(BytesEnd::new("workbook")))?;
    Ok(writer.into_inner())
}

fn sheet_xml(rows: &[SheetRow]) -> Result<Vec<u8>, ReportError> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    writer.write_event(Event::Start(
        BytesStart::new("worksheet").with_attributes([("xmlns", SPREADSHEET_NS)]),
    ))?;
    writer.write_event(Event::Start(BytesStart::new("sheetData")))?;

    for (index, row) in rows.iter().enumerate() {
        // Blank separators are simply rows with no <row> element.
        if row.is_empty() {
            continue;
        }

        let row_number = (index + 1).to_string();
        writer.write_event(Event::Start(
            BytesStart::new("row").with_attributes([("r", row_number.as_str())]),
        ))?;

        for (column, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column_name(column), row_number);
            match cell {
                Cell::Text(text) => {
                    writer.write_event(Event::Start(BytesStart::new("c").with_attributes([
                        ("r", reference.as_str()),
                        ("t", "inlineStr"),
                    ])))?;
                    writer.write_event(Event::Start(BytesStart::new("is")))?;
                    writer.write_event(Event::Start(BytesStart::new("t")))?;
                    writer.write_event(Event::Text(BytesText::new(text)))?;
                    writer.write_event(Event::End(BytesEnd::new("t")))?;
                    writer.write_event(Event::End(BytesEnd::new("is")))?;
                }
                Cell::Number(value) => {
                    writer.write_event(Event::Start(
                        BytesStart::new("c").with_attributes([("r", reference.as_str())]),
                    ))?;
                    writer.write_event(Event::Start(BytesStart::new("v")))?;
                    writer.write_event(Event::Text(BytesText::new(&value.to_string())))?;
                    writer.write_event(Event::End(BytesEnd::new("v")))?;
                }
            }
            writer.write_event(Event::End(BytesEnd::new("c")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("row")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
    writer.write_event(Event::End(BytesEnd::new("worksheet")))?;
    Ok(writer.into_inner())
}

/// Spreadsheet column letters for a zero-based index: 0 → A, 26 → AA.
fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}
