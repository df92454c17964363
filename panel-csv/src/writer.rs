use std::fs::File;
use std::io::Write;
use std::path::Path;

use panel_core::{PanelError, PanelRow};

use crate::sources::csv_error;

/// Write the header and one record per row with CRLF terminators.
/// Returns the number of data rows written.
pub fn write_panel<W: Write>(writer: W, rows: &[PanelRow]) -> Result<usize, PanelError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(writer);

    writer.write_record(PanelRow::header()).map_err(csv_error)?;
    for row in rows {
        writer.write_record(row.values()).map_err(csv_error)?;
    }
    writer.flush()?;

    Ok(rows.len())
}

/// Create `path` and write the panel into it. An empty panel is refused
/// before the file is touched.
pub fn write_panel_file(path: &Path, rows: &[PanelRow]) -> Result<usize, PanelError> {
    if rows.is_empty() {
        return Err(PanelError::EmptyAnchorSet);
    }
    let file = File::create(path)
        .map_err(|err| PanelError::Io(format!("{}: {err}", path.display())))?;
    write_panel(file, rows)
}
