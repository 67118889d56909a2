//! File download side effect for analytics exports.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use omnilead_shared::types::ExportFormat;

/// Write an exported report to `dir` as `analytics_<days>days.<ext>` and
/// return the full path. Touches nothing but the filesystem.
pub fn write_report(
    dir: &Path,
    format: ExportFormat,
    days: u32,
    bytes: &[u8],
) -> io::Result<PathBuf> {
    let path = dir.join(format!("analytics_{days}days.{}", format.extension()));
    fs::write(&path, bytes)?;
    info!(path = %path.display(), size = bytes.len(), "Analytics report written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_filename_includes_period_and_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_report(dir.path(), ExportFormat::Csv, 30, b"id,channel\n").unwrap();

        assert_eq!(path.file_name().unwrap(), "analytics_30days.csv");
        assert_eq!(fs::read(&path).unwrap(), b"id,channel\n");
    }

    #[test]
    fn xlsx_and_pdf_use_their_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_report(dir.path(), ExportFormat::Xlsx, 7, &[0x50, 0x4b]).unwrap();
        assert_eq!(path.file_name().unwrap(), "analytics_7days.xlsx");

        let path = write_report(dir.path(), ExportFormat::Pdf, 90, b"%PDF").unwrap();
        assert_eq!(path.file_name().unwrap(), "analytics_90days.pdf");
    }
}
