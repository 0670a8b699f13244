use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::workbook::Worksheet;

pub fn save_worksheets(sheets: &[Worksheet], filename: &Path) -> std::io::Result<()> {
    // Write next to the target and rename, so a crash never leaves half a workbook.
    let tmp = filename.with_extension("tmp");
    {
        let file = File::create(&tmp)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut writer = std::io::BufWriter::new(encoder);

        serialize_into(&mut writer, sheets)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        let encoder = writer.into_inner().map_err(|e| e.into_error())?;
        encoder.finish()?.flush()?;
    }
    std::fs::rename(&tmp, filename)
}

pub fn load_worksheets(filename: &Path) -> std::io::Result<Vec<Worksheet>> {
    let file = File::open(filename)?;
    let decoder = GzDecoder::new(file);
    let mut reader = std::io::BufReader::new(decoder);

    let sheets: Vec<Worksheet> = deserialize_from(&mut reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    Ok(sheets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worksheets_survive_a_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock.bin.gz");
        let sheets = vec![Worksheet {
            title: "Stock".to_string(),
            rows: vec![
                vec!["No".to_string(), "Item Name".to_string()],
                vec!["1".to_string(), "Anemometer".to_string()],
            ],
        }];

        save_worksheets(&sheets, &path).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let loaded = load_worksheets(&path).unwrap();
        assert_eq!(loaded, sheets);
    }

    #[test]
    fn garbage_file_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.bin.gz");
        std::fs::write(&path, b"not gzip at all").unwrap();

        let err = load_worksheets(&path).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::InvalidData | std::io::ErrorKind::InvalidInput
        ));
    }
}
