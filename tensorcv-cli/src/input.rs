// Descriptor files given on the command line

use anyhow::{bail, Context};
use clap::ValueEnum;
use std::path::Path;
use tensorcv_core::DescriptorSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// Pick by file extension: `.json` is JSON, anything else raw bytes
    Auto,
    /// Concatenated fixed-width descriptors
    Raw,
    /// Array of byte arrays, one per descriptor
    Json,
}

impl InputFormat {
    fn resolve(self, path: &Path) -> InputFormat {
        match self {
            InputFormat::Auto => match path.extension().and_then(|e| e.to_str()) {
                Some(ext) if ext.eq_ignore_ascii_case("json") => InputFormat::Json,
                _ => InputFormat::Raw,
            },
            other => other,
        }
    }
}

pub fn read_descriptors(
    path: &Path,
    format: InputFormat,
    bytes_per_descriptor: usize,
) -> anyhow::Result<DescriptorSet> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let set = match format.resolve(path) {
        InputFormat::Json => parse_json(&bytes, bytes_per_descriptor)?,
        _ => DescriptorSet::new(bytes, bytes_per_descriptor)?,
    };
    tracing::debug!(
        path = %path.display(),
        rows = set.len(),
        bytes = set.bytes_per_descriptor(),
        "loaded descriptors"
    );
    Ok(set)
}

/// Rows of a JSON array of byte arrays. An empty array takes
/// `bytes_per_descriptor` as its width.
fn parse_json(bytes: &[u8], bytes_per_descriptor: usize) -> anyhow::Result<DescriptorSet> {
    let rows: Vec<Vec<u8>> = serde_json::from_slice(bytes).context("descriptor JSON")?;
    let width = match rows.first() {
        Some(first) => first.len(),
        None => bytes_per_descriptor,
    };
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        bail!("descriptor {} has {} bytes, expected {}", i, row.len(), width);
    }
    Ok(DescriptorSet::from_rows(width, &rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_json_descriptors() {
        let set = parse_json(b"[[1,2,3,4,5,6,7,8],[0,0,0,0,0,0,0,255]]", 64).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.bytes_per_descriptor(), 8);
        assert_eq!(set.row(1).unwrap()[7], 255);
    }

    #[test]
    fn test_json_ragged_rows_rejected() {
        assert!(parse_json(b"[[1,2,3,4,5,6,7,8],[1]]", 8).is_err());
    }

    #[test]
    fn test_empty_json_uses_default_width() {
        let set = parse_json(b"[]", 32).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.bytes_per_descriptor(), 32);
    }

    #[test]
    fn test_raw_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 32]).unwrap();
        let set = read_descriptors(file.path(), InputFormat::Auto, 16).unwrap();
        assert_eq!(set.len(), 2);
        assert!(read_descriptors(file.path(), InputFormat::Raw, 24).is_err());
    }
}
