//! Message input: hex on the command line, hex on stdin, or a raw file.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Where to read one message from.
#[derive(clap::Args)]
pub struct InputArgs {
    /// Message bytes in hex (spaces and a leading 0x allowed), or `-` to
    /// read hex from stdin.
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    hex: Option<String>,

    /// Read raw message bytes from a file.
    #[arg(short, long)]
    file: Option<PathBuf>,
}

impl InputArgs {
    /// Reads the message bytes.
    pub fn read(&self) -> Result<Vec<u8>> {
        if let Some(path) = &self.file {
            return std::fs::read(path).with_context(|| format!("reading {}", path.display()));
        }
        match self.hex.as_deref() {
            Some("-") => {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .context("reading stdin")?;
                parse_hex(&text)
            }
            Some(text) => parse_hex(text),
            None => anyhow::bail!("no input given"),
        }
    }
}

/// Parses hex text, ignoring whitespace and an optional `0x` prefix.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.split_whitespace().collect();
    let digits = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);
    hex::decode(digits).context("invalid hex input")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn hex_with_spacing() {
        assert_eq!(parse_hex("ff 00").unwrap(), [0xFF, 0x00]);
        assert_eq!(parse_hex("0x0209\n000000000000002a").unwrap().len(), 10);
        assert!(parse_hex("zz").is_err());
        assert!(parse_hex("abc").is_err());
    }

    #[test]
    fn reads_raw_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xFF, 0x00]).unwrap();
        let args = InputArgs {
            hex: None,
            file: Some(file.path().to_path_buf()),
        };
        assert_eq!(args.read().unwrap(), [0xFF, 0x00]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = InputArgs {
            hex: None,
            file: Some(dir.path().join("absent.bin")),
        };
        let err = args.read().unwrap_err();
        assert!(err.to_string().starts_with("reading "));
    }
}
