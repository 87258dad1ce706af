//! Entry-point discovery
//!
//! Reads exactly one entry (`META-INF/MANIFEST.MF`) out of the derived
//! artifact's ZIP container and one attribute out of the manifest's main
//! section. This is deliberately not a general archive reader.

use crate::error::{ContainerError, LaunchError};
use flate2::read::DeflateDecoder;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Location of the manifest inside the container
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Default attribute naming the entry point
pub const DEFAULT_ENTRY_ATTRIBUTE: &str = "Main-Class";

const EOCD_SIGNATURE: u32 = 0x0605_4b50;
const CENTRAL_SIGNATURE: u32 = 0x0201_4b50;
const LOCAL_SIGNATURE: u32 = 0x0403_4b50;
const EOCD_LEN: usize = 22;
const CENTRAL_LEN: usize = 46;
const LOCAL_LEN: usize = 30;
const MAX_COMMENT_LEN: usize = u16::MAX as usize;

/// Fully-qualified name of the code to invoke
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint(String);

impl EntryPoint {
    /// Wrap an entry-point name
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Entry-point name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EntryPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Main section of a JAR-style manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    main: Vec<(String, String)>,
}

impl Manifest {
    /// Parse the main section: `Name: value` lines, continuation lines start
    /// with a single space, the section ends at the first blank line
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut main: Vec<(String, String)> = Vec::new();
        for line in manifest_lines(text) {
            if line.is_empty() {
                break;
            }
            if let Some(continued) = line.strip_prefix(' ') {
                if let Some((_, value)) = main.last_mut() {
                    value.push_str(continued);
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                let value = value.strip_prefix(' ').unwrap_or(value);
                main.push((name.trim().to_string(), value.to_string()));
            }
        }
        Self { main }
    }

    /// Value of a main-section attribute (names are case-insensitive)
    #[must_use]
    pub fn main_attribute(&self, name: &str) -> Option<&str> {
        self.main
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }
}

/// Lines ended by `\r\n`, `\r` or `\n`
fn manifest_lines(text: &str) -> impl Iterator<Item = &str> + '_ {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let Some(end) = rest.find(|c: char| c == '\r' || c == '\n') else {
            return Some(std::mem::take(&mut rest));
        };
        let line = &rest[..end];
        let terminator = if rest[end..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[end + terminator..];
        Some(line)
    })
}

/// Read the entry point named by `attribute` from the artifact at `path`
///
/// # Errors
/// Returns [`LaunchError`] if the artifact cannot be read, is not a readable
/// container, or has no manifest or attribute
pub fn read_entry_point(path: &Path, attribute: &str) -> Result<EntryPoint, LaunchError> {
    let data = fs::read(path).map_err(|source| LaunchError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest = read_entry(&data, MANIFEST_PATH)
        .map_err(|source| LaunchError::Container {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| LaunchError::MissingManifest {
            path: path.to_path_buf(),
            entry: MANIFEST_PATH,
        })?;

    Manifest::parse(&String::from_utf8_lossy(&manifest))
        .main_attribute(attribute)
        .map(EntryPoint::new)
        .ok_or_else(|| LaunchError::MissingEntryPoint {
            path: path.to_path_buf(),
            attribute: attribute.to_string(),
        })
}

/// Extract one entry from a ZIP archive held in memory
///
/// Returns `Ok(None)` when the archive has no entry called `name`.
///
/// # Errors
/// Returns [`ContainerError`] for malformed archives or unsupported entries
pub fn read_entry(data: &[u8], name: &str) -> Result<Option<Vec<u8>>, ContainerError> {
    let eocd = find_eocd(data)?;
    let entries = u16_at(data, eocd + 10)?;
    let directory_offset = u32_at(data, eocd + 16)?;
    if entries == u16::MAX || directory_offset == u32::MAX {
        return Err(ContainerError::Zip64);
    }

    let mut pos = directory_offset as usize;
    for _ in 0..entries {
        expect_signature(data, pos, CENTRAL_SIGNATURE, "central directory")?;
        let flags = u16_at(data, pos + 8)?;
        let method = u16_at(data, pos + 10)?;
        let compressed_size = u32_at(data, pos + 20)? as usize;
        let size = u32_at(data, pos + 24)? as usize;
        let name_len = usize::from(u16_at(data, pos + 28)?);
        let extra_len = usize::from(u16_at(data, pos + 30)?);
        let comment_len = usize::from(u16_at(data, pos + 32)?);
        let local_offset = u32_at(data, pos + 42)? as usize;
        let entry_name = slice(data, pos + CENTRAL_LEN, name_len)?;

        if entry_name == name.as_bytes() {
            if flags & 0x1 != 0 {
                return Err(ContainerError::Encrypted { name: name.to_string() });
            }
            let raw = local_data(data, local_offset, compressed_size)?;
            return inflate(name, method, raw, size).map(Some);
        }
        pos += CENTRAL_LEN + name_len + extra_len + comment_len;
    }
    Ok(None)
}

fn find_eocd(data: &[u8]) -> Result<usize, ContainerError> {
    let last = data.len().checked_sub(EOCD_LEN).ok_or(ContainerError::NotAnArchive)?;
    let first = last.saturating_sub(MAX_COMMENT_LEN);
    (first..=last)
        .rev()
        .find(|&at| u32_at(data, at).is_ok_and(|sig| sig == EOCD_SIGNATURE))
        .ok_or(ContainerError::NotAnArchive)
}

fn local_data(data: &[u8], offset: usize, compressed_size: usize) -> Result<&[u8], ContainerError> {
    expect_signature(data, offset, LOCAL_SIGNATURE, "local file header")?;
    let name_len = usize::from(u16_at(data, offset + 26)?);
    let extra_len = usize::from(u16_at(data, offset + 28)?);
    slice(data, offset + LOCAL_LEN + name_len + extra_len, compressed_size)
}

fn inflate(name: &str, method: u16, raw: &[u8], size: usize) -> Result<Vec<u8>, ContainerError> {
    let corrupt = |reason: String| ContainerError::CorruptEntry {
        name: name.to_string(),
        reason,
    };
    let out = match method {
        0 => raw.to_vec(),
        8 => {
            let mut out = Vec::with_capacity(size);
            DeflateDecoder::new(raw)
                .take(size as u64 + 1)
                .read_to_end(&mut out)
                .map_err(|e| corrupt(e.to_string()))?;
            out
        }
        method => {
            return Err(ContainerError::UnsupportedMethod {
                name: name.to_string(),
                method,
            })
        }
    };
    if out.len() != size {
        return Err(corrupt(format!("expected {size} bytes, got {}", out.len())));
    }
    Ok(out)
}

fn expect_signature(data: &[u8], at: usize, signature: u32, record: &'static str) -> Result<(), ContainerError> {
    if u32_at(data, at)? == signature {
        Ok(())
    } else {
        Err(ContainerError::BadSignature { record, offset: at })
    }
}

fn slice(data: &[u8], at: usize, len: usize) -> Result<&[u8], ContainerError> {
    at.checked_add(len)
        .and_then(|end| data.get(at..end))
        .ok_or(ContainerError::OutOfBounds { offset: at })
}

fn u16_at(data: &[u8], at: usize) -> Result<u16, ContainerError> {
    let bytes = slice(data, at, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn u32_at(data: &[u8], at: usize) -> Result<u32, ContainerError> {
    let bytes = slice(data, at, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_line_terminator() {
        for text in [
            "Manifest-Version: 1.0\rMain-Class: a.B\r\r",
            "Manifest-Version: 1.0\nMain-Class: a.B\n\n",
            "Manifest-Version: 1.0\r\nMain-Class: a.\r\n B\r\n",
        ] {
            assert_eq!(Manifest::parse(text).main_attribute("Main-Class"), Some("a.B"), "{text:?}");
        }
        let sections = Manifest::parse("Main-Class: a.B\r\rName: x\rMain-Class: c.D\r");
        assert_eq!(sections.main_attribute("Main-Class"), Some("a.B"));
    }

    #[test]
    fn parses_simple_attributes() {
        let manifest = Manifest::parse("Manifest-Version: 1.0\r\nMain-Class: org.example.Main\r\n\r\n");
        assert_eq!(manifest.main_attribute("Main-Class"), Some("org.example.Main"));
        assert_eq!(manifest.main_attribute("main-class"), Some("org.example.Main"));
        assert_eq!(manifest.main_attribute("Class-Path"), None);
    }

    #[test]
    fn joins_continuation_lines() {
        let text = "Manifest-Version: 1.0\nMain-Class: org.example.very.long.package.name.that.wr\n aps.Main\n";
        let manifest = Manifest::parse(text);
        assert_eq!(
            manifest.main_attribute("Main-Class"),
            Some("org.example.very.long.package.name.that.wraps.Main")
        );
    }

    #[test]
    fn ignores_per_entry_sections() {
        let text = "Manifest-Version: 1.0\n\nName: org/example/\nMain-Class: not.this.One\n";
        assert_eq!(Manifest::parse(text).main_attribute("Main-Class"), None);
    }

    #[test]
    fn empty_value_counts_as_missing() {
        assert_eq!(Manifest::parse("Main-Class:   \n").main_attribute("Main-Class"), None);
    }

    #[test]
    fn non_archive_is_rejected() {
        assert!(matches!(read_entry(b"plain bytes, no zip here", MANIFEST_PATH), Err(ContainerError::NotAnArchive)));
        assert!(matches!(read_entry(b"", MANIFEST_PATH), Err(ContainerError::NotAnArchive)));
    }

    #[test]
    fn empty_archive_has_no_entries() {
        let mut eocd = EOCD_SIGNATURE.to_le_bytes().to_vec();
        eocd.extend_from_slice(&[0u8; EOCD_LEN - 4]);
        assert_eq!(read_entry(&eocd, MANIFEST_PATH).unwrap(), None);
    }

    #[test]
    fn directory_pointing_past_the_end_is_rejected() {
        let mut eocd = EOCD_SIGNATURE.to_le_bytes().to_vec();
        eocd.extend_from_slice(&[0, 0, 0, 0, 1, 0, 1, 0]);
        eocd.extend_from_slice(&46u32.to_le_bytes());
        eocd.extend_from_slice(&1000u32.to_le_bytes());
        eocd.extend_from_slice(&[0, 0]);
        assert!(matches!(
            read_entry(&eocd, MANIFEST_PATH),
            Err(ContainerError::OutOfBounds { .. })
        ));
    }
}
