//! Minimal ZIP writer for derived-artifact fixtures

use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use std::io::Write;

const DOS_DATE_1980_01_01: u16 = 0x0021;

/// Writes a single-disk ZIP archive with stored or deflated entries
#[derive(Debug, Default)]
pub struct ZipFixture {
    body: Vec<u8>,
    directory: Vec<u8>,
    entries: u16,
}

impl ZipFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an uncompressed entry
    #[must_use]
    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, 0, data.to_vec())
    }

    /// Add a deflated entry
    #[must_use]
    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        let compressed = encoder.finish().unwrap();
        self.entry(name, data, 8, compressed)
    }

    fn entry(mut self, name: &str, data: &[u8], method: u16, raw: Vec<u8>) -> Self {
        let mut crc = Crc::new();
        crc.update(data);
        let offset = u32::try_from(self.body.len()).unwrap();
        let name_len = u16::try_from(name.len()).unwrap();
        let size = u32::try_from(data.len()).unwrap();
        let compressed_size = u32::try_from(raw.len()).unwrap();

        let local = &mut self.body;
        local.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        local.extend_from_slice(&20u16.to_le_bytes());
        local.extend_from_slice(&0u16.to_le_bytes());
        local.extend_from_slice(&method.to_le_bytes());
        local.extend_from_slice(&0u16.to_le_bytes());
        local.extend_from_slice(&DOS_DATE_1980_01_01.to_le_bytes());
        local.extend_from_slice(&crc.sum().to_le_bytes());
        local.extend_from_slice(&compressed_size.to_le_bytes());
        local.extend_from_slice(&size.to_le_bytes());
        local.extend_from_slice(&name_len.to_le_bytes());
        local.extend_from_slice(&0u16.to_le_bytes());
        local.extend_from_slice(name.as_bytes());
        local.extend_from_slice(&raw);

        let central = &mut self.directory;
        central.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&method.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&DOS_DATE_1980_01_01.to_le_bytes());
        central.extend_from_slice(&crc.sum().to_le_bytes());
        central.extend_from_slice(&compressed_size.to_le_bytes());
        central.extend_from_slice(&size.to_le_bytes());
        central.extend_from_slice(&name_len.to_le_bytes());
        // extra, comment, disk, internal attrs
        central.extend_from_slice(&[0u8; 8]);
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(name.as_bytes());

        self.entries += 1;
        self
    }

    pub fn finish(self) -> Vec<u8> {
        let directory_offset = u32::try_from(self.body.len()).unwrap();
        let directory_size = u32::try_from(self.directory.len()).unwrap();
        let mut out = self.body;
        out.extend_from_slice(&self.directory);
        out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&self.entries.to_le_bytes());
        out.extend_from_slice(&self.entries.to_le_bytes());
        out.extend_from_slice(&directory_size.to_le_bytes());
        out.extend_from_slice(&directory_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }
}

/// A JAR-like container whose manifest names `main_class`, plus a payload
pub fn jar_with_main_class(main_class: &str, payload: &[u8]) -> Vec<u8> {
    let manifest = format!("Manifest-Version: 1.0\r\nMain-Class: {main_class}\r\n\r\n");
    ZipFixture::new()
        .deflated("META-INF/MANIFEST.MF", manifest.as_bytes())
        .stored("payload.bin", payload)
        .finish()
}
