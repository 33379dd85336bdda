use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use snap::write::FrameEncoder;

use super::CompressionBackend;

/// In-process snappy, framing (stream) format
#[derive(Debug, Clone, Copy, Default)]
pub struct SnappyBackend;

impl CompressionBackend for SnappyBackend {
    fn extension(&self) -> &'static str {
        "snappy"
    }

    fn compress(&self, input: &Path, output: &Path) -> io::Result<()> {
        let mut reader = BufReader::new(File::open(input)?);
        let mut encoder = FrameEncoder::new(BufWriter::new(File::create(output)?));
        io::copy(&mut reader, &mut encoder)?;
        encoder.flush()?;

        let mut inner = encoder
            .into_inner()
            .map_err(|e| io::Error::new(e.error().kind(), e.error().to_string()))?;
        inner.flush()
    }
}
