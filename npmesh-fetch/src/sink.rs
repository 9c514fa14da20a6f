//! Output sinks.

use std::io::Write;
use std::sync::Arc;

use npmesh_core::error::{NpmeshError, Result};
use npmesh_core::traits::{NanopubCodec, NanopubSink};
use npmesh_core::types::Nanopub;

/// Serializes every nanopub with a codec and appends it to a writer.
pub struct WriterSink<W: Write + Send> {
    writer: W,
    codec: Arc<dyn NanopubCodec>,
    written: u64,
}

impl<W: Write + Send> WriterSink<W> {
    /// Creates a sink writing to `writer`.
    pub fn new(writer: W, codec: Arc<dyn NanopubCodec>) -> Self {
        Self {
            writer,
            codec,
            written: 0,
        }
    }

    /// Number of nanopubs written.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes and returns the writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write + Send> NanopubSink for WriterSink<W> {
    fn write(&mut self, nanopub: &Nanopub) -> Result<()> {
        let body = self.codec.encode(nanopub.quads())?;
        self.writer
            .write_all(&body)
            .map_err(|e| NpmeshError::SinkError(e.to_string()))?;
        self.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::plain;
    use npmesh_core::NquadsCodec;

    #[test]
    fn test_writer_sink() {
        let mut sink = WriterSink::new(Vec::new(), Arc::new(NquadsCodec));
        sink.write(&plain("a")).unwrap();
        sink.write(&plain("b")).unwrap();
        assert_eq!(sink.written(), 2);

        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(out.ends_with(" .\n"));
    }
}
