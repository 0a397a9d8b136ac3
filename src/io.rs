//! Reading and writing streams of MAP records.
//!
//! The [`MapReader`] and [`MapWriter`] adapters wrap readers and writers the
//! caller already owns; opening and closing files is left to the caller.
//! Gzip-compressed input is detected by its magic number, so plaintext and
//! compressed MAP streams go through the same interface.
//!
use csv::{ReaderBuilder, StringRecordsIntoIter};
use flate2::bufread::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use tracing::warn;

use crate::map::{decode_fields, render_template, MmapFilter, FIELD_SEPARATOR};
use crate::template::{MapError, Template};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Check if a buffered stream is gzipped by peeking at its magic numbers.
pub fn is_gzipped<R: BufRead>(reader: &mut R) -> io::Result<bool> {
    let buffer = reader.fill_buf()?;
    Ok(buffer.starts_with(&GZIP_MAGIC))
}

/// Buffer `inner`, transparently decompressing it if it is gzipped.
pub fn open_reader<R: Read + 'static>(inner: R) -> io::Result<Box<dyn BufRead>> {
    let mut reader = BufReader::new(inner);
    let reader: Box<dyn BufRead> = if is_gzipped(&mut reader)? {
        Box::new(BufReader::new(MultiGzDecoder::new(reader)))
    } else {
        Box::new(reader)
    };
    Ok(reader)
}

/// An iterator of decoded [`Template`]s, one per non-empty line.
///
/// A malformed record yields an `Err` for that record only; iteration
/// continues with the next line.
pub struct MapReader<R: Read> {
    records: StringRecordsIntoIter<R>,
}

impl<R: Read> MapReader<R> {
    pub fn new(reader: R) -> Self {
        let records = ReaderBuilder::new()
            .delimiter(FIELD_SEPARATOR as u8)
            .has_headers(false)
            .quoting(false)
            .flexible(true)
            .from_reader(reader)
            .into_records();
        Self { records }
    }
}

impl<R: Read> Iterator for MapReader<R> {
    type Item = Result<Template, MapError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map_or(0, |p| p.line());
                warn!(line, error = %e, "unreadable MAP record");
                return Some(Err(e.into()));
            }
        };
        let line = record.position().map_or(0, |p| p.line());
        let fields: Vec<&str> = record.iter().collect();
        let result = decode_fields(&fields).map_err(|e| e.within_record(&fields.join("\t")));
        if let Err(e) = &result {
            warn!(line, error = %e, "malformed MAP record");
        }
        Some(result)
    }
}

enum Sink {
    Plain(BufWriter<Box<dyn Write>>),
    Gzip(GzEncoder<BufWriter<Box<dyn Write>>>),
}

impl Sink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Sink::Plain(writer) => writer.write_all(bytes),
            Sink::Gzip(encoder) => encoder.write_all(bytes),
        }
    }

    /// Write the gzip trailer, if any, and flush everything to the destination.
    fn finish(self) -> io::Result<()> {
        let mut writer = match self {
            Sink::Plain(writer) => writer,
            Sink::Gzip(encoder) => encoder.finish()?,
        };
        writer.flush()
    }
}

/// Writes templates as MAP lines, optionally gzip-compressed.
///
/// Call [`MapWriter::finish`] when done: errors writing the end of the
/// stream are only reported there.
pub struct MapWriter {
    sink: Sink,
    filter: MmapFilter,
    written: u64,
}

impl MapWriter {
    /// Constructs a new `MapWriter` over `writer`.
    ///
    /// # Arguments
    ///
    /// * `writer` - The destination, e.g. an open file or standard out.
    /// * `compress` - Whether to gzip-compress the output.
    pub fn new<W: Write + 'static>(writer: W, compress: bool) -> Self {
        let writer: BufWriter<Box<dyn Write>> = BufWriter::new(Box::new(writer));
        let sink = if compress {
            Sink::Gzip(GzEncoder::new(writer, Compression::default()))
        } else {
            Sink::Plain(writer)
        };
        Self {
            sink,
            filter: MmapFilter::All,
            written: 0,
        }
    }

    /// Only write the multi-maps selected by `filter`.
    pub fn with_filter(mut self, filter: MmapFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn write_template(&mut self, template: &Template) -> Result<(), MapError> {
        let line = render_template(template, self.filter, true);
        self.sink.write_all(line.as_bytes())?;
        self.written += 1;
        Ok(())
    }

    /// The number of templates written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Complete the stream and flush it, returning the number of templates
    /// written.
    pub fn finish(self) -> Result<u64, MapError> {
        self.sink.finish()?;
        Ok(self.written)
    }
}
