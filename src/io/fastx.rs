//! FASTX input: FASTA or FASTQ, plain or compressed.
//!
//! The format is sniffed from the first non-blank byte (`>` FASTA, `@`
//! FASTQ); compression is detected by `niffler`. FASTQ goes through
//! `paraseq` record sets, FASTA through a line reader.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::debug;

pub use paraseq::Record;
pub use paraseq::fastq;

/// A chunk of read sequences for batch processing.
pub type ReadChunk = Vec<Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceFormat {
    Fasta,
    Fastq,
}

// ---------------------------------------------------------------------------
// FastxConfig
// ---------------------------------------------------------------------------

/// Configuration for FASTX input sources.
#[derive(Debug, Clone)]
pub struct FastxConfig {
    pub paths: Vec<String>,
    /// Records per chunk for FASTA input. FASTQ chunks hold one `paraseq`
    /// record set each.
    pub chunk_size: usize,
}

impl Default for FastxConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            chunk_size: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// FASTA
// ---------------------------------------------------------------------------

/// Minimal line-based FASTA reader. Sequence lines are concatenated as-is.
pub struct FastaReader<R> {
    reader: R,
    line: Vec<u8>,
    /// A header has been consumed whose sequence is not yet returned.
    in_record: bool,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            in_record: false,
        }
    }

    /// Read the next record's sequence into `seq`. `Ok(false)` at EOF.
    pub fn next_record(&mut self, seq: &mut Vec<u8>) -> Result<bool> {
        seq.clear();
        loop {
            self.line.clear();
            let n = self
                .reader
                .read_until(b'\n', &mut self.line)
                .context("reading FASTA line")?;
            if n == 0 {
                let had_record = self.in_record;
                self.in_record = false;
                return Ok(had_record);
            }
            let line = trim_line_end(&self.line);
            if line.first() == Some(&b'>') {
                if self.in_record {
                    return Ok(true);
                }
                self.in_record = true;
            } else if self.in_record {
                seq.extend_from_slice(line);
            } else if !line.iter().all(u8::is_ascii_whitespace) {
                bail!("FASTA input does not start with a '>' header");
            }
        }
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}

// ---------------------------------------------------------------------------
// FastxSource
// ---------------------------------------------------------------------------

enum Inner {
    Fasta(FastaReader<BufReader<Box<dyn Read + Send>>>),
    Fastq {
        reader: fastq::Reader<Box<dyn Read + Send>>,
        record_set: fastq::RecordSet,
    },
    Empty,
}

/// Sequential reader producing chunks of owned sequences from one file.
pub struct FastxSource {
    inner: Inner,
    chunk_size: usize,
}

impl FastxSource {
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        let chunk_size = chunk_size.max(1);
        let len = std::fs::metadata(path)
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();
        if len == 0 {
            return Ok(Self {
                inner: Inner::Empty,
                chunk_size,
            });
        }
        let raw = open_with_decompression(path)?;
        let mut buf = BufReader::with_capacity(1 << 20, raw);
        let inner = match sniff_format(&mut buf)
            .with_context(|| format!("failed to detect format of {}", path.display()))?
        {
            Some(SequenceFormat::Fasta) => Inner::Fasta(FastaReader::new(buf)),
            Some(SequenceFormat::Fastq) => {
                let reader = fastq::Reader::new(Box::new(buf) as Box<dyn Read + Send>);
                let record_set = reader.new_record_set();
                Inner::Fastq { reader, record_set }
            }
            None => Inner::Empty,
        };
        let source = Self { inner, chunk_size };
        debug!(path = %path.display(), format = ?source.format(), "Opened sequence file");
        Ok(source)
    }

    /// Format of the underlying file, `None` if it is empty.
    pub fn format(&self) -> Option<SequenceFormat> {
        match self.inner {
            Inner::Fasta(_) => Some(SequenceFormat::Fasta),
            Inner::Fastq { .. } => Some(SequenceFormat::Fastq),
            Inner::Empty => None,
        }
    }

    /// Read the next chunk of sequences into `chunk`.
    ///
    /// Returns `Ok(true)` if sequences were produced, `Ok(false)` at EOF.
    pub fn next_chunk(&mut self, chunk: &mut ReadChunk) -> Result<bool> {
        chunk.clear();
        match &mut self.inner {
            Inner::Fasta(reader) => {
                let mut seq = Vec::new();
                while chunk.len() < self.chunk_size && reader.next_record(&mut seq)? {
                    chunk.push(std::mem::take(&mut seq));
                }
            }
            Inner::Fastq { reader, record_set } => {
                if !record_set.fill(reader)? {
                    return Ok(false);
                }
                for rec in record_set.iter() {
                    let rec = rec?;
                    chunk.push(rec.seq().into_owned());
                }
            }
            Inner::Empty => {}
        }
        Ok(!chunk.is_empty())
    }
}

/// Call `f` with every sequence of the file at `path`. Returns the number
/// of records.
pub fn for_each_reference<F>(path: &Path, mut f: F) -> Result<u64>
where
    F: FnMut(&[u8]),
{
    let mut source = FastxSource::open(path, 64)?;
    let mut chunk = ReadChunk::new();
    let mut num_records = 0u64;
    while source.next_chunk(&mut chunk)? {
        for seq in &chunk {
            f(seq);
            num_records += 1;
        }
    }
    Ok(num_records)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Open a single file with automatic decompression (gzip, zstd, etc.).
pub fn open_with_decompression(path: &Path) -> Result<Box<dyn Read + Send>> {
    let (reader, _format) = niffler::send::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    Ok(reader)
}

/// Peek at the first non-blank byte without consuming it.
fn sniff_format<R: BufRead>(reader: &mut R) -> Result<Option<SequenceFormat>> {
    let buf = reader.fill_buf()?;
    match buf.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'>') => Ok(Some(SequenceFormat::Fasta)),
        Some(b'@') => Ok(Some(SequenceFormat::Fastq)),
        Some(&other) => bail!("unrecognized sequence format (first byte {:?})", other as char),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_fasta_reader_multiline() {
        let data = b">a desc\nACGT\nacgt\r\n>b\n\n>c\nTTTT\n";
        let mut reader = FastaReader::new(&data[..]);
        let mut seq = Vec::new();
        assert!(reader.next_record(&mut seq).unwrap());
        assert_eq!(seq, b"ACGTacgt");
        assert!(reader.next_record(&mut seq).unwrap());
        assert!(seq.is_empty());
        assert!(reader.next_record(&mut seq).unwrap());
        assert_eq!(seq, b"TTTT");
        assert!(!reader.next_record(&mut seq).unwrap());
    }

    #[test]
    fn test_fasta_reader_rejects_headerless() {
        let mut reader = FastaReader::new(&b"ACGT\n"[..]);
        let mut seq = Vec::new();
        assert!(reader.next_record(&mut seq).is_err());
    }

    #[test]
    fn test_source_reads_fasta_chunks() {
        let file = write_temp(b">r1\nACGTACGT\n>r2\nGGGG\n>r3\nTT\n");
        let mut source = FastxSource::open(file.path(), 2).unwrap();
        assert_eq!(source.format(), Some(SequenceFormat::Fasta));
        let mut chunk = ReadChunk::new();
        assert!(source.next_chunk(&mut chunk).unwrap());
        assert_eq!(chunk, vec![b"ACGTACGT".to_vec(), b"GGGG".to_vec()]);
        assert!(source.next_chunk(&mut chunk).unwrap());
        assert_eq!(chunk, vec![b"TT".to_vec()]);
        assert!(!source.next_chunk(&mut chunk).unwrap());
    }

    #[test]
    fn test_source_reads_fastq() {
        let file = write_temp(b"@r1\nACGTACGT\n+\nIIIIIIII\n@r2\nGGNN\n+\nIIII\n");
        let mut source = FastxSource::open(file.path(), 10).unwrap();
        assert_eq!(source.format(), Some(SequenceFormat::Fastq));
        let mut all = Vec::new();
        let mut chunk = ReadChunk::new();
        while source.next_chunk(&mut chunk).unwrap() {
            all.append(&mut chunk);
        }
        assert_eq!(all, vec![b"ACGTACGT".to_vec(), b"GGNN".to_vec()]);
    }

    #[test]
    fn test_empty_file_has_no_records() {
        let file = write_temp(b"");
        let n = for_each_reference(file.path(), |_| panic!("no records expected")).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_unknown_format_is_an_error() {
        let file = write_temp(b"ACGT\n");
        assert!(FastxSource::open(file.path(), 10).is_err());
    }
}
