//! Readers for raw sequence files.
//!
//! Every reader returns one byte string per sequence; joining and mapping
//! onto the alphabet happens in [`crate::alphabet::encode_sequences`].

use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    str::FromStr,
};

use log::info;

use crate::error::ReadError;

/// Zero-based column holding the repeat array in TRF output.
const TRF_SEQUENCE_COLUMN: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Records separated by `>` headers or blank lines.
    Fasta,
    /// Four-line records, the second line holds the sequence.
    Fastq,
    /// One sequence per line.
    Reads,
    /// Tab-separated Tandem Repeats Finder output.
    Trf,
}

impl FromStr for InputFormat {
    type Err = ReadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fasta" => Ok(Self::Fasta),
            "fastq" => Ok(Self::Fastq),
            "reads" => Ok(Self::Reads),
            "trf" => Ok(Self::Trf),
            _ => Err(ReadError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fasta => "fasta",
            Self::Fastq => "fastq",
            Self::Reads => "reads",
            Self::Trf => "trf",
        })
    }
}

/// Reads every sequence of `path`.
///
/// # Errors
///
/// Returns [`ReadError::Empty`] if the file holds no sequence.
pub fn read_path(
    path: impl AsRef<Path>,
    format: InputFormat,
) -> Result<Vec<Vec<u8>>, ReadError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let seqs = read_sequences(BufReader::new(file), format)?;
    if seqs.is_empty() {
        return Err(ReadError::Empty);
    }
    let total: usize = seqs.iter().map(Vec::len).sum();
    info!(
        "read {} {format} sequences ({total} symbols) from {}",
        seqs.len(),
        path.display()
    );
    Ok(seqs)
}

/// Reads every sequence from `reader`.
///
/// Lines are taken as raw bytes, so input that is not valid UTF-8 still
/// parses; such bytes become [`UNK`](crate::alphabet::UNK) when encoded.
pub fn read_sequences<R: BufRead>(
    reader: R,
    format: InputFormat,
) -> Result<Vec<Vec<u8>>, ReadError> {
    match format {
        InputFormat::Fasta => read_fasta(reader),
        InputFormat::Fastq => read_fastq(reader),
        InputFormat::Reads => read_reads(reader),
        InputFormat::Trf => read_trf(reader),
    }
}

fn read_fasta<R: BufRead>(reader: R) -> Result<Vec<Vec<u8>>, ReadError> {
    let mut seqs = Vec::new();
    let mut seq = Vec::new();
    for line in reader.split(b'\n') {
        let line = line?;
        let line = line.trim_ascii_end();
        if line.is_empty() || line.starts_with(b">") {
            if !seq.is_empty() {
                seqs.push(std::mem::take(&mut seq));
            }
        } else {
            seq.extend(line.iter().map(u8::to_ascii_uppercase));
        }
    }
    if !seq.is_empty() {
        seqs.push(seq);
    }
    Ok(seqs)
}

fn read_fastq<R: BufRead>(reader: R) -> Result<Vec<Vec<u8>>, ReadError> {
    let mut seqs = Vec::new();
    let mut seq = Vec::new();
    for (i, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        match i % 4 {
            1 => seq.extend_from_slice(line.trim_ascii_end()),
            3 => seqs.push(std::mem::take(&mut seq)),
            _ => {}
        }
    }
    Ok(seqs)
}

fn read_reads<R: BufRead>(reader: R) -> Result<Vec<Vec<u8>>, ReadError> {
    let mut seqs = Vec::new();
    for line in reader.split(b'\n') {
        let line = line?;
        let line = line.trim_ascii_end();
        if !line.is_empty() {
            seqs.push(line.to_ascii_uppercase());
        }
    }
    Ok(seqs)
}

fn read_trf<R: BufRead>(reader: R) -> Result<Vec<Vec<u8>>, ReadError> {
    let mut seqs = Vec::new();
    for (i, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        if line.trim_ascii().is_empty() {
            continue;
        }
        let mut columns = line.split(|&b| b == b'\t');
        match columns.nth(TRF_SEQUENCE_COLUMN) {
            Some(seq) => seqs.push(seq.trim_ascii_end().to_vec()),
            None => {
                return Err(ReadError::MalformedTrf {
                    line: i + 1,
                    columns: line.split(|&b| b == b'\t').count(),
                });
            }
        }
    }
    Ok(seqs)
}
