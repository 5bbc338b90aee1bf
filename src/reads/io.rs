// graftreads: Placement of sequencing reads onto a reference alignment tree.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
use std::fs::File;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;

use bstr::ByteSlice;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::alphabet::detect_data_type;
use crate::alphabet::strip_illegal;
use crate::alphabet::DataType;
use crate::reads::ReadRecord;

type E = Box<dyn std::error::Error>;

#[derive(Debug, Clone)]
pub struct UnreadableReads(pub String);

impl std::fmt::Display for UnreadableReads {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Error reading the reads: {}", self.0)
    }
}

impl std::error::Error for UnreadableReads {}

fn split_header(header: &[u8]) -> (String, String) {
    let header = header.to_str_lossy();
    match header.split_once(char::is_whitespace) {
        Some((name, comment)) => (name.to_string(), comment.trim().to_string()),
        None => (header.trim().to_string(), String::new()),
    }
}

/// Read FASTA or FASTQ records, gzipped or not.
pub fn read_reads<R: Read + Send>(conn: R) -> Result<Vec<ReadRecord>, E> {
    let mut reader = needletail::parse_fastx_reader(conn).map_err(|e| UnreadableReads(e.to_string()))?;

    let mut reads: Vec<ReadRecord> = Vec::new();
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| UnreadableReads(e.to_string()))?;
        let (name, comment) = split_header(record.id());
        reads.push(ReadRecord::new(&name, &comment, &record.seq(), record.qual()));
    }
    Ok(reads)
}

/// Read records from a file.
pub fn read_reads_file<P: AsRef<Path>>(path: P) -> Result<Vec<ReadRecord>, E> {
    let path = path.as_ref();
    let conn = File::open(path).map_err(|e| UnreadableReads(format!("{}: {}", path.display(), e)))?;
    read_reads(conn)
}

/// Detect the data type and remove illegal characters.
///
/// Returns the detected type and whether every read was already clean.
pub fn check_alphabet(reads: &mut [ReadRecord]) -> (DataType, bool) {
    let data_type = detect_data_type(reads.iter().map(|read| read.sequence.as_slice()));

    let mut removed = 0;
    reads.iter_mut().for_each(|read| {
        read.data_type = data_type;
        removed += strip_illegal(data_type, &mut read.sequence, read.quality.as_mut());
    });

    if removed > 0 {
        log::warn!("Illegal characters in input reads sequences removed ({} in total)", removed);
    }
    (data_type, removed == 0)
}

/// Write reads as FASTQ, or as FASTA if a read has no quality scores.
pub fn write_reads<W: Write>(reads: &[ReadRecord], conn: &mut W) -> Result<(), E> {
    for read in reads {
        let header = if read.comment.is_empty() {
            read.name.clone()
        } else {
            format!("{} {}", read.name, read.comment)
        };
        match &read.quality {
            Some(qual) => {
                conn.write_all(b"@")?;
                conn.write_all(header.as_bytes())?;
                conn.write_all(b"\n")?;
                conn.write_all(&read.sequence)?;
                conn.write_all(b"\n+\n")?;
                conn.write_all(qual)?;
                conn.write_all(b"\n")?;
            },
            None => {
                conn.write_all(b">")?;
                conn.write_all(header.as_bytes())?;
                conn.write_all(b"\n")?;
                conn.write_all(&read.sequence)?;
                conn.write_all(b"\n")?;
            },
        }
    }
    conn.flush()?;
    Ok(())
}

/// Open `path` for writing, gzip compressed if it ends in `.gz`.
pub fn create_output<P: AsRef<Path>>(path: P) -> Result<Box<dyn Write>, E> {
    let path = path.as_ref();
    let f = File::create(path)?;
    let conn = BufWriter::new(f);
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(GzEncoder::new(conn, Compression::default())))
    } else {
        Ok(Box::new(conn))
    }
}
