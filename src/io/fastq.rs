use std::io::BufRead;

use crate::errors::Error;

#[derive(Debug, Clone)]
pub struct FastqRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

pub struct FastqReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
    line_no: usize,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            done: false,
            line_no: 0,
        }
    }

    pub fn next_record(&mut self) -> Result<Option<FastqRecord>, Error> {
        if self.done {
            return Ok(None);
        }

        self.buf.clear();
        let mut n = self.reader.read_line(&mut self.buf)?;
        self.line_no += 1;
        if n == 0 {
            self.done = true;
            return Ok(None);
        }
        if !self.buf.starts_with('@') {
            return Err(Error::MalformedFastq {
                line: self.line_no,
                reason: "header line does not start with '@'".to_string(),
            });
        }
        let header = self.buf[1..].trim_end().to_string();
        let mut parts = header.splitn(2, char::is_whitespace);
        let id = parts.next().unwrap_or("").to_string();
        let desc = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        self.buf.clear();
        n = self.reader.read_line(&mut self.buf)?;
        self.line_no += 1;
        if n == 0 {
            return Err(Error::MalformedFastq {
                line: self.line_no,
                reason: "unexpected EOF after header".to_string(),
            });
        }
        let seq = self.buf.trim_end().as_bytes().to_vec();

        self.buf.clear();
        n = self.reader.read_line(&mut self.buf)?;
        self.line_no += 1;
        if n == 0 || !self.buf.starts_with('+') {
            return Err(Error::MalformedFastq {
                line: self.line_no,
                reason: "missing '+' separator line".to_string(),
            });
        }

        self.buf.clear();
        n = self.reader.read_line(&mut self.buf)?;
        self.line_no += 1;
        if n == 0 {
            return Err(Error::MalformedFastq {
                line: self.line_no,
                reason: "missing quality line".to_string(),
            });
        }
        let qual = self.buf.trim_end().as_bytes().to_vec();

        if qual.len() != seq.len() {
            return Err(Error::MalformedFastq {
                line: self.line_no,
                reason: format!(
                    "sequence/quality length mismatch ({} vs {})",
                    seq.len(),
                    qual.len()
                ),
            });
        }

        Ok(Some(FastqRecord { id, desc, seq, qual }))
    }
}
