use std::io::BufRead;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Load,
    Store,
    Fetch,
}

impl AccessKind {
    pub fn is_store(self) -> bool {
        matches!(self, Self::Store)
    }

    fn default_bytes(self) -> u64 {
        match self {
            Self::Fetch => 4,
            Self::Load | Self::Store => 8,
        }
    }
}

impl FromStr for AccessKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "r" | "load" => Ok(Self::Load),
            "w" | "store" => Ok(Self::Store),
            "i" | "fetch" => Ok(Self::Fetch),
            other => Err(format!("unknown access kind '{other}'")),
        }
    }
}

/// One memory reference: `<kind> <addr> [bytes]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    pub kind: AccessKind,
    pub addr: u64,
    pub bytes: u64,
}

impl TraceRecord {
    pub fn new(kind: AccessKind, addr: u64, bytes: u64) -> Self {
        Self { kind, addr, bytes }
    }

    /// Parses one trace line; `Ok(None)` for blank lines and comments.
    pub fn parse_line(line: &str) -> Result<Option<Self>, String> {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };
        let mut fields = line.split_whitespace();
        let Some(kind) = fields.next() else {
            return Ok(None);
        };
        let kind: AccessKind = kind.parse()?;
        let addr = fields
            .next()
            .ok_or_else(|| "missing address".to_string())
            .and_then(parse_u64)?;
        let bytes = match fields.next() {
            Some(field) => parse_u64(field)?,
            None => kind.default_bytes(),
        };
        if let Some(extra) = fields.next() {
            return Err(format!("unexpected trailing field '{extra}'"));
        }
        Ok(Some(Self { kind, addr, bytes }))
    }
}

fn parse_u64(field: &str) -> Result<u64, String> {
    let parsed = match field.strip_prefix("0x").or_else(|| field.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => field.parse::<u64>(),
    };
    parsed.map_err(|err| format!("bad number '{field}': {err}"))
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("cannot read trace: {0}")]
    Io(#[from] std::io::Error),
    #[error("trace line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Streams records out of a line-oriented trace.
pub struct TraceReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<TraceRecord, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };
            self.line_no += 1;
            match TraceRecord::parse_line(&line) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(reason) => {
                    return Some(Err(TraceError::Parse {
                        line: self.line_no,
                        reason,
                    }))
                }
            }
        }
    }
}
