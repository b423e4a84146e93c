use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use lazy_static::lazy_static;
use log::debug;
use rand::Rng;
use regex::Regex;

use crate::error::TraceError;

lazy_static! {
    // Optional comment after the address, hex needs its 0x prefix
    static ref ADDRESS_LINE: Regex =
        Regex::new(r"^\s*(?:0[xX](?P<hex>[0-9a-fA-F]+)|(?P<dec>[0-9]+))\s*(?:#.*)?$").unwrap();
}

/// How a synthetic address stream is produced
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TracePattern {
    /// Uniformly random addresses in `0..=bound`
    Random { bound: u64 },
    /// `0, stride, 2 * stride, ...`
    Sequential { stride: u64 },
}

/// Generates `count` addresses following `pattern`
///
/// Sequential addresses saturate at `u64::MAX` rather than wrapping
pub fn generate<G: Rng>(pattern: TracePattern, count: usize, rng: &mut G) -> Vec<u64> {
    match pattern {
        TracePattern::Random { bound } => (0..count).map(|_| rng.random_range(0..=bound)).collect(),
        TracePattern::Sequential { stride } => (0..count as u64).map(|i| i.saturating_mul(stride)).collect(),
    }
}

/// Parses a trace with one address per line
///
/// Addresses are decimal, or hexadecimal with a `0x` prefix. Blank lines and `#` comments are
/// skipped. Line numbers in errors are 1-based
pub fn parse_trace<B: BufRead>(input: B) -> Result<Vec<u64>, TraceError> {
    let mut addresses = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|e| TraceError::Read(Default::default(), e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        addresses.push(parse_address(trimmed, line_number)?);
    }
    Ok(addresses)
}

fn parse_address(text: &str, line: usize) -> Result<u64, TraceError> {
    let captures = ADDRESS_LINE
        .captures(text)
        .ok_or_else(|| TraceError::Malformed { line, text: text.to_string() })?;
    let parsed = if let Some(hex) = captures.name("hex") {
        u64::from_str_radix(hex.as_str(), 16)
    } else if let Some(dec) = captures.name("dec") {
        dec.as_str().parse::<u64>()
    } else {
        return Err(TraceError::Malformed { line, text: text.to_string() });
    };
    // The regex only lets digits through, so the only failure left is overflow
    parsed.map_err(|_| TraceError::Overflow { line, text: text.to_string() })
}

/// Reads and parses a trace file
pub fn read_trace_file(path: &Path) -> Result<Vec<u64>, TraceError> {
    let file = File::open(path).map_err(|e| TraceError::Read(path.to_path_buf(), e))?;
    let reader = get_reader(file).map_err(|e| TraceError::Read(path.to_path_buf(), e))?;
    let addresses = parse_trace(BufReader::new(reader)).map_err(|e| match e {
        TraceError::Read(_, source) => TraceError::Read(path.to_path_buf(), source),
        other => other,
    })?;
    debug!("read {} addresses from {}", addresses.len(), path.display());
    Ok(addresses)
}

fn get_reader(file: File) -> std::io::Result<impl Read> {
    // Compatibility on other systems
    #[cfg(not(unix))]
    {
        use std::io::BufReader;
        const BUFFER_SIZE: usize = 64 * 4096;
        Ok(BufReader::with_capacity(BUFFER_SIZE, file))
    }
    // Memory map the file on unix systems, traces are only ever read front to back
    #[cfg(unix)]
    {
        use std::io::Cursor;
        use memmap2::{Advice, Mmap};
        // Safety: the map is read only and lives no longer than the parse
        unsafe {
            let m = Mmap::map(&file)?;
            m.advise(Advice::Sequential)?;
            Ok(Cursor::new(m))
        }
    }
}
