//! Response classification rules.
//!
//! A response to an AT command is a sequence of lines: optional echo and
//! noise, an optional structured line `<MARKER>:<payload>`, and a terminal
//! `OK` or `ERROR:<code>`. [`Classification`] accumulates what has been seen
//! line by line; the engine drives it and owns the buffers.

use crate::error::{AtError, AtResult};

/// Marker of a structured error line (`ERROR:<code>`).
pub const ERROR_MARKER: &str = "ERROR";

/// Substring that marks a successful terminal line.
///
/// Matched anywhere in a line, not as a whole token; a payload containing
/// the letters `OK` also counts.
pub const OK_MARKER: &[u8] = b"OK";

/// Whether a line carries nothing printable.
pub fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|&b| b <= b' ')
}

/// Find `marker` immediately followed by `:` and return what follows.
///
/// Only the first occurrence of the marker is considered; if the colon is
/// missing there the line does not match.
pub fn marker_payload<'a>(line: &'a [u8], marker: &str) -> Option<&'a [u8]> {
    let start = find_subslice(line, marker.as_bytes())?;
    let colon = start + marker.len();
    match line.get(colon) {
        Some(b':') => Some(&line[colon + 1..]),
        _ => None,
    }
}

/// Whether `line` contains `needle` anywhere.
pub fn contains(line: &[u8], needle: &[u8]) -> bool {
    find_subslice(line, needle).is_some()
}

/// Position of the first occurrence of `needle`; an empty needle matches at 0.
pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Parse the leading decimal integer of a payload.
///
/// Leading whitespace and one sign are accepted, parsing stops at the first
/// non-digit, and a payload without digits yields `0`. Values outside `i32`
/// saturate.
pub fn parse_response_code(payload: &[u8]) -> i32 {
    let mut rest = payload;
    while let [first, tail @ ..] = rest {
        if first.is_ascii_whitespace() || *first == 0x0b {
            rest = tail;
        } else {
            break;
        }
    }

    let negative = match rest.first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    let mut value: i64 = 0;
    for &b in rest.iter().take_while(|b| b.is_ascii_digit()) {
        value = (value * 10 + i64::from(b - b'0')).min(i64::from(i32::MAX) + 1);
    }
    if negative {
        value = -value;
    }
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Flags accumulated while classifying one response.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// A line containing `OK` arrived.
    pub ok_seen: bool,
    /// An `ERROR:<code>` line arrived.
    pub error_seen: bool,
    /// The expected payload (or error code, or bare OK) has been captured.
    pub response_extracted: bool,
}

impl Classification {
    /// Start a fresh classification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one received line.
    ///
    /// Returns the payload to save when this line is the one that provides
    /// it; later payload lines are ignored.
    pub fn feed<'a>(
        &mut self,
        line: &'a [u8],
        error_possible: bool,
        expected_marker: Option<&str>,
    ) -> Option<&'a [u8]> {
        if is_blank(line) {
            return None;
        }

        let mut extracted = None;

        if !self.response_extracted {
            if let Some(marker) = expected_marker {
                extracted = marker_payload(line, marker);
            }
        }

        if extracted.is_none() && error_possible && !self.error_seen && !self.response_extracted {
            extracted = marker_payload(line, ERROR_MARKER);
            if extracted.is_some() {
                self.error_seen = true;
            }
        }

        if contains(line, OK_MARKER) {
            self.ok_seen = true;
        }

        if extracted.is_some() {
            self.response_extracted = true;
        }

        if self.ok_seen && expected_marker.is_none() {
            self.response_extracted = true;
        }

        extracted
    }

    /// Whether a payload and a terminal marker have both arrived.
    pub fn is_complete(&self) -> bool {
        self.response_extracted && (self.error_seen || self.ok_seen)
    }

    /// Map the accumulated flags to the transaction outcome.
    ///
    /// `code` is the numeric value of the saved payload; `last_error` is the
    /// line reader error that ended the loop, if any.
    pub fn outcome(&self, code: i32, last_error: Option<AtError>) -> AtResult<()> {
        if self.response_extracted {
            if self.error_seen {
                Err(AtError::ErrorCode(code))
            } else if self.ok_seen {
                Ok(())
            } else {
                Err(AtError::NoOk)
            }
        } else {
            match last_error {
                Some(err) => Err(err),
                None => Err(AtError::Timeout),
            }
        }
    }
}
