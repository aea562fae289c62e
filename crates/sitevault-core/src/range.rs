//! HTTP byte-range helpers
//!
//! Parses the single-range `Range: bytes=<start>-[end]` form and resolves it
//! against an object size into the window the media proxy serves.

use serde::{Deserialize, Serialize};

/// A requested byte range as sent by the client. `end` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// Parse a `Range` header value.
    ///
    /// Returns `None` for anything other than a single `bytes=<start>-[end]`
    /// range with `end >= start`. Suffix ranges (`bytes=-500`) and multi-range
    /// requests are treated as malformed.
    pub fn parse(header: &str) -> Option<Self> {
        let spec = header.trim().strip_prefix("bytes=")?;
        if spec.contains(',') {
            return None;
        }

        let (start, end) = spec.split_once('-')?;
        let start: u64 = start.trim().parse().ok()?;
        let end = match end.trim() {
            "" => None,
            value => Some(value.parse::<u64>().ok()?),
        };

        match end {
            Some(end) if end < start => None,
            _ => Some(Self { start, end }),
        }
    }

    /// Render as a `Range` request header value
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.header_value())
    }
}

/// What the proxy will actually serve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeWindow {
    /// Inclusive `start..=end` slice of an object of `total` bytes
    Partial { start: u64, end: u64, total: u64 },
    /// The whole object; size may be unknown
    Full { total: Option<u64> },
    /// Requested start lies beyond the end of the object
    Unsatisfiable { total: u64 },
}

impl RangeWindow {
    /// Resolve a client range against the object size.
    ///
    /// With a known size, a missing range becomes the first `chunk` bytes and an
    /// open-ended range is capped at `chunk` bytes. With an unknown or zero size
    /// the whole object is served.
    pub fn resolve(range: Option<ByteRange>, total: Option<u64>, chunk: u64) -> Self {
        let total = match total {
            Some(total) if total > 0 => total,
            other => return RangeWindow::Full { total: other },
        };
        let chunk = chunk.max(1);
        let last = total - 1;

        let (start, end) = match range {
            None => (0, chunk.min(total) - 1),
            Some(ByteRange { start, .. }) if start > last => {
                return RangeWindow::Unsatisfiable { total };
            }
            Some(ByteRange { start, end: None }) => {
                (start, start.saturating_add(chunk).min(total) - 1)
            }
            Some(ByteRange {
                start,
                end: Some(end),
            }) => (start, end.min(last)),
        };

        RangeWindow::Partial { start, end, total }
    }

    /// Parse an upstream `Content-Range: bytes start-end/total` value.
    /// Unknown totals and inconsistent bounds yield `None`.
    pub fn from_content_range(value: &str) -> Option<Self> {
        let spec = value.trim().strip_prefix("bytes ")?;
        let (span, total) = spec.split_once('/')?;
        let (start, end) = span.split_once('-')?;
        let start: u64 = start.trim().parse().ok()?;
        let end: u64 = end.trim().parse().ok()?;
        let total: u64 = total.trim().parse().ok()?;
        if start > end || end >= total {
            return None;
        }
        Some(RangeWindow::Partial { start, end, total })
    }

    /// Number of bytes in the body, when known
    pub fn content_length(&self) -> Option<u64> {
        match self {
            RangeWindow::Partial { start, end, .. } => Some(end - start + 1),
            RangeWindow::Full { total } => *total,
            RangeWindow::Unsatisfiable { .. } => Some(0),
        }
    }

    /// `Content-Range` response header value
    pub fn content_range(&self) -> Option<String> {
        match self {
            RangeWindow::Partial { start, end, total } => {
                Some(format!("bytes {start}-{end}/{total}"))
            }
            RangeWindow::Full { .. } => None,
            RangeWindow::Unsatisfiable { total } => Some(format!("bytes */{total}")),
        }
    }

    /// `Range` header to send upstream
    pub fn upstream_range(&self) -> Option<String> {
        match self {
            RangeWindow::Partial { start, end, .. } => Some(format!("bytes={start}-{end}")),
            _ => None,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, RangeWindow::Partial { .. })
    }
}
