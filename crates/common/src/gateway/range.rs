//! Byte range arithmetic for object reads.

use std::str::FromStr;

/// A single HTTP byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=start-end`, `end` inclusive; open ended when `end` is `None`
    FromTo { start: u64, end: Option<u64> },
    /// `bytes=-len`: the last `len` bytes
    Suffix(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("range start {start} is beyond the object size {size}")]
    NotSatisfiable { start: u64, size: u64 },
    #[error("range end {end} is before its start {start}")]
    Inverted { start: u64, end: u64 },
    #[error("malformed range header: {0}")]
    Malformed(String),
}

impl RangeSpec {
    /// Resolve the range against an object of `size` bytes.
    ///
    /// # Returns
    /// * `Ok((offset, length))` - Where to start reading and how many bytes to read
    /// * `Err(RangeError)` - The range cannot be satisfied
    pub fn offset_length(&self, size: u64) -> Result<(u64, u64), RangeError> {
        match *self {
            RangeSpec::Suffix(len) => {
                let length = len.min(size);
                Ok((size - length, length))
            }
            RangeSpec::FromTo { start, end } => {
                if let Some(end) = end {
                    if end < start {
                        return Err(RangeError::Inverted { start, end });
                    }
                }
                if start >= size {
                    return Err(RangeError::NotSatisfiable { start, size });
                }
                let last = match end {
                    Some(end) => end.min(size - 1),
                    None => size - 1,
                };
                Ok((start, last - start + 1))
            }
        }
    }
}

/// Offset and length of a read with an optional range
pub fn offset_length(range: Option<&RangeSpec>, size: u64) -> Result<(u64, u64), RangeError> {
    match range {
        Some(range) => range.offset_length(size),
        None => Ok((0, size)),
    }
}

impl FromStr for RangeSpec {
    type Err = RangeError;

    /// Parse a single-range `Range` header value such as `bytes=0-99`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RangeError::Malformed(s.to_string());
        let spec = s.trim().strip_prefix("bytes=").ok_or_else(malformed)?;
        if spec.contains(',') {
            return Err(malformed());
        }
        let (start, end) = spec.split_once('-').ok_or_else(malformed)?;
        let (start, end) = (start.trim(), end.trim());

        if start.is_empty() {
            let len = end.parse::<u64>().map_err(|_| malformed())?;
            return Ok(RangeSpec::Suffix(len));
        }

        let start = start.parse::<u64>().map_err(|_| malformed())?;
        let end = if end.is_empty() {
            None
        } else {
            Some(end.parse::<u64>().map_err(|_| malformed())?)
        };
        Ok(RangeSpec::FromTo { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_range_reads_everything() {
        assert_eq!(offset_length(None, 10).unwrap(), (0, 10));
        assert_eq!(offset_length(None, 0).unwrap(), (0, 0));
    }

    #[test]
    fn test_bounded_range() {
        let range = RangeSpec::FromTo {
            start: 2,
            end: Some(5),
        };
        assert_eq!(range.offset_length(10).unwrap(), (2, 4));

        let range = RangeSpec::FromTo {
            start: 8,
            end: Some(100),
        };
        assert_eq!(range.offset_length(10).unwrap(), (8, 2));
    }

    #[test]
    fn test_open_and_suffix_ranges() {
        let range = RangeSpec::FromTo {
            start: 7,
            end: None,
        };
        assert_eq!(range.offset_length(10).unwrap(), (7, 3));
        assert_eq!(RangeSpec::Suffix(4).offset_length(10).unwrap(), (6, 4));
        assert_eq!(RangeSpec::Suffix(40).offset_length(10).unwrap(), (0, 10));
    }

    #[test]
    fn test_unsatisfiable_range() {
        let range = RangeSpec::FromTo {
            start: 10,
            end: None,
        };
        assert_eq!(
            range.offset_length(10).unwrap_err(),
            RangeError::NotSatisfiable { start: 10, size: 10 }
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "bytes=0-99".parse::<RangeSpec>().unwrap(),
            RangeSpec::FromTo {
                start: 0,
                end: Some(99)
            }
        );
        assert_eq!(
            "bytes=5-".parse::<RangeSpec>().unwrap(),
            RangeSpec::FromTo {
                start: 5,
                end: None
            }
        );
        assert_eq!(
            "bytes=-20".parse::<RangeSpec>().unwrap(),
            RangeSpec::Suffix(20)
        );
        assert!("bytes=0-1,4-5".parse::<RangeSpec>().is_err());
        assert!("items=0-1".parse::<RangeSpec>().is_err());
        assert!("bytes=a-b".parse::<RangeSpec>().is_err());
    }
}
