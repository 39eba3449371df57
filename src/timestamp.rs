/*!
 * Binary timestamp codec
 *
 * Order creation times travel as an opaque blob in the producer platform's
 * standard binary time layout:
 *
 * ```text
 * byte 0      version (1 or 2)
 * bytes 1-8   seconds since 0001-01-01T00:00:00Z, big-endian i64
 * bytes 9-12  nanoseconds, big-endian i32
 * bytes 13-14 zone offset in minutes, big-endian i16
 * byte 15     extra offset seconds, unsigned (version 2 only)
 * ```
 *
 * The offset is `minutes * 60 + extra`; a total of exactly -60 seconds
 * marks UTC. That reading matches the producer's own decoder, so any
 * blob it accepts decodes to the same instant and offset here.
 */

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const VERSION_V1: u8 = 1;
const VERSION_V2: u8 = 2;
const LEN_V1: usize = 15;
const LEN_V2: usize = 16;

/// Seconds between 0001-01-01 and the Unix epoch
const UNIX_TO_INTERNAL: i64 = 62_135_596_800;

/// Minutes field written for a UTC location
const UTC_OFFSET_MARKER: i16 = -1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("no data")]
    Empty,

    #[error("unsupported version {0}")]
    UnsupportedVersion(u8),

    #[error("invalid length {actual} (expected {expected})")]
    InvalidLength { expected: usize, actual: usize },

    #[error("nanoseconds out of range: {0}")]
    InvalidNanos(i32),

    #[error("zone offset out of range: {0}s")]
    InvalidOffset(i32),

    /// The offset's minutes field would collide with the UTC marker
    #[error("zone offset {0}s cannot be encoded")]
    UnencodableOffset(i32),

    #[error("instant out of representable range")]
    OutOfRange,
}

/// How callers treat a creation time that fails to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampPolicy {
    /// Fall back to the zero timestamp and keep the order
    #[default]
    Lenient,

    /// Fail the whole operation
    Strict,
}

impl TimestampPolicy {
    /// Decode `blob` according to this policy
    pub fn resolve(&self, order_id: &str, blob: &[u8]) -> Result<DateTime<Utc>, TimestampError> {
        match decode(blob) {
            Ok(ts) => Ok(ts.with_timezone(&Utc)),
            Err(e) => match self {
                TimestampPolicy::Lenient => {
                    warn!(order_id, error = %e, "Could not decode order creation time, using zero timestamp");
                    Ok(zero())
                }
                TimestampPolicy::Strict => Err(e),
            },
        }
    }
}

/// The zero timestamp, 0001-01-01T00:00:00Z
pub fn zero() -> DateTime<Utc> {
    // Infallible: year 1 is inside chrono's range
    DateTime::from_timestamp(-UNIX_TO_INTERNAL, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Decode a binary timestamp blob, keeping the encoded zone offset
pub fn decode(blob: &[u8]) -> Result<DateTime<FixedOffset>, TimestampError> {
    let (&version, rest) = blob.split_first().ok_or(TimestampError::Empty)?;

    let expected = match version {
        VERSION_V1 => LEN_V1,
        VERSION_V2 => LEN_V2,
        other => return Err(TimestampError::UnsupportedVersion(other)),
    };
    if blob.len() != expected {
        return Err(TimestampError::InvalidLength {
            expected,
            actual: blob.len(),
        });
    }

    let secs = i64::from_be_bytes(rest[0..8].try_into().map_err(|_| TimestampError::OutOfRange)?);
    let nanos = i32::from_be_bytes(rest[8..12].try_into().map_err(|_| TimestampError::OutOfRange)?);
    let offset_min = i16::from_be_bytes([rest[12], rest[13]]);

    if !(0..1_000_000_000).contains(&nanos) {
        return Err(TimestampError::InvalidNanos(nanos));
    }

    let mut offset_secs = i32::from(offset_min) * 60;
    if version == VERSION_V2 {
        offset_secs += i32::from(rest[14]);
    }
    if offset_secs == i32::from(UTC_OFFSET_MARKER) * 60 {
        offset_secs = 0;
    }

    let offset = FixedOffset::east_opt(offset_secs).ok_or(TimestampError::InvalidOffset(offset_secs))?;
    let unix_secs = secs.checked_sub(UNIX_TO_INTERNAL).ok_or(TimestampError::OutOfRange)?;
    let utc = DateTime::from_timestamp(unix_secs, nanos as u32).ok_or(TimestampError::OutOfRange)?;

    Ok(utc.with_timezone(&offset))
}

/// Encode a timestamp in the same layout `decode` reads.
///
/// UTC instants are written with the UTC marker. Other offsets are split
/// into whole minutes (rounded down) plus a non-negative seconds byte,
/// with version 2 used when seconds remain.
///
/// # Errors
///
/// `UnencodableOffset` for offsets between -60s and -1s, whose minutes
/// field would read back as the UTC marker.
pub fn encode<Tz: TimeZone>(ts: &DateTime<Tz>) -> Result<Vec<u8>, TimestampError> {
    let offset_total = ts.offset().fix().local_minus_utc();
    let secs = ts.timestamp() + UNIX_TO_INTERNAL;
    let nanos = ts.timestamp_subsec_nanos() as i32;

    let (offset_min, extra_secs) = if offset_total == 0 {
        (UTC_OFFSET_MARKER, 0)
    } else {
        // |offset| < 24h, so minutes always fit in an i16
        let minutes = offset_total.div_euclid(60) as i16;
        if minutes == UTC_OFFSET_MARKER {
            return Err(TimestampError::UnencodableOffset(offset_total));
        }
        (minutes, offset_total.rem_euclid(60) as u8)
    };
    let version = if extra_secs != 0 { VERSION_V2 } else { VERSION_V1 };

    let mut buf = Vec::with_capacity(LEN_V2);
    buf.push(version);
    buf.extend_from_slice(&secs.to_be_bytes());
    buf.extend_from_slice(&nanos.to_be_bytes());
    buf.extend_from_slice(&offset_min.to_be_bytes());
    if version == VERSION_V2 {
        buf.push(extra_secs);
    }
    Ok(buf)
}
