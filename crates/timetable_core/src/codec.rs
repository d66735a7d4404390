//! crates/timetable_core/src/codec.rs
//!
//! String encodings of a timetable's `timings`, `examTimes` and `warnings`.
//! These formats are persisted and indexed by other services, so they must
//! round-trip byte for byte:
//!
//! - slot: `<COURSE_CODE>:<DAY><HOUR>`
//! - exam interval: `<COURSE_CODE>|<MIDSEM|COMPRE>|<ISO8601 start>|<ISO8601 end>`
//! - warning: `<COURSE_CODE>:<missing type codes>`

use crate::domain::{ExamInterval, ExamKind, SectionType, SlotKey, TimingEntry, Warning};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed room time '{0}': expected room:aux:day:hour")]
    RoomTime(String),
    #[error("Malformed timing '{0}'")]
    Timing(String),
    #[error("Malformed exam time '{0}': {1}")]
    ExamTime(String, String),
    #[error("Malformed warning '{0}'")]
    Warning(String),
}

//=========================================================================================
// Slot Codec
//=========================================================================================

/// Decodes a raw `room:aux:day:hour` input into its `(day, hour)` key.
pub fn decode_room_time(room_time: &str) -> Result<SlotKey, CodecError> {
    let mut fields = room_time.split(':');
    match (fields.next(), fields.next(), fields.next(), fields.next()) {
        (Some(_), Some(_), Some(day), Some(hour)) => Ok(SlotKey(format!("{day}{hour}"))),
        _ => Err(CodecError::RoomTime(room_time.to_string())),
    }
}

/// Builds the timing entries a section of `course_code` contributes, one per
/// weekly occurrence.
pub fn timings_for_section(
    course_code: &str,
    room_time: &[String],
) -> Result<Vec<TimingEntry>, CodecError> {
    room_time
        .iter()
        .map(|rt| {
            Ok(TimingEntry {
                course_code: course_code.to_string(),
                slot: decode_room_time(rt)?,
            })
        })
        .collect()
}

pub fn encode_timing(entry: &TimingEntry) -> String {
    format!("{}:{}", entry.course_code, entry.slot)
}

pub fn decode_timing(raw: &str) -> Result<TimingEntry, CodecError> {
    let (course_code, slot) = raw
        .rsplit_once(':')
        .ok_or_else(|| CodecError::Timing(raw.to_string()))?;
    if course_code.is_empty() || slot.is_empty() {
        return Err(CodecError::Timing(raw.to_string()));
    }
    Ok(TimingEntry {
        course_code: course_code.to_string(),
        slot: SlotKey(slot.to_string()),
    })
}

//=========================================================================================
// Exam Interval Codec
//=========================================================================================

fn exam_kind_tag(kind: ExamKind) -> &'static str {
    match kind {
        ExamKind::Midsem => "MIDSEM",
        ExamKind::Compre => "COMPRE",
    }
}

/// Matches the millisecond-precision `Z` form of the stored timestamps.
fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn encode_exam_time(interval: &ExamInterval) -> String {
    format!(
        "{}|{}|{}|{}",
        interval.course_code,
        exam_kind_tag(interval.kind),
        format_instant(&interval.start),
        format_instant(&interval.end)
    )
}

pub fn decode_exam_time(raw: &str) -> Result<ExamInterval, CodecError> {
    let fail = |why: &str| CodecError::ExamTime(raw.to_string(), why.to_string());

    let parts: Vec<&str> = raw.split('|').collect();
    let &[course_code, kind, start, end] = parts.as_slice() else {
        return Err(fail("expected four '|' separated fields"));
    };
    let kind = match kind {
        "MIDSEM" => ExamKind::Midsem,
        "COMPRE" => ExamKind::Compre,
        other => return Err(fail(&format!("unknown exam kind {other}"))),
    };
    let parse = |s: &str| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| fail(&e.to_string()))
    };

    Ok(ExamInterval {
        course_code: course_code.to_string(),
        kind,
        start: parse(start)?,
        end: parse(end)?,
    })
}

//=========================================================================================
// Warning Codec
//=========================================================================================

pub fn encode_warning(warning: &Warning) -> String {
    let missing: String = warning.missing.iter().map(|t| t.code()).collect();
    format!("{}:{}", warning.course_code, missing)
}

pub fn decode_warning(raw: &str) -> Result<Warning, CodecError> {
    let (course_code, codes) = raw
        .rsplit_once(':')
        .ok_or_else(|| CodecError::Warning(raw.to_string()))?;
    let missing = codes
        .chars()
        .map(SectionType::from_code)
        .collect::<Option<BTreeSet<_>>>()
        .ok_or_else(|| CodecError::Warning(raw.to_string()))?;
    if course_code.is_empty() || missing.is_empty() {
        return Err(CodecError::Warning(raw.to_string()));
    }
    Ok(Warning {
        course_code: course_code.to_string(),
        missing,
    })
}

/// Decodes a whole persisted column with one of the decoders above.
pub fn decode_all<T>(
    raw: &[String],
    decode: fn(&str) -> Result<T, CodecError>,
) -> Result<Vec<T>, CodecError> {
    raw.iter().map(|s| decode(s)).collect()
}
