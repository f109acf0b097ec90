use chrono::{DateTime, FixedOffset, Utc};

/// Timestamptz columns surface as `DateTime<FixedOffset>` in sea-orm
/// models while the domain entities hold `DateTime<Utc>`.
pub fn utc_to_fixed_offset(utc: &DateTime<Utc>) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(0).expect("zero offset is always valid");
    utc.with_timezone(&offset)
}
