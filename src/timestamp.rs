//! Wall-clock timestamps shared by session records, exchange logs, and vector payloads.

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Current UTC time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_parses_back_as_utc() {
        let ts = now_rfc3339();
        assert!(ts.ends_with('Z'));
        let parsed = OffsetDateTime::parse(&ts, &Rfc3339).expect("rfc3339");
        assert!(parsed.offset().is_utc());
    }
}
