//! Small helpers shared across the crate.

use std::time::{SystemTime, UNIX_EPOCH};

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

/// Parse the type's name from `Debug` output.
///
/// This is used to derive the `exceptionName` for captured errors without
/// requiring anything beyond `std::error::Error`.
///
/// # Examples
///
/// ```
/// use streply::utils::parse_type_from_debug;
///
/// let err = "NaN".parse::<usize>().unwrap_err();
/// assert_eq!(&parse_type_from_debug(&err), "ParseIntError");
/// ```
pub fn parse_type_from_debug<D: std::fmt::Debug + ?Sized>(d: &D) -> String {
    let dbg = format!("{:#?}", d);

    dbg.split(&[' ', '(', '{', '\r', '\n'][..])
        .next()
        .unwrap_or(&dbg)
        .trim()
        .to_owned()
}

const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]");

/// The capture-instant wall clock datetime and its timezone, reported as
/// the `date` and `dateTimeZone` wire fields.
///
/// When the local offset cannot be determined (multithreaded processes on
/// some platforms) the date is reported in UTC.
pub(crate) fn local_date_parts() -> (String, String) {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let date = now.format(DATE_FORMAT).unwrap_or_default();
    let offset = now.offset();
    let zone = if offset.is_utc() {
        "UTC".into()
    } else {
        let (hours, minutes, _) = offset.as_hms();
        format!("{:+03}:{:02}", hours, minutes.abs())
    };
    (date, zone)
}

/// The current unix timestamp as float seconds.
pub(crate) fn microtime() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Best-effort host name, reported as `requestUserAgent`.
pub(crate) fn server_hostname() -> Option<String> {
    hostname::get().ok().and_then(|h| h.into_string().ok())
}

#[test]
fn test_parse_type_from_debug() {
    use parse_type_from_debug as parse;
    #[derive(Debug)]
    struct MyStruct;
    assert_eq!(&parse(&MyStruct), "MyStruct");

    let err = "NaN".parse::<usize>().unwrap_err();
    assert_eq!(&parse(&err), "ParseIntError");

    let err = anyhow::Error::from(err);
    assert_eq!(&parse(&err), "ParseIntError");
}

#[test]
fn test_local_date_parts() {
    let (date, zone) = local_date_parts();
    // "YYYY-MM-DD HH:MM:SS.ffffff"
    assert_eq!(date.len(), 26);
    assert_eq!(&date[4..5], "-");
    assert_eq!(&date[10..11], " ");
    assert!(zone == "UTC" || zone.starts_with('+') || zone.starts_with('-'));
}
