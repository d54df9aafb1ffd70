use chrono::NaiveDate;

/// Date layouts accepted in the source file, tried in order. US month-first
/// layouts win over day-first ones, which are not accepted at all.
const DATE_FORMATS: [&str; 4] = ["%m/%d/%Y", "%Y-%m-%d", "%m-%d-%Y", "%Y/%m/%d"];

/// Parse a source date, ignoring an optional trailing time of day
/// ("11/8/2016", "2016-11-08", "2016-11-08 00:00:00", "2016-11-08T00:00:00").
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date_part = value
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or(value);

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}
