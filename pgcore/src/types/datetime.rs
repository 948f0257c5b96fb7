//! Date and time converters.
//!
//! Input accepts every `DateStyle` the server may be configured with:
//!
//! - ISO, `2024-01-15 10:20:30.5+07`
//! - SQL, `01/15/2024 10:20:30.5 UTC`
//! - German, `15.01.2024 10:20:30.5 UTC`
//! - Postgres, `Mon Jan 15 10:20:30.5 2024 UTC`, or `01-15-2024` for dates
//!
//! The day and month order of SQL and Postgres style is taken from the bound
//! [`Session`]. Output is always ISO.
//!
//! Only numeric offsets and `UTC`/`GMT`/`Z` are understood as time zone,
//! abbreviations like `PST` are rejected.
use std::{fmt::Write, sync::Arc};
use time::{
    Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
    format_description::BorrowedFormatItem, macros::format_description,
};

use crate::{
    client::{DateOrder, Session},
    common::Cursor,
    value::Value,
};

use super::{Converter, DynConverter, ParseError, ShapeError};

const DATE_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[hour]:[minute]:[second]");

const MONTHS: [&str; 12] = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];
const WEEKDAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Components found in a date/time literal.
#[derive(Default)]
struct Parsed {
    date: Option<Date>,
    time: Option<Time>,
    offset: Option<UtcOffset>,
    /// Time was `24:00:00`, kept as midnight of the next day.
    end_of_day: bool,
}

impl Parsed {
    fn set_time(&mut self, time: Option<Time>) {
        self.end_of_day = time.is_none();
        self.time = Some(time.unwrap_or(Time::MIDNIGHT));
    }
}

/// Calendar fields before era is known.
struct Ymd {
    year: i32,
    month: u8,
    day: u8,
    pos: usize,
}

fn parse(text: &str, name: &str, order: DateOrder) -> Result<Parsed, ParseError> {
    let mut cursor = Cursor::new(text, name);
    let mut parsed = Parsed::default();
    cursor.skip_ws();

    let ymd = match cursor.peek() {
        Some(c) if c.is_alphabetic() => Some(parse_verbose(&mut cursor, order, &mut parsed)?),
        Some(c) if c.is_ascii_digit() => {
            let after_digits = cursor.rest().trim_start_matches(|c: char| c.is_ascii_digit());
            match after_digits.starts_with(':') {
                true => {
                    parsed.set_time(parse_time(&mut cursor)?);
                    None
                }
                false => {
                    let ymd = parse_date(&mut cursor, order)?;
                    cursor.skip_ws();
                    cursor.eat('T');
                    if cursor.peek().is_some_and(|c| c.is_ascii_digit()) {
                        parsed.set_time(parse_time(&mut cursor)?);
                    }
                    Some(ymd)
                }
            }
        }
        _ => return Err(cursor.error("date or time")),
    };

    let bc = parse_suffix(&mut cursor, &mut parsed)?;

    if let Some(ymd) = ymd {
        let year = if bc { 1 - ymd.year } else { ymd.year };
        let date = Month::try_from(ymd.month)
            .ok()
            .and_then(|month| Date::from_calendar_date(year, month, ymd.day).ok())
            .and_then(|date| match parsed.end_of_day {
                true => date.next_day(),
                false => Some(date),
            });
        match date {
            Some(date) => parsed.date = Some(date),
            None => return Err(cursor.error_at(ymd.pos, "valid calendar date")),
        }
    } else if bc {
        return Err(cursor.error("date before era"));
    }

    Ok(parsed)
}

fn digits<'a>(cursor: &mut Cursor<'a>, expected: &'static str) -> Result<&'a str, ParseError> {
    let digits = cursor.take_while(|c| c.is_ascii_digit());
    match digits.is_empty() {
        true => Err(cursor.error(expected)),
        false => Ok(digits),
    }
}

fn number<T: std::str::FromStr>(cursor: &mut Cursor<'_>, expected: &'static str) -> Result<T, ParseError> {
    let start = cursor.pos();
    digits(cursor, expected)?
        .parse()
        .map_err(|_| cursor.error_at(start, expected))
}

/// `y-m-d`, `m/d/y`, `d.m.y`, `m-d-y` and their day first variants.
fn parse_date(cursor: &mut Cursor<'_>, order: DateOrder) -> Result<Ymd, ParseError> {
    let pos = cursor.pos();
    let a = digits(cursor, "digit")?;
    let sep = match cursor.peek() {
        Some(sep @ ('-' | '/' | '.')) => sep,
        _ => return Err(cursor.error("date separator")),
    };
    cursor.bump();
    let b = digits(cursor, "digit")?;
    cursor.expect(sep, "date separator")?;
    let c = digits(cursor, "year")?;

    let (y, m, d) = match (sep, order) {
        _ if a.len() >= 3 => (a, b, c),
        ('.', _) | (_, DateOrder::Dmy) => (c, b, a),
        _ => (c, a, b),
    };
    match (y.parse(), m.parse(), d.parse()) {
        (Ok(year), Ok(month), Ok(day)) => Ok(Ymd { year, month, day, pos }),
        _ => Err(cursor.error_at(pos, "valid calendar date")),
    }
}

/// `Dow Mon DD HH:MM:SS YYYY` or `Dow DD Mon HH:MM:SS YYYY`.
fn parse_verbose(cursor: &mut Cursor<'_>, order: DateOrder, parsed: &mut Parsed) -> Result<Ymd, ParseError> {
    let pos = cursor.pos();
    let mut word = cursor.take_while(char::is_alphabetic);
    if is_one_of(word, &WEEKDAYS) {
        cursor.skip_ws();
        word = cursor.take_while(char::is_alphabetic);
    }

    let (month, day) = match month_number(word) {
        Some(month) => {
            cursor.skip_ws();
            (month, number(cursor, "day of month")?)
        }
        None if word.is_empty() && order == DateOrder::Dmy => {
            let day = number(cursor, "day of month")?;
            cursor.skip_ws();
            let at = cursor.pos();
            let word = cursor.take_while(char::is_alphabetic);
            let month = month_number(word).ok_or_else(|| cursor.error_at(at, "month name"))?;
            (month, day)
        }
        None => return Err(cursor.error_at(pos, "month name")),
    };

    cursor.skip_ws();
    parsed.set_time(parse_time(cursor)?);
    cursor.skip_ws();
    let year = number(cursor, "year")?;
    Ok(Ymd { year, month, day, pos })
}

fn is_one_of(word: &str, names: &[&str]) -> bool {
    word.get(..3).is_some_and(|head| names.iter().any(|n| head.eq_ignore_ascii_case(n)))
}

fn month_number(word: &str) -> Option<u8> {
    let head = word.get(..3)?;
    MONTHS
        .iter()
        .position(|m| head.eq_ignore_ascii_case(m))
        .map(|i| i as u8 + 1)
}

/// `HH:MM[:SS[.ffffff]]`, [`None`] is `24:00:00`.
fn parse_time(cursor: &mut Cursor<'_>) -> Result<Option<Time>, ParseError> {
    let start = cursor.pos();
    let hour: u8 = number(cursor, "hour")?;
    cursor.expect(':', "`:`")?;
    let minute: u8 = number(cursor, "minute")?;
    let (mut second, mut micro) = (0u8, 0u32);
    if cursor.eat(':') {
        second = number(cursor, "second")?;
        if cursor.eat('.') {
            micro = fraction_micros(digits(cursor, "fractional second")?);
        }
    }
    if (hour, minute, second, micro) == (24, 0, 0, 0) {
        return Ok(None);
    }
    Time::from_hms_micro(hour, minute, second, micro)
        .map(Some)
        .map_err(|_| cursor.error_at(start, "valid time of day"))
}

/// `infinity` and `-infinity` of dates and timestamps.
fn infinity(text: &str) -> Option<Value> {
    let text = text.trim();
    let text = text.strip_prefix('+').unwrap_or(text);
    if text.eq_ignore_ascii_case("infinity") {
        Some(Value::Infinity)
    } else if text.eq_ignore_ascii_case("-infinity") {
        Some(Value::NegInfinity)
    } else {
        None
    }
}

fn format_infinity(value: &Value) -> Option<String> {
    match value {
        Value::Infinity => Some("infinity".into()),
        Value::NegInfinity => Some("-infinity".into()),
        _ => None,
    }
}

const END_OF_DAY: &str = "24:00:00";

/// Fractional digits as microseconds, extra precision is truncated.
pub(crate) fn fraction_micros(digits: &str) -> u32 {
    digits
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(6)
        .fold(0, |acc, b| acc * 10 + (b - b'0') as u32)
}

/// Trailing time zone and era, returns whether era is `BC`.
fn parse_suffix(cursor: &mut Cursor<'_>, parsed: &mut Parsed) -> Result<bool, ParseError> {
    let mut bc = false;
    loop {
        cursor.skip_ws();
        let start = cursor.pos();
        match cursor.peek() {
            None => return Ok(bc),
            Some(sign @ ('+' | '-')) if parsed.offset.is_none() => {
                cursor.bump();
                let offset = parse_offset(cursor, sign == '-')
                    .ok_or_else(|| cursor.error_at(start, "time zone offset"))?;
                parsed.offset = Some(offset);
            }
            Some(c) if c.is_alphabetic() => {
                let word = cursor.take_while(char::is_alphabetic);
                match word.to_ascii_uppercase().as_str() {
                    "BC" if !bc => bc = true,
                    "AD" => {}
                    "UTC" | "GMT" | "Z" if parsed.offset.is_none() => parsed.offset = Some(UtcOffset::UTC),
                    _ => return Err(cursor.error_at(start, "time zone offset or era")),
                }
            }
            Some(_) => return Err(cursor.error("end of input")),
        }
    }
}

/// `HH[:MM[:SS]]` or `HHMM`, sign already consumed.
fn parse_offset(cursor: &mut Cursor<'_>, negative: bool) -> Option<UtcOffset> {
    let head = cursor.take_while(|c| c.is_ascii_digit());
    let (hours, mut minutes, mut seconds): (i8, i8, i8) = match head.len() {
        1 | 2 => (head.parse().ok()?, 0, 0),
        4 => (head[..2].parse().ok()?, head[2..].parse().ok()?, 0),
        _ => return None,
    };
    if head.len() <= 2 && cursor.eat(':') {
        minutes = cursor.take_while(|c| c.is_ascii_digit()).parse().ok()?;
        if cursor.eat(':') {
            seconds = cursor.take_while(|c| c.is_ascii_digit()).parse().ok()?;
        }
    }
    let sign = if negative { -1 } else { 1 };
    UtcOffset::from_hms(sign * hours, sign * minutes, sign * seconds).ok()
}

fn format_date(date: Date, out: &mut String) -> Result<(), ShapeError> {
    match date.year() >= 1 {
        true => {
            let text = date.format(DATE_FORMAT).map_err(|e| ShapeError::new("date", e.to_string()))?;
            out.push_str(&text);
        }
        false => {
            let _ = write!(out, "{:04}-{:02}-{:02}", 1 - date.year(), date.month() as u8, date.day());
        }
    }
    Ok(())
}

fn format_time(time: Time, out: &mut String) -> Result<(), ShapeError> {
    let text = time.format(TIME_FORMAT).map_err(|e| ShapeError::new("time", e.to_string()))?;
    out.push_str(&text);
    let micro = time.microsecond();
    if micro != 0 {
        let frac = format!("{micro:06}");
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    Ok(())
}

fn format_offset(offset: UtcOffset, out: &mut String) {
    let (h, m, s) = offset.as_hms();
    let sign = if offset.is_negative() { '-' } else { '+' };
    let _ = write!(out, "{sign}{:02}", h.unsigned_abs());
    if m != 0 || s != 0 {
        let _ = write!(out, ":{:02}", m.unsigned_abs());
    }
    if s != 0 {
        let _ = write!(out, ":{:02}", s.unsigned_abs());
    }
}

fn era(date: Date, out: &mut String) {
    if date.year() < 1 {
        out.push_str(" BC");
    }
}

macro_rules! converter {
    ($(#[$meta:meta])* $name:ident, $pg:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name {
            order: DateOrder,
        }

        impl $name {
            pub const fn new(order: DateOrder) -> Self {
                Self { order }
            }

            fn parse_parts(&self, text: &str) -> Result<Parsed, ParseError> {
                parse(text, $pg, self.order)
            }

            #[allow(unused, reason = "time of day has no field order")]
            fn bound(&self, session: &Session) -> Option<DynConverter> {
                Some(Arc::new(Self { order: session.date_style.order }))
            }
        }
    };
}

converter!(
    /// `date`.
    DateConverter, "date"
);
converter!(
    /// `time without time zone`.
    TimeConverter, "time"
);
converter!(
    /// `time with time zone`.
    TimeTzConverter, "timetz"
);
converter!(
    /// `timestamp without time zone`.
    TimestampConverter, "timestamp"
);
converter!(
    /// `timestamp with time zone`, a missing offset is taken as UTC.
    TimestampTzConverter, "timestamptz"
);

fn unexpected(text: &str, name: &str, expected: &'static str) -> ParseError {
    ParseError::new(name, expected, text, 0)
}

impl Converter for DateConverter {
    fn name(&self) -> &str {
        "date"
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        if let Some(infinity) = infinity(text) {
            return Ok(infinity);
        }
        match self.parse_parts(text)? {
            Parsed { date: Some(date), time: None, offset: None, .. } => Ok(Value::Date(date)),
            _ => Err(unexpected(text, self.name(), "date without time")),
        }
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        if let Some(text) = format_infinity(value) {
            return Ok(text);
        }
        let Value::Date(date) = value else {
            return Err(ShapeError::mismatch(self.name(), "date", value));
        };
        let mut out = String::with_capacity(13);
        format_date(*date, &mut out)?;
        era(*date, &mut out);
        Ok(out)
    }

    fn bind(&self, session: &Session) -> Option<DynConverter> {
        self.bound(session)
    }
}

impl Converter for TimeConverter {
    fn name(&self) -> &str {
        "time"
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        match self.parse_parts(text)? {
            Parsed { date: None, time: Some(_), offset: None, end_of_day: true } => Ok(Value::EndOfDay(None)),
            Parsed { date: None, time: Some(time), offset: None, .. } => Ok(Value::Time(time)),
            _ => Err(unexpected(text, self.name(), "time of day without offset")),
        }
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        let time = match value {
            Value::Time(time) => time,
            Value::EndOfDay(None) => return Ok(END_OF_DAY.into()),
            _ => return Err(ShapeError::mismatch(self.name(), "time", value)),
        };
        let mut out = String::with_capacity(15);
        format_time(*time, &mut out)?;
        Ok(out)
    }
}

impl Converter for TimeTzConverter {
    fn name(&self) -> &str {
        "timetz"
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        match self.parse_parts(text)? {
            Parsed { date: None, time: Some(_), offset: Some(offset), end_of_day: true } => {
                Ok(Value::EndOfDay(Some(offset)))
            }
            Parsed { date: None, time: Some(time), offset: Some(offset), .. } => Ok(Value::TimeTz(time, offset)),
            _ => Err(unexpected(text, self.name(), "time of day with offset")),
        }
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        let mut out = String::with_capacity(24);
        match value {
            Value::TimeTz(time, offset) => {
                format_time(*time, &mut out)?;
                format_offset(*offset, &mut out);
            }
            Value::EndOfDay(Some(offset)) => {
                out.push_str(END_OF_DAY);
                format_offset(*offset, &mut out);
            }
            _ => return Err(ShapeError::mismatch(self.name(), "time with offset", value)),
        }
        Ok(out)
    }
}

impl Converter for TimestampConverter {
    fn name(&self) -> &str {
        "timestamp"
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        if let Some(infinity) = infinity(text) {
            return Ok(infinity);
        }
        match self.parse_parts(text)? {
            Parsed { date: Some(date), time, offset: None, .. } => {
                Ok(Value::Timestamp(PrimitiveDateTime::new(date, time.unwrap_or(Time::MIDNIGHT))))
            }
            _ => Err(unexpected(text, self.name(), "date and time without offset")),
        }
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        if let Some(text) = format_infinity(value) {
            return Ok(text);
        }
        let Value::Timestamp(ts) = value else {
            return Err(ShapeError::mismatch(self.name(), "timestamp", value));
        };
        let mut out = String::with_capacity(29);
        format_date(ts.date(), &mut out)?;
        out.push(' ');
        format_time(ts.time(), &mut out)?;
        era(ts.date(), &mut out);
        Ok(out)
    }

    fn bind(&self, session: &Session) -> Option<DynConverter> {
        self.bound(session)
    }
}

impl Converter for TimestampTzConverter {
    fn name(&self) -> &str {
        "timestamptz"
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        if let Some(infinity) = infinity(text) {
            return Ok(infinity);
        }
        match self.parse_parts(text)? {
            Parsed { date: Some(date), time, offset, .. } => {
                let ts = PrimitiveDateTime::new(date, time.unwrap_or(Time::MIDNIGHT));
                Ok(Value::TimestampTz(ts.assume_offset(offset.unwrap_or(UtcOffset::UTC))))
            }
            _ => Err(unexpected(text, self.name(), "date and time")),
        }
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        if let Some(text) = format_infinity(value) {
            return Ok(text);
        }
        let ts: OffsetDateTime = match value {
            Value::TimestampTz(ts) => *ts,
            other => return Err(ShapeError::mismatch(self.name(), "timestamp with offset", other)),
        };
        let mut out = String::with_capacity(35);
        format_date(ts.date(), &mut out)?;
        out.push(' ');
        format_time(ts.time(), &mut out)?;
        format_offset(ts.offset(), &mut out);
        era(ts.date(), &mut out);
        Ok(out)
    }

    fn bind(&self, session: &Session) -> Option<DynConverter> {
        self.bound(session)
    }
}
