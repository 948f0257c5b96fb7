//! `interval` converter.
//!
//! Input is read in any `IntervalStyle` without being told which one:
//!
//! - `iso_8601`, `P1Y2M3DT4H5M6.5S`
//! - `sql_standard`, `1-2 3 4:05:06.5`
//! - `postgres`, `1 year 2 mons 3 days 04:05:06.5`
//! - `postgres_verbose`, `@ 1 year 2 mons 3 days 4 hours 5 mins 6.5 secs ago`
//!
//! Output is always ISO 8601.
use std::fmt::Write;

use crate::{
    common::Cursor,
    value::{Interval, MICROS_PER_HOUR, MICROS_PER_MINUTE, MICROS_PER_SECOND, Value},
};

use super::{Converter, ParseError, ShapeError, datetime::fraction_micros};

/// `interval`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntervalConverter;

impl Converter for IntervalConverter {
    fn name(&self) -> &str {
        "interval"
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        let mut cursor = Cursor::new(text, self.name());
        cursor.skip_ws();
        let mut fields = match cursor.peek() {
            Some('P' | 'p') => {
                cursor.bump();
                parse_iso(&mut cursor)?
            }
            _ => parse_words(&mut cursor)?,
        };
        fields.finish(&cursor)
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        match value {
            Value::Interval(interval) => Ok(format_iso(interval)),
            other => Err(ShapeError::mismatch(self.name(), "interval", other)),
        }
    }
}

/// Interval field a number can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Millennium,
    Century,
    Decade,
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
    Microsecond,
}

impl Unit {
    fn from_word(word: &str) -> Option<Unit> {
        Some(match word.to_ascii_lowercase().as_str() {
            "millennium" | "millennia" | "millenniums" | "mil" | "mils" => Unit::Millennium,
            "century" | "centuries" | "cent" | "c" => Unit::Century,
            "decade" | "decades" | "dec" | "decs" => Unit::Decade,
            "year" | "years" | "yr" | "yrs" | "y" => Unit::Year,
            "month" | "months" | "mon" | "mons" => Unit::Month,
            "week" | "weeks" | "w" => Unit::Week,
            "day" | "days" | "d" => Unit::Day,
            "hour" | "hours" | "hr" | "hrs" | "h" => Unit::Hour,
            "minute" | "minutes" | "min" | "mins" | "m" => Unit::Minute,
            "second" | "seconds" | "sec" | "secs" | "s" => Unit::Second,
            "millisecond" | "milliseconds" | "msec" | "msecs" | "ms" => Unit::Millisecond,
            "microsecond" | "microseconds" | "usec" | "usecs" | "us" => Unit::Microsecond,
            _ => return None,
        })
    }

    const fn bit(self) -> u16 {
        1 << self as u16
    }

    const fn allows_fraction(self) -> bool {
        matches!(self, Unit::Second | Unit::Millisecond | Unit::Microsecond)
    }
}

/// Signed number, fraction kept as millionths.
#[derive(Debug, Clone, Copy)]
struct Number {
    negative: bool,
    int: i64,
    frac: Option<u32>,
}

/// Running totals, with the set of fields already assigned.
#[derive(Debug, Default)]
struct Fields {
    months: i128,
    days: i128,
    micros: i128,
    assigned: u16,
    invert: bool,
}

impl Fields {
    fn assign(&mut self, cursor: &Cursor, pos: usize, unit: Unit, n: Number) -> Result<(), ParseError> {
        if self.assigned & unit.bit() != 0 {
            return Err(cursor.error_at(pos, "each interval field at most once"));
        }
        if n.frac.is_some() && !unit.allows_fraction() {
            return Err(cursor.error_at(pos, "integer, only seconds may be fractional"));
        }
        self.assigned |= unit.bit();

        let sign: i128 = if n.negative { -1 } else { 1 };
        let int = n.int as i128;
        let frac = n.frac.unwrap_or(0) as i128;
        match unit {
            Unit::Millennium => self.months += sign * int * 12_000,
            Unit::Century => self.months += sign * int * 1_200,
            Unit::Decade => self.months += sign * int * 120,
            Unit::Year => self.months += sign * int * 12,
            Unit::Month => self.months += sign * int,
            Unit::Week => self.days += sign * int * 7,
            Unit::Day => self.days += sign * int,
            Unit::Hour => self.micros += sign * int * MICROS_PER_HOUR as i128,
            Unit::Minute => self.micros += sign * int * MICROS_PER_MINUTE as i128,
            Unit::Second => self.micros += sign * (int * MICROS_PER_SECOND as i128 + frac),
            Unit::Millisecond => self.micros += sign * (int * 1_000 + frac / 1_000),
            Unit::Microsecond => self.micros += sign * int,
        }
        Ok(())
    }

    fn finish(&mut self, cursor: &Cursor) -> Result<Value, ParseError> {
        if self.assigned == 0 {
            return Err(cursor.error_at(0, "at least one interval field"));
        }
        let sign = if self.invert { -1 } else { 1 };
        match (
            i32::try_from(sign * self.months),
            i32::try_from(sign * self.days),
            i64::try_from(sign * self.micros),
        ) {
            (Ok(months), Ok(days), Ok(micros)) => Ok(Value::Interval(Interval::new(months, days, micros))),
            _ => Err(cursor.error_at(0, "interval within range")),
        }
    }
}

/// `[+-]digits[.digits]`
fn parse_number(cursor: &mut Cursor<'_>) -> Result<Number, ParseError> {
    let negative = match cursor.peek() {
        Some('-') => true,
        Some('+') => false,
        _ => return parse_unsigned(cursor, false),
    };
    cursor.bump();
    parse_unsigned(cursor, negative)
}

fn parse_unsigned(cursor: &mut Cursor<'_>, negative: bool) -> Result<Number, ParseError> {
    let start = cursor.pos();
    let int = cursor.take_while(|c| c.is_ascii_digit());
    let frac = match cursor.peek() == Some('.') && cursor.peek_second().is_some_and(|c| c.is_ascii_digit()) {
        true => {
            cursor.bump();
            Some(fraction_micros(cursor.take_while(|c| c.is_ascii_digit())))
        }
        false => None,
    };
    if int.is_empty() && frac.is_none() {
        return Err(cursor.error("number"));
    }
    let int = match int.is_empty() {
        true => 0,
        false => int.parse().map_err(|_| cursor.error_at(start, "number within range"))?,
    };
    Ok(Number { negative, int, frac })
}

/// `P[nY][nM][nW][nD][T[nH][nM][nS]]`, `P` already consumed.
fn parse_iso(cursor: &mut Cursor<'_>) -> Result<Fields, ParseError> {
    let mut fields = Fields::default();
    let mut time = false;
    loop {
        if cursor.is_eof() {
            break;
        }
        if !time && cursor.eat('T') {
            time = true;
            if cursor.is_eof() {
                return Err(cursor.error("time field"));
            }
            continue;
        }
        let pos = cursor.pos();
        let n = parse_number(cursor)?;
        let unit = match (time, cursor.bump().map(|c| c.to_ascii_uppercase())) {
            (false, Some('Y')) => Unit::Year,
            (false, Some('M')) => Unit::Month,
            (false, Some('W')) => Unit::Week,
            (false, Some('D')) => Unit::Day,
            (true, Some('H')) => Unit::Hour,
            (true, Some('M')) => Unit::Minute,
            (true, Some('S')) => Unit::Second,
            (false, _) => return Err(cursor.error_at(cursor.pos().saturating_sub(1), "one of `Y`, `M`, `W`, `D` or `T`")),
            (true, _) => return Err(cursor.error_at(cursor.pos().saturating_sub(1), "one of `H`, `M` or `S`")),
        };
        fields.assign(cursor, pos, unit, n)?;
    }
    Ok(fields)
}

#[derive(Debug)]
enum Token {
    Number(Number),
    /// `y-m`
    YearMonth(Number, i64),
    /// `[+-]h:m[:s[.f]]`, in microseconds.
    Time(i128),
    Unit(Unit),
    Ago,
}

/// Tokenize every non ISO style.
fn tokenize(cursor: &mut Cursor<'_>) -> Result<Vec<(usize, Token)>, ParseError> {
    let mut tokens = vec![];
    cursor.skip_ws();
    if cursor.eat('@') {
        cursor.skip_ws();
    }
    while !cursor.is_eof() {
        let pos = cursor.pos();
        let token = match cursor.peek() {
            Some(c) if c.is_alphabetic() => {
                let word = cursor.take_while(char::is_alphabetic);
                match word.eq_ignore_ascii_case("ago") {
                    true => Token::Ago,
                    false => match Unit::from_word(word) {
                        Some(unit) => Token::Unit(unit),
                        None => return Err(cursor.error_at(pos, "interval unit")),
                    },
                }
            }
            Some(c) if c.is_ascii_digit() || matches!(c, '+' | '-' | '.') => {
                let n = parse_number(cursor)?;
                match cursor.peek() {
                    Some(':') if n.frac.is_none() => Token::Time(parse_clock(cursor, n)?),
                    Some('-') if n.frac.is_none() && cursor.peek_second().is_some_and(|c| c.is_ascii_digit()) => {
                        cursor.bump();
                        let month = cursor.take_while(|c| c.is_ascii_digit());
                        let month = month.parse().map_err(|_| cursor.error_at(pos, "month number"))?;
                        Token::YearMonth(n, month)
                    }
                    _ => Token::Number(n),
                }
            }
            _ => return Err(cursor.error("number or interval unit")),
        };
        tokens.push((pos, token));
        cursor.skip_ws();
        cursor.eat(',');
        cursor.skip_ws();
    }
    Ok(tokens)
}

/// Rest of `h:m[:s[.f]]`, hours already read.
fn parse_clock(cursor: &mut Cursor<'_>, hours: Number) -> Result<i128, ParseError> {
    cursor.expect(':', "`:`")?;
    let minutes = cursor.take_while(|c| c.is_ascii_digit());
    let minutes: i128 = minutes.parse().map_err(|_| cursor.error("minutes"))?;
    let mut seconds = 0;
    if cursor.eat(':') {
        let start = cursor.pos();
        let n = parse_unsigned(cursor, false)?;
        if n.int >= 60 {
            return Err(cursor.error_at(start, "seconds below 60"));
        }
        seconds = n.int as i128 * MICROS_PER_SECOND as i128 + n.frac.unwrap_or(0) as i128;
    }
    if minutes >= 60 {
        return Err(cursor.error("minutes below 60"));
    }
    let total = hours.int as i128 * MICROS_PER_HOUR as i128 + minutes * MICROS_PER_MINUTE as i128 + seconds;
    Ok(if hours.negative { -total } else { total })
}

/// Fold tokens right to left, numbers take the unit that follows them.
fn parse_words(cursor: &mut Cursor<'_>) -> Result<Fields, ParseError> {
    let tokens = tokenize(cursor)?;
    let mut fields = Fields::default();
    let mut unit = None;

    for (pos, token) in tokens.into_iter().rev() {
        match token {
            Token::Ago => match fields.invert {
                false => fields.invert = true,
                true => return Err(cursor.error_at(pos, "a single `ago`")),
            },
            Token::Unit(u) => {
                if unit.is_some() {
                    return Err(cursor.error_at(pos, "number before interval unit"));
                }
                unit = Some(u);
            }
            Token::Number(n) => {
                let target = match unit.take() {
                    Some(u) => u,
                    // sql standard `d h:m:s`
                    None if fields.assigned & Unit::Hour.bit() != 0 => Unit::Day,
                    None => Unit::Second,
                };
                fields.assign(cursor, pos, target, n)?;
            }
            Token::YearMonth(years, months) => {
                if unit.is_some() {
                    return Err(cursor.error_at(pos, "number before interval unit"));
                }
                fields.assign(cursor, pos, Unit::Year, Number { frac: None, ..years })?;
                let months = Number { negative: years.negative, int: months, frac: None };
                fields.assign(cursor, pos, Unit::Month, months)?;
            }
            Token::Time(micros) => {
                if unit.is_some() {
                    return Err(cursor.error_at(pos, "number before interval unit"));
                }
                for u in [Unit::Hour, Unit::Minute, Unit::Second] {
                    if fields.assigned & u.bit() != 0 {
                        return Err(cursor.error_at(pos, "each interval field at most once"));
                    }
                    fields.assigned |= u.bit();
                }
                fields.micros += micros;
            }
        }
    }

    if unit.is_some() {
        return Err(cursor.error_at(0, "number before interval unit"));
    }
    Ok(fields)
}

fn format_iso(interval: &Interval) -> String {
    if interval.is_zero() {
        return "PT0S".into();
    }

    let mut out = String::from("P");
    let months = interval.months();
    let (years, months) = (months / 12, months % 12);
    for (n, designator) in [(years, 'Y'), (months, 'M'), (interval.days(), 'D')] {
        if n != 0 {
            let _ = write!(out, "{n}{designator}");
        }
    }

    let micros = interval.microseconds();
    if micros != 0 {
        out.push('T');
        let hours = micros / MICROS_PER_HOUR;
        let minutes = micros % MICROS_PER_HOUR / MICROS_PER_MINUTE;
        let rest = micros % MICROS_PER_MINUTE;
        if hours != 0 {
            let _ = write!(out, "{hours}H");
        }
        if minutes != 0 {
            let _ = write!(out, "{minutes}M");
        }
        if rest != 0 {
            if rest < 0 {
                out.push('-');
            }
            let rest = rest.unsigned_abs();
            let _ = write!(out, "{}", rest / MICROS_PER_SECOND as u64);
            let frac = rest % MICROS_PER_SECOND as u64;
            if frac != 0 {
                let frac = format!("{frac:06}");
                let _ = write!(out, ".{}", frac.trim_end_matches('0'));
            }
            out.push('S');
        }
    }
    out
}
