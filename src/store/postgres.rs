//! PostgreSQL adapter on tokio-postgres
//!
//! Cells are fetched as raw binary values and decoded per [`SqlType`] and
//! the column's PostgreSQL type. Known types are rendered the way
//! PostgreSQL prints them; a type with no known binary layout is a decode
//! error.

use std::error::Error as StdError;
use std::fmt::Write;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres_protocol::types::inet_from_sql;
use tokio::task::JoinHandle;
use tokio_postgres::types::{FromSql, Kind, ToSql, Type};
use tokio_postgres::{Client, NoTls, Row, Statement};
use uuid::Uuid;

use crate::observability::{log_event_at, Event, Severity};

use super::errors::{StoreError, StoreResult};
use super::row::{Cell, CellValue, QueryParam, ResultRow, ResultRowSet, SqlType};
use super::{StoreConnection, StoreConnector};

/// How long to wait for the driver task after the client is dropped
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

type DecodeError = Box<dyn StdError + Sync + Send>;

/// Opens plain (non-TLS) PostgreSQL connections
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

/// A PostgreSQL client plus the task driving its socket
pub struct PgConnection {
    client: Client,
    driver: JoinHandle<()>,
}

#[async_trait]
impl StoreConnector for PgConnector {
    type Connection = PgConnection;

    async fn connect(&self, conn_string: &str) -> StoreResult<PgConnection> {
        let (client, connection) = tokio_postgres::connect(conn_string, NoTls)
            .await
            .map_err(|e| StoreError::Connect(describe(&e)))?;

        let driver = tokio::spawn(async move {
            if let Err(err) = connection.await {
                log_event_at(
                    Severity::Error,
                    Event::StoreConnectionLost,
                    &[("reason", &describe(&err))],
                );
            }
        });

        Ok(PgConnection { client, driver })
    }
}

#[async_trait]
impl StoreConnection for PgConnection {
    type Statement = Statement;

    async fn prepare(&self, name: &str, sql: &str) -> StoreResult<Statement> {
        self.client
            .prepare(sql)
            .await
            .map_err(|e| StoreError::Prepare {
                name: name.to_string(),
                reason: describe(&e),
            })
    }

    async fn query(&self, statement: &Statement, params: &[QueryParam]) -> StoreResult<ResultRowSet> {
        let bound: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|param| match param {
                QueryParam::Int(v) => v as &(dyn ToSql + Sync),
                QueryParam::Text(s) => s as &(dyn ToSql + Sync),
            })
            .collect();

        let rows = self
            .client
            .query(statement, &bound)
            .await
            .map_err(|e| StoreError::Query(describe(&e)))?;

        rows.iter()
            .map(convert_row)
            .collect::<StoreResult<Vec<_>>>()
            .map(ResultRowSet::new)
    }

    async fn close(self) -> StoreResult<()> {
        let PgConnection { client, mut driver } = self;

        // Dropping the client sends Terminate and lets the driver finish
        drop(client);

        match tokio::time::timeout(CLOSE_TIMEOUT, &mut driver).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(join_err)) => Err(StoreError::Query(format!(
                "connection driver ended abnormally: {}",
                join_err
            ))),
            Err(_) => {
                driver.abort();
                Err(StoreError::Query(
                    "timed out waiting for the connection to close".to_string(),
                ))
            }
        }
    }
}

/// Any column, taken as its raw binary value
struct RawField<'a>(&'a [u8]);

impl<'a> FromSql<'a> for RawField<'a> {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, DecodeError> {
        Ok(RawField(raw))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Types whose binary form is their text form
const TEXT_FORM_TYPES: &[&str] = &["citext", "xml", "unknown"];

fn convert_row(row: &Row) -> StoreResult<ResultRow> {
    let mut cells = Vec::with_capacity(row.len());

    for (idx, column) in row.columns().iter().enumerate() {
        let ty = base_type(column.type_());
        let sql_type = SqlType::from_oid(ty.oid());
        let decode_err = |reason: String| StoreError::Decode {
            column: column.name().to_string(),
            reason,
        };

        let raw: Option<RawField<'_>> = row
            .try_get(idx)
            .map_err(|e| decode_err(e.to_string()))?;

        let value = match raw {
            None => CellValue::Null,
            Some(RawField(bytes)) => {
                decode_value(sql_type, ty, bytes).map_err(|e| decode_err(e.to_string()))?
            }
        };

        cells.push(Cell::new(column.name(), sql_type, value));
    }

    Ok(ResultRow::new(cells))
}

/// Domains travel as their underlying type
fn base_type(ty: &Type) -> &Type {
    match ty.kind() {
        Kind::Domain(base) => base_type(base),
        _ => ty,
    }
}

fn decode_value(sql_type: SqlType, ty: &Type, raw: &[u8]) -> Result<CellValue, DecodeError> {
    let value = match sql_type {
        SqlType::Int2 => CellValue::Integer(i16::from_sql(ty, raw)?.into()),
        SqlType::Int4 => CellValue::Integer(i32::from_sql(ty, raw)?.into()),
        SqlType::Int8 => CellValue::Integer(i64::from_sql(ty, raw)?),
        SqlType::Bool => {
            let text = if bool::from_sql(ty, raw)? { "t" } else { "f" };
            CellValue::Text(text.to_string())
        }
        SqlType::Float4 => CellValue::Text(f32::from_sql(ty, raw)?.to_string()),
        SqlType::Float8 => CellValue::Text(f64::from_sql(ty, raw)?.to_string()),
        SqlType::Numeric => CellValue::Text(numeric_to_text(raw)?),
        SqlType::Uuid => CellValue::Text(Uuid::from_sql(ty, raw)?.to_string()),
        SqlType::Text | SqlType::Varchar | SqlType::Char | SqlType::Name => {
            CellValue::Text(String::from_sql(ty, raw)?)
        }
        SqlType::Timestamp => CellValue::Text(trim_fraction(
            NaiveDateTime::from_sql(ty, raw)?
                .format("%Y-%m-%d %H:%M:%S%.f")
                .to_string(),
        )),
        SqlType::TimestampTz => {
            let mut text = trim_fraction(
                DateTime::<Utc>::from_sql(ty, raw)?
                    .format("%Y-%m-%d %H:%M:%S%.f")
                    .to_string(),
            );
            text.push_str("+00");
            CellValue::Text(text)
        }
        SqlType::Date => {
            CellValue::Text(NaiveDate::from_sql(ty, raw)?.format("%Y-%m-%d").to_string())
        }
        SqlType::Json | SqlType::Jsonb => {
            CellValue::Text(serde_json::Value::from_sql(ty, raw)?.to_string())
        }
        SqlType::Bytea => CellValue::Bytes(raw.to_vec()),
        SqlType::Unknown(_) => CellValue::Text(other_to_text(ty, raw)?),
    };

    Ok(value)
}

/// Text form of a type without its own tag
///
/// Fails for types with no known binary layout rather than passing wire
/// bytes through.
fn other_to_text(ty: &Type, raw: &[u8]) -> Result<String, DecodeError> {
    if let Kind::Array(member) = ty.kind() {
        return array_to_text(ty, member, raw);
    }
    if matches!(ty.kind(), Kind::Enum(_)) || TEXT_FORM_TYPES.contains(&ty.name()) {
        return Ok(String::from_utf8(raw.to_vec())?);
    }

    let text = match *ty {
        Type::OID => u32::from_sql(ty, raw)?.to_string(),
        Type::TIME => trim_fraction(NaiveTime::from_sql(ty, raw)?.format("%H:%M:%S%.f").to_string()),
        Type::TIMETZ => timetz_to_text(raw)?,
        Type::INTERVAL => interval_to_text(raw)?,
        Type::INET | Type::CIDR => inet_to_text(ty, raw)?,
        _ => return Err(format!("no text form for type {}", ty.name()).into()),
    };
    Ok(text)
}

/// `{a,b,NULL}` with PostgreSQL's element quoting; one dimension only
fn array_to_text(ty: &Type, member: &Type, raw: &[u8]) -> Result<String, DecodeError> {
    let elements: Vec<Option<RawField<'_>>> = Vec::from_sql(ty, raw)?;
    let member = base_type(member);
    let member_sql_type = SqlType::from_oid(member.oid());

    let mut out = String::from("{");
    for (i, element) in elements.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let text = match element {
            Some(RawField(bytes)) => decode_value(member_sql_type, member, bytes)?.to_text(),
            None => None,
        };
        match text {
            Some(text) => push_array_element(&mut out, &text),
            None => out.push_str("NULL"),
        }
    }
    out.push('}');
    Ok(out)
}

fn push_array_element(out: &mut String, text: &str) {
    let quoted = text.is_empty()
        || text.eq_ignore_ascii_case("NULL")
        || text.chars().any(|c| {
            matches!(c, '{' | '}' | ',' | '"' | '\\' | '\x0b') || c.is_ascii_whitespace()
        });

    if !quoted {
        out.push_str(text);
        return;
    }

    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

/// `HH:MM:SS[.ffffff]`, hours unbounded, trailing fraction zeros dropped
fn clock_text(micros: u64) -> String {
    let secs = micros / 1_000_000;
    let mut out = format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60);

    let frac = micros % 1_000_000;
    if frac != 0 {
        let digits = format!("{:06}", frac);
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    out
}

fn trim_fraction(text: String) -> String {
    if !text.contains('.') {
        return text;
    }
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// `time with time zone`: microseconds, then the zone in seconds west of UTC
fn timetz_to_text(raw: &[u8]) -> Result<String, DecodeError> {
    if raw.len() != 12 {
        return Err("timetz value must be 12 bytes".into());
    }
    let micros = i64::from_be_bytes(raw[..8].try_into()?);
    let west = i32::from_be_bytes(raw[8..].try_into()?);

    let mut out = clock_text(micros.unsigned_abs());
    out.push(if west <= 0 { '+' } else { '-' });

    let zone = west.unsigned_abs();
    let (hours, minutes, seconds) = (zone / 3600, zone / 60 % 60, zone % 60);
    let _ = write!(out, "{:02}", hours);
    if minutes != 0 || seconds != 0 {
        let _ = write!(out, ":{:02}", minutes);
    }
    if seconds != 0 {
        let _ = write!(out, ":{:02}", seconds);
    }
    Ok(out)
}

/// Interval in the default `postgres` output style
fn interval_to_text(raw: &[u8]) -> Result<String, DecodeError> {
    if raw.len() != 16 {
        return Err("interval value must be 16 bytes".into());
    }
    let micros = i64::from_be_bytes(raw[..8].try_into()?);
    let days = i32::from_be_bytes(raw[8..12].try_into()?);
    let months = i32::from_be_bytes(raw[12..].try_into()?);

    let mut out = String::new();
    let mut is_before = false;

    for (value, unit) in [(months / 12, "year"), (months % 12, "mon"), (days, "day")] {
        if value == 0 {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        let sign = if is_before && value > 0 { "+" } else { "" };
        let plural = if value != 1 { "s" } else { "" };
        let _ = write!(out, "{}{} {}{}", sign, value, unit, plural);
        is_before = value < 0;
    }

    if out.is_empty() || micros != 0 {
        if !out.is_empty() {
            out.push(' ');
        }
        if micros < 0 {
            out.push('-');
        } else if is_before {
            out.push('+');
        }
        out.push_str(&clock_text(micros.unsigned_abs()));
    }
    Ok(out)
}

/// `inet` drops a full-length mask, `cidr` always prints it
fn inet_to_text(ty: &Type, raw: &[u8]) -> Result<String, DecodeError> {
    let inet = inet_from_sql(raw)?;
    let addr = inet.addr();
    let full_mask = if addr.is_ipv4() { 32 } else { 128 };

    if *ty == Type::INET && inet.netmask() == full_mask {
        Ok(addr.to_string())
    } else {
        Ok(format!("{}/{}", addr, inet.netmask()))
    }
}

/// Render a binary NUMERIC the way PostgreSQL prints it
fn numeric_to_text(raw: &[u8]) -> Result<String, DecodeError> {
    if raw.len() < 8 {
        return Err("numeric value too short".into());
    }

    let read_u16 = |at: usize| u16::from_be_bytes([raw[at], raw[at + 1]]);
    let ndigits = read_u16(0) as usize;
    let weight = read_u16(2) as i16 as i32;
    let sign = read_u16(4);
    let dscale = read_u16(6) as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(format!("invalid numeric sign {:#06x}", other).into()),
    }

    if raw.len() != 8 + ndigits * 2 {
        return Err("numeric digit count does not match payload".into());
    }
    let digits: Vec<u16> = (0..ndigits).map(|i| read_u16(8 + i * 2)).collect();
    let digit_at = |idx: i32| -> u16 {
        if idx >= 0 && (idx as usize) < digits.len() {
            digits[idx as usize]
        } else {
            0
        }
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        for idx in 0..=weight {
            if idx == 0 {
                let _ = write!(out, "{}", digit_at(idx));
            } else {
                let _ = write!(out, "{:04}", digit_at(idx));
            }
        }
    }

    if dscale > 0 {
        let groups = (dscale + 3) / 4;
        let mut frac = String::with_capacity(groups * 4);
        for k in 1..=groups as i32 {
            let _ = write!(frac, "{:04}", digit_at(weight + k));
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }

    Ok(out)
}

fn describe(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => format!("{}: {}", db.code().code(), db.message()),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(ndigits: u16, weight: i16, sign: u16, dscale: u16, digits: &[u16]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&ndigits.to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            raw.extend_from_slice(&d.to_be_bytes());
        }
        raw
    }

    fn interval(micros: i64, days: i32, months: i32) -> Vec<u8> {
        let mut raw = micros.to_be_bytes().to_vec();
        raw.extend_from_slice(&days.to_be_bytes());
        raw.extend_from_slice(&months.to_be_bytes());
        raw
    }

    /// One-dimensional array payload; `None` elements are NULL
    fn array(element_oid: u32, elements: &[Option<&[u8]>]) -> Vec<u8> {
        let has_null = elements.iter().any(Option::is_none) as i32;
        let mut raw = Vec::new();
        raw.extend_from_slice(&1i32.to_be_bytes());
        raw.extend_from_slice(&has_null.to_be_bytes());
        raw.extend_from_slice(&element_oid.to_be_bytes());
        raw.extend_from_slice(&(elements.len() as i32).to_be_bytes());
        raw.extend_from_slice(&1i32.to_be_bytes());
        for element in elements {
            match element {
                Some(bytes) => {
                    raw.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
                    raw.extend_from_slice(bytes);
                }
                None => raw.extend_from_slice(&(-1i32).to_be_bytes()),
            }
        }
        raw
    }

    fn text_of(ty: &Type, raw: &[u8]) -> String {
        match decode_value(SqlType::from_oid(ty.oid()), ty, raw).unwrap() {
            CellValue::Text(text) => text,
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_with_fraction() {
        // 12345.678 = [1, 2345, 6780] weight 1, scale 3
        let raw = numeric(3, 1, NUMERIC_POS, 3, &[1, 2345, 6780]);
        assert_eq!(numeric_to_text(&raw).unwrap(), "12345.678");
    }

    #[test]
    fn test_numeric_small_negative() {
        // -0.05 = [500] weight -1, scale 2
        let raw = numeric(1, -1, NUMERIC_NEG, 2, &[500]);
        assert_eq!(numeric_to_text(&raw).unwrap(), "-0.05");
    }

    #[test]
    fn test_numeric_trailing_zero_groups() {
        // 20000 = [2] weight 1, scale 0
        let raw = numeric(1, 1, NUMERIC_POS, 0, &[2]);
        assert_eq!(numeric_to_text(&raw).unwrap(), "20000");
    }

    #[test]
    fn test_numeric_special_values() {
        assert_eq!(numeric_to_text(&numeric(0, 0, NUMERIC_NAN, 0, &[])).unwrap(), "NaN");
        assert!(numeric_to_text(&[0, 1]).is_err());
    }

    #[test]
    fn test_uuid_text() {
        let raw: Vec<u8> = (0u8..16).collect();
        assert_eq!(
            text_of(&Type::UUID, &raw),
            "00010203-0405-0607-0809-0a0b0c0d0e0f"
        );
    }

    #[test]
    fn test_int_and_bool_decoding() {
        let value = decode_value(SqlType::Int4, &Type::INT4, &42i32.to_be_bytes()).unwrap();
        assert_eq!(value, CellValue::Integer(42));

        let value = decode_value(SqlType::Bool, &Type::BOOL, &[1]).unwrap();
        assert_eq!(value, CellValue::Text("t".to_string()));
    }

    #[test]
    fn test_timestamp_fraction_trimmed() {
        // 2000-01-01 00:00:01.5, microseconds since the PostgreSQL epoch
        let raw = 1_500_000i64.to_be_bytes();
        assert_eq!(text_of(&Type::TIMESTAMP, &raw), "2000-01-01 00:00:01.5");
        assert_eq!(text_of(&Type::TIMESTAMPTZ, &raw), "2000-01-01 00:00:01.5+00");

        let whole = 0i64.to_be_bytes();
        assert_eq!(text_of(&Type::TIMESTAMP, &whole), "2000-01-01 00:00:00");
    }

    #[test]
    fn test_time_text() {
        let noon = (12i64 * 3_600_000_000).to_be_bytes();
        assert_eq!(text_of(&Type::TIME, &noon), "12:00:00");

        let fractional = (3_600_000_000i64 + 250_000).to_be_bytes();
        assert_eq!(text_of(&Type::TIME, &fractional), "01:00:00.25");
    }

    #[test]
    fn test_timetz_text() {
        let mut raw = (12i64 * 3_600_000_000).to_be_bytes().to_vec();
        raw.extend_from_slice(&(-7200i32).to_be_bytes());
        assert_eq!(text_of(&Type::TIMETZ, &raw), "12:00:00+02");

        let mut raw = 0i64.to_be_bytes().to_vec();
        raw.extend_from_slice(&(5 * 3600 + 30 * 60i32).to_be_bytes());
        assert_eq!(text_of(&Type::TIMETZ, &raw), "00:00:00-05:30");
    }

    #[test]
    fn test_interval_text() {
        assert_eq!(text_of(&Type::INTERVAL, &interval(0, 1, 0)), "1 day");
        assert_eq!(text_of(&Type::INTERVAL, &interval(0, 0, 0)), "00:00:00");
        assert_eq!(
            text_of(&Type::INTERVAL, &interval(4 * 3_600_000_000 + 5_000_000, 3, 14)),
            "1 year 2 mons 3 days 04:00:05"
        );
        assert_eq!(text_of(&Type::INTERVAL, &interval(1_500_000, 0, 0)), "00:00:01.5");
        assert_eq!(text_of(&Type::INTERVAL, &interval(0, -1, 0)), "-1 days");
        assert_eq!(
            text_of(&Type::INTERVAL, &interval(3_600_000_000, -1, 0)),
            "-1 days +01:00:00"
        );
        assert_eq!(text_of(&Type::INTERVAL, &interval(-3_600_000_000, 0, 0)), "-01:00:00");
    }

    #[test]
    fn test_oid_text() {
        assert_eq!(text_of(&Type::OID, &16_384u32.to_be_bytes()), "16384");
    }

    #[test]
    fn test_inet_and_cidr_text() {
        let host = [2u8, 32, 0, 4, 192, 168, 0, 1];
        assert_eq!(text_of(&Type::INET, &host), "192.168.0.1");

        let network = [2u8, 24, 0, 4, 192, 168, 0, 1];
        assert_eq!(text_of(&Type::INET, &network), "192.168.0.1/24");

        let cidr = [2u8, 32, 1, 4, 10, 0, 0, 1];
        assert_eq!(text_of(&Type::CIDR, &cidr), "10.0.0.1/32");
    }

    #[test]
    fn test_int_array_text() {
        let one = 1i32.to_be_bytes();
        let two = 2i32.to_be_bytes();
        let raw = array(Type::INT4.oid(), &[Some(&one[..]), None, Some(&two[..])]);
        assert_eq!(text_of(&Type::INT4_ARRAY, &raw), "{1,NULL,2}");

        let empty = [0u8; 12];
        assert_eq!(text_of(&Type::INT4_ARRAY, &empty), "{}");
    }

    #[test]
    fn test_text_array_quoting() {
        let raw = array(
            Type::TEXT.oid(),
            &[
                Some(&b"plain"[..]),
                Some(&b"two words"[..]),
                Some(&b"say \"hi\""[..]),
                Some(&b""[..]),
                Some(&b"null"[..]),
            ],
        );
        assert_eq!(
            text_of(&Type::TEXT_ARRAY, &raw),
            r#"{plain,"two words","say \"hi\"","","null"}"#
        );
    }

    #[test]
    fn test_enum_and_text_form_types() {
        let status = Type::new(
            "post_status".to_string(),
            90_001,
            Kind::Enum(vec!["draft".to_string(), "published".to_string()]),
            "content".to_string(),
        );
        assert_eq!(text_of(&status, b"published"), "published");

        let citext = Type::new("citext".to_string(), 90_002, Kind::Simple, "public".to_string());
        assert_eq!(text_of(&citext, b"Hello"), "Hello");

        assert!(decode_value(SqlType::from_oid(90_001), &status, &[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_domain_decodes_as_base_type() {
        let slug = Type::new(
            "post_rank".to_string(),
            90_003,
            Kind::Domain(Type::INT4),
            "content".to_string(),
        );
        let base = base_type(&slug);
        assert_eq!(*base, Type::INT4);
        assert_eq!(
            decode_value(SqlType::from_oid(base.oid()), base, &7i32.to_be_bytes()).unwrap(),
            CellValue::Integer(7)
        );
    }

    #[test]
    fn test_unsupported_type_is_decode_error() {
        let raw = [0u8; 16];
        let err = decode_value(SqlType::from_oid(Type::POINT.oid()), &Type::POINT, &raw)
            .unwrap_err();
        assert!(err.to_string().contains("point"));
    }
}
