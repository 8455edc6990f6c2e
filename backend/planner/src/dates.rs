//! Deterministic resolution of relative date expressions into an inclusive range.
//!
//! Used to complete `start_date`/`end_date` arguments the oracle left out.

use chrono::{Datelike, Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use intentforge_core::{CandidateCall, Catalog};

pub const START_PARAM: &str = "start_date";
pub const END_PARAM: &str = "end_date";

static MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b(?:\s+(?:of\s+)?(\d{4})\b)?",
    )
    .unwrap()
});
/// "may" only names the month beside a day number or after a preposition.
static MAY_MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:in|for|during|of|since|until)\s+may|may\s+\d{1,2}(?:st|nd|rd|th)?|\d{1,2}(?:st|nd|rd|th)?\s+(?:of\s+)?may)\b",
    )
    .unwrap()
});
/// A bare year must follow a preposition; other four-digit numbers are amounts.
static YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:in|for|during|of|year)\s+((?:19|20)\d{2})\b").unwrap()
});
static THIS_MONTH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bthis\s+month\b").unwrap());
static LAST_MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:last|previous)\s+month\b").unwrap());
static THIS_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bthis\s+year\b").unwrap());
static LAST_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:last|previous)\s+year\b").unwrap());
static TODAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\btoday\b").unwrap());
static YESTERDAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\byesterday\b").unwrap());

fn month_number(token: &str) -> Option<u32> {
    let prefix: String = token.to_ascii_lowercase().chars().take(3).collect();
    let n = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(n)
}

/// The first month named in `message`, with its year when one follows.
fn month_mention(message: &str) -> Option<(u32, Option<i32>)> {
    let may_spans: Vec<_> = MAY_MONTH_RE.find_iter(message).map(|m| m.range()).collect();
    MONTH_RE.captures_iter(message).find_map(|caps| {
        let token = caps.get(1)?;
        let year: Option<i32> = caps.get(2).and_then(|y| y.as_str().parse().ok());
        if token.as_str().eq_ignore_ascii_case("may")
            && year.is_none()
            && !may_spans
                .iter()
                .any(|span| span.start <= token.start() && token.end() <= span.end)
        {
            return None;
        }
        Some((month_number(token.as_str())?, year))
    })
}

/// First and last day of `month` in `year`.
pub fn month_range(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next - Duration::days(1)))
}

pub fn year_range(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

/// Resolve the period a message refers to, relative to `today`.
///
/// A message with no recognisable period resolves to the whole year of `today`.
pub fn resolve_range(message: &str, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    if YESTERDAY_RE.is_match(message) {
        let day = today - Duration::days(1);
        return (day, day);
    }
    if TODAY_RE.is_match(message) {
        return (today, today);
    }
    if THIS_MONTH_RE.is_match(message) {
        if let Some(range) = month_range(today.year(), today.month()) {
            return range;
        }
    }
    if LAST_MONTH_RE.is_match(message) {
        let (year, month) = if today.month() == 1 {
            (today.year() - 1, 12)
        } else {
            (today.year(), today.month() - 1)
        };
        if let Some(range) = month_range(year, month) {
            return range;
        }
    }
    if let Some((month, year)) = month_mention(message) {
        if let Some(range) = month_range(year.unwrap_or_else(|| today.year()), month) {
            return range;
        }
    }
    if LAST_YEAR_RE.is_match(message) {
        if let Some(range) = year_range(today.year() - 1) {
            return range;
        }
    }
    if !THIS_YEAR_RE.is_match(message) {
        if let Some(year) = YEAR_RE
            .captures(message)
            .and_then(|caps| caps[1].parse().ok())
        {
            if let Some(range) = year_range(year) {
                return range;
            }
        }
    }
    year_range(today.year()).unwrap_or((today, today))
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// Complete missing `start_date`/`end_date` arguments of a range operation.
///
/// Only touches operations that declare both parameters, and never overwrites
/// a value the oracle supplied.
pub fn fill_date_range(
    candidate: CandidateCall,
    catalog: &Catalog,
    message: &str,
    today: NaiveDate,
) -> CandidateCall {
    let (name, mut arguments) = match candidate {
        CandidateCall::Operation { name, arguments } => (name, arguments),
        other => return other,
    };

    let declares_range = catalog
        .get(&name)
        .map(|entry| entry.descriptor.has_params(&[START_PARAM, END_PARAM]))
        .unwrap_or(false);
    let missing_start = is_blank(arguments.get(START_PARAM));
    let missing_end = is_blank(arguments.get(END_PARAM));

    if declares_range && (missing_start || missing_end) {
        let (start, end) = resolve_range(message, today);
        if missing_start {
            arguments.insert(
                START_PARAM.into(),
                Value::String(start.format("%Y-%m-%d").to_string()),
            );
        }
        if missing_end {
            arguments.insert(
                END_PARAM.into(),
                Value::String(end.format("%Y-%m-%d").to_string()),
            );
        }
    }

    CandidateCall::Operation { name, arguments }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intentforge_core::{OperationDescriptor, ParamType};
    use serde_json::{json, Map};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_name_uses_reference_year() {
        assert_eq!(
            resolve_range("October expenses", d(2025, 10, 15)),
            (d(2025, 10, 1), d(2025, 10, 31))
        );
        assert_eq!(
            resolve_range("show me feb", d(2024, 6, 1)),
            (d(2024, 2, 1), d(2024, 2, 29))
        );
    }

    #[test]
    fn explicit_year_wins() {
        assert_eq!(
            resolve_range("expenses for September 2023", d(2025, 10, 15)),
            (d(2023, 9, 1), d(2023, 9, 30))
        );
        assert_eq!(
            resolve_range("everything in 2022", d(2025, 10, 15)),
            (d(2022, 1, 1), d(2022, 12, 31))
        );
    }

    #[test]
    fn relative_periods() {
        let today = d(2025, 1, 10);
        assert_eq!(resolve_range("last month", today), (d(2024, 12, 1), d(2024, 12, 31)));
        assert_eq!(resolve_range("this month", today), (d(2025, 1, 1), d(2025, 1, 31)));
        assert_eq!(resolve_range("last year", today), (d(2024, 1, 1), d(2024, 12, 31)));
        assert_eq!(resolve_range("today please", today), (today, today));
        assert_eq!(resolve_range("yesterday", today), (d(2025, 1, 9), d(2025, 1, 9)));
    }

    #[test]
    fn unqualified_request_covers_reference_year() {
        assert_eq!(
            resolve_range("list my expenses", d(2025, 10, 15)),
            (d(2025, 1, 1), d(2025, 12, 31))
        );
    }

    #[test]
    fn amounts_are_not_years() {
        let today = d(2025, 10, 15);
        assert_eq!(
            resolve_range("list expenses above 2000", today),
            (d(2025, 1, 1), d(2025, 12, 31))
        );
        assert_eq!(
            resolve_range("expenses for 2024", today),
            (d(2024, 1, 1), d(2024, 12, 31))
        );
    }

    #[test]
    fn may_needs_a_date_context() {
        let today = d(2025, 10, 15);
        assert_eq!(
            resolve_range("show what I may have spent on food", today),
            (d(2025, 1, 1), d(2025, 12, 31))
        );
        assert_eq!(
            resolve_range("what I may have spent in May", today),
            (d(2025, 5, 1), d(2025, 5, 31))
        );
        assert_eq!(
            resolve_range("May 2024 groceries", today),
            (d(2024, 5, 1), d(2024, 5, 31))
        );
        assert_eq!(
            resolve_range("spent since may 3", today),
            (d(2025, 5, 1), d(2025, 5, 31))
        );
    }

    fn range_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .insert(
                OperationDescriptor::new("list_expenses", "List expenses")
                    .with_param(START_PARAM, ParamType::String, None, true)
                    .with_param(END_PARAM, ParamType::String, None, true),
                "expenses",
            )
            .unwrap();
        catalog
            .insert(
                OperationDescriptor::new("add_expense", "Add")
                    .with_param("date", ParamType::String, None, true),
                "expenses",
            )
            .unwrap();
        catalog
    }

    #[test]
    fn fills_only_missing_bounds() {
        let mut args = Map::new();
        args.insert(START_PARAM.into(), json!("2025-10-05"));
        let out = fill_date_range(
            CandidateCall::operation("list_expenses", args),
            &range_catalog(),
            "October expenses",
            d(2025, 10, 15),
        );
        let args = out.arguments();
        assert_eq!(args[START_PARAM], json!("2025-10-05"));
        assert_eq!(args[END_PARAM], json!("2025-10-31"));
    }

    #[test]
    fn leaves_other_operations_alone() {
        let call = CandidateCall::operation("add_expense", Map::new());
        let out = fill_date_range(call.clone(), &range_catalog(), "October", d(2025, 10, 15));
        assert_eq!(out, call);
        let out = fill_date_range(CandidateCall::None, &range_catalog(), "October", d(2025, 10, 15));
        assert_eq!(out, CandidateCall::None);
    }
}
