//! ペイロード検証
//!
//! Pure check of a decoded match-list document before anything downstream
//! trusts it. Malformed numeric odds are hard errors; business-rule misses
//! (wrong sport, stale match, incomplete odds) are warnings and only fail the
//! verdict when no item survives.

pub mod shape;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::types::ValidationVerdict;
pub use shape::{ItemRef, PayloadShape};

/// Summary error appended whenever no item survives.
pub const NO_VALID_ITEMS: &str = "no valid items found";
/// Hard error for a body that does not decode as JSON.
pub const NOT_JSON: &str = "payload is not valid JSON";

const SPORT_KEYS: &[&str] = &["sportInfo", "sport", "sportName"];
const START_TIME_KEYS: &[&str] = &["startTime", "start_time", "startTimestamp"];
const HOME_TEAM_KEYS: &[&str] = &["homeTeam", "home_team"];
const AWAY_TEAM_KEYS: &[&str] = &["awayTeam", "away_team"];

/// 1X2 outcomes with their accepted aliases
const OUTCOMES: &[(&str, &str)] = &[("1", "home"), ("X", "draw"), ("2", "away")];

/// Numeric start times above this are epoch milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// Validate `doc` against the current time.
pub fn validate(doc: &Value) -> ValidationVerdict {
    validate_at(doc, Utc::now())
}

/// Decode a raw response body and validate it. Undecodable input yields an
/// invalid verdict carrying [`NOT_JSON`].
pub fn validate_bytes(bytes: &[u8]) -> ValidationVerdict {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(doc) => validate(&doc),
        Err(_) => ValidationVerdict::rejected(NOT_JSON),
    }
}

/// Validate `doc` treating `now` as the validation time.
pub fn validate_at(doc: &Value, now: DateTime<Utc>) -> ValidationVerdict {
    let shape = PayloadShape::classify(doc);
    let items = match shape.items() {
        Some(items) => items,
        None => {
            return ValidationVerdict::rejected(format!(
                "unsupported payload shape: top-level {}",
                match shape {
                    PayloadShape::Unsupported(kind) => kind,
                    _ => "value",
                }
            ))
        }
    };
    if items.is_empty() {
        return ValidationVerdict::rejected("payload contains no items");
    }

    let mut verdict = ValidationVerdict::default();
    for (index, item) in items.iter().enumerate() {
        verdict.total_matches += 1;
        match item {
            ItemRef::Object(map) => match check_item(map, now) {
                ItemOutcome::Valid => verdict.valid_matches += 1,
                ItemOutcome::Skipped(reason) => {
                    verdict.warnings.push(format!("item {index}: {reason}"))
                }
                ItemOutcome::Invalid(reason) => {
                    verdict.errors.push(format!("item {index}: {reason}"))
                }
            },
            ItemRef::Other(kind) => verdict
                .warnings
                .push(format!("item {index}: expected an object, found {kind}")),
        }
    }

    if verdict.valid_matches == 0 {
        verdict.errors.push(NO_VALID_ITEMS.to_string());
    }
    verdict.is_valid = verdict.valid_matches > 0 && verdict.errors.is_empty();
    verdict
}

enum ItemOutcome {
    Valid,
    Skipped(String),
    Invalid(String),
}

fn check_item(item: &Map<String, Value>, now: DateTime<Utc>) -> ItemOutcome {
    let sport = first_str(item, SPORT_KEYS).unwrap_or_default();
    let sport_lower = sport.to_lowercase();
    if !sport_lower.contains("soccer") && !sport_lower.contains("football") {
        return ItemOutcome::Skipped(format!("sport '{sport}' is not football"));
    }

    if let Some(start) = START_TIME_KEYS
        .iter()
        .find_map(|k| item.get(*k))
        .and_then(parse_start_time)
    {
        if start <= now {
            return ItemOutcome::Skipped(format!(
                "historical match (start time {} is not in the future)",
                start.to_rfc3339()
            ));
        }
    }

    let odds = match item.get("odds").and_then(Value::as_object) {
        Some(odds) => odds,
        None => return ItemOutcome::Skipped("odds missing or not a mapping".to_string()),
    };

    let mut raw_outcomes = Vec::with_capacity(OUTCOMES.len());
    for (key, alias) in OUTCOMES {
        match odds.get(*key).or_else(|| odds.get(*alias)) {
            Some(value) => raw_outcomes.push((*key, value)),
            None => {
                return ItemOutcome::Skipped(format!("incomplete 1X2 odds (missing '{key}')"))
            }
        }
    }

    let mut prices = Vec::with_capacity(raw_outcomes.len());
    for (key, value) in raw_outcomes {
        match parse_price(value) {
            Some(price) => prices.push((key, price)),
            None => {
                return ItemOutcome::Invalid(format!("odds '{key}' value {value} is not a number"))
            }
        }
    }

    if let Some((key, price)) = prices.iter().find(|(_, price)| *price <= 1.0) {
        return ItemOutcome::Skipped(format!("odds '{key}'={price} must be above 1.0"));
    }

    let home = first_str(item, HOME_TEAM_KEYS).map(str::trim).unwrap_or_default();
    let away = first_str(item, AWAY_TEAM_KEYS).map(str::trim).unwrap_or_default();
    if home.is_empty() || away.is_empty() {
        return ItemOutcome::Skipped("missing team names".to_string());
    }

    ItemOutcome::Valid
}

fn first_str<'a>(item: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| item.get(*k).and_then(Value::as_str))
}

fn parse_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    price.is_finite().then_some(price)
}

/// Epoch seconds or milliseconds (numeric or numeric string), or RFC 3339.
/// Unparsable values yield None and the start-time rule is not applied.
fn parse_start_time(value: &Value) -> Option<DateTime<Utc>> {
    let from_epoch = |raw: f64| -> Option<DateTime<Utc>> {
        let millis = if raw.abs() > EPOCH_MILLIS_THRESHOLD {
            raw
        } else {
            raw * 1000.0
        };
        Utc.timestamp_millis_opt(millis as i64).single()
    };
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<f64>() {
                Ok(raw) => from_epoch(raw),
                Err(_) => DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn future_ms(now: DateTime<Utc>) -> i64 {
        (now + Duration::hours(3)).timestamp_millis()
    }

    fn item(start_ms: i64, odds: Value) -> Value {
        json!({
            "sportInfo": "soccer",
            "startTime": start_ms,
            "homeTeam": "A",
            "awayTeam": "B",
            "odds": odds
        })
    }

    fn wrapped(items: Vec<Value>) -> Value {
        json!({"data": {"items": items}})
    }

    #[test]
    fn test_valid_wrapped_item() {
        let now = Utc::now();
        let doc = wrapped(vec![item(
            future_ms(now),
            json!({"1": "2.1", "X": "3.2", "2": "3.0"}),
        )]);
        let verdict = validate_at(&doc, now);
        assert!(verdict.is_valid);
        assert_eq!(verdict.valid_matches, 1);
        assert_eq!(verdict.total_matches, 1);
        assert!(verdict.errors.is_empty());
        assert!(verdict.warnings.is_empty());
    }

    #[test]
    fn test_past_start_time_is_a_warning_and_fails_overall() {
        let now = Utc::now();
        let past = (now - Duration::hours(2)).timestamp_millis();
        let doc = wrapped(vec![item(past, json!({"1": "2.1", "X": "3.2", "2": "3.0"}))]);
        let verdict = validate_at(&doc, now);
        assert!(!verdict.is_valid);
        assert_eq!(verdict.valid_matches, 0);
        assert_eq!(verdict.warnings.len(), 1);
        assert!(verdict.warnings[0].contains("historical match"));
        assert_eq!(verdict.errors, vec![NO_VALID_ITEMS.to_string()]);
    }

    #[test]
    fn test_unparsable_odds_is_a_hard_error_without_warning() {
        let now = Utc::now();
        let doc = wrapped(vec![item(
            future_ms(now),
            json!({"1": "abc", "X": "3.2", "2": "3.0"}),
        )]);
        let verdict = validate_at(&doc, now);
        assert!(!verdict.is_valid);
        assert!(verdict.warnings.is_empty());
        assert_eq!(verdict.valid_matches, 0);
        assert_eq!(verdict.errors.len(), 2);
        assert!(verdict.errors[0].contains("not a number"));
        assert_eq!(verdict.errors[1], NO_VALID_ITEMS);
    }

    #[test]
    fn test_hard_error_fails_even_with_valid_items() {
        let now = Utc::now();
        let doc = json!([
            item(future_ms(now), json!({"1": 2.1, "X": 3.2, "2": 3.0})),
            item(future_ms(now), json!({"1": "x", "X": 3.2, "2": 3.0})),
        ]);
        let verdict = validate_at(&doc, now);
        assert_eq!(verdict.valid_matches, 1);
        assert_eq!(verdict.errors.len(), 1);
        assert!(!verdict.is_valid);
    }

    #[test]
    fn test_warnings_do_not_fail_when_something_survives() {
        let now = Utc::now();
        let mut basketball = item(future_ms(now), json!({"1": 1.9, "X": 9.0, "2": 1.9}));
        basketball["sportInfo"] = json!("Basketball");
        let doc = json!({"items": [
            basketball,
            item(future_ms(now), json!({"home": 1.5, "draw": 4.0, "away": 6.5})),
            item(future_ms(now), json!({"1": 1.5, "2": 6.5})),
        ]});
        let verdict = validate_at(&doc, now);
        assert!(verdict.is_valid);
        assert_eq!(verdict.valid_matches, 1);
        assert_eq!(verdict.total_matches, 3);
        assert_eq!(verdict.warnings.len(), 2);
        assert!(verdict.warnings[0].contains("not football"));
        assert!(verdict.warnings[1].contains("missing 'X'"));
    }

    #[test]
    fn test_odds_at_or_below_one_are_skipped() {
        let now = Utc::now();
        let doc = json!([item(future_ms(now), json!({"1": "1.0", "X": 3.2, "2": 3.0}))]);
        let verdict = validate_at(&doc, now);
        assert_eq!(verdict.valid_matches, 0);
        assert!(verdict.warnings[0].contains("above 1.0"));
    }

    #[test]
    fn test_missing_team_names_are_skipped() {
        let now = Utc::now();
        let mut entry = item(future_ms(now), json!({"1": 2.0, "X": 3.0, "2": 4.0}));
        entry["awayTeam"] = json!("  ");
        let verdict = validate_at(&json!([entry]), now);
        assert_eq!(verdict.valid_matches, 0);
        assert!(verdict.warnings[0].contains("team names"));
    }

    #[test]
    fn test_odds_not_a_mapping() {
        let now = Utc::now();
        let entry = item(future_ms(now), json!([2.0, 3.0, 4.0]));
        let verdict = validate_at(&json!([entry]), now);
        assert!(verdict.warnings[0].contains("not a mapping"));
    }

    #[test]
    fn test_single_object_counts_as_one_item() {
        let now = Utc::now();
        let mut entry = item(future_ms(now), json!({"1": 2.0, "X": 3.0, "2": 4.0}));
        entry["sportInfo"] = json!("American FOOTBALL league");
        let verdict = validate_at(&entry, now);
        assert!(verdict.is_valid);
        assert_eq!(verdict.total_matches, 1);
    }

    #[test]
    fn test_start_time_formats() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let odds = json!({"1": 2.0, "X": 3.0, "2": 4.0});
        let mut seconds = item(0, odds.clone());
        seconds["startTime"] = json!(now.timestamp() + 60);
        let mut rfc = item(0, odds.clone());
        rfc["startTime"] = json!("2026-05-01T13:00:00Z");
        let mut garbage = item(0, odds);
        garbage["startTime"] = json!("soon");
        let verdict = validate_at(&json!([seconds, rfc, garbage]), now);
        assert_eq!(verdict.valid_matches, 3);
    }

    #[test]
    fn test_unsupported_and_empty_shapes() {
        let verdict = validate(&json!(42));
        assert!(!verdict.is_valid);
        assert_eq!(verdict.total_matches, 0);
        assert_eq!(verdict.errors.len(), 1);
        assert!(verdict.errors[0].contains("number"));

        let verdict = validate(&json!({"data": {"items": []}}));
        assert!(!verdict.is_valid);
        assert_eq!(verdict.errors, vec!["payload contains no items".to_string()]);
    }

    #[test]
    fn test_non_object_items_are_warnings() {
        let verdict = validate(&json!(["x", null]));
        assert_eq!(verdict.total_matches, 2);
        assert_eq!(verdict.warnings.len(), 2);
        assert_eq!(verdict.errors, vec![NO_VALID_ITEMS.to_string()]);
    }

    #[test]
    fn test_validate_bytes_rejects_non_json() {
        let verdict = validate_bytes(b"<html>maintenance</html>");
        assert!(!verdict.is_valid);
        assert_eq!(verdict.errors, vec![NOT_JSON.to_string()]);
        assert_eq!(verdict.total_matches, 0);

        let verdict = validate_bytes(br#"{"items": []}"#);
        assert_eq!(verdict.errors, vec!["payload contains no items".to_string()]);
    }
}
