//! Translation between the weekly schedule model and the hub's flat MASTER
//! paramset encoding.
//!
//! The device stores up to 13 `(temperature, end time)` slots per weekday
//! under `TEMPERATURE_<WEEKDAY>_<N>` / `ENDTIME_<WEEKDAY>_<N>` keys. An end
//! time of 1440 minutes terminates a weekday's slot sequence; slots past the
//! terminator do not exist.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use strum::IntoEnumIterator as _;
use tracing::debug;

use crate::clock::{self, END_OF_DAY};
use crate::schedule::{DEFAULT_TEMPERATURE, SLOTS_PER_WEEKDAY, Weekday, WeeklySchedule};
use crate::xmlrpc::Value;

/// The hub's wire representation of a device parameter set.
pub type ParameterSet = BTreeMap<String, Value>;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum EncodeError {
    #[error("{0} has {1} points, the device stores at most {max}", max = SLOTS_PER_WEEKDAY)]
    Capacity(Weekday, usize),
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("parameter set has no `{0}` entry before the end-of-day terminator")]
    MissingKey(String),
    #[error("parameter set entry `{0}` is not numeric")]
    NotNumeric(String),
}

fn temperature_key(weekday: Weekday, slot: usize) -> String {
    format!("TEMPERATURE_{weekday}_{slot}")
}

fn endtime_key(weekday: Weekday, slot: usize) -> String {
    format!("ENDTIME_{weekday}_{slot}")
}

/// Encode a weekly schedule into paramset entries.
///
/// A single running temperature threads through the weekdays in Monday-first
/// order, starting at [`DEFAULT_TEMPERATURE`]: when a weekday runs out of
/// points before slot 13, one terminator slot carrying that temperature
/// forward is emitted and the weekday ends. A point that itself ends at
/// [`END_OF_DAY`] also terminates its weekday, wherever it sits.
pub fn encode(schedule: &WeeklySchedule) -> Result<ParameterSet, EncodeError> {
    let mut set = ParameterSet::new();
    let mut last_temperature = DEFAULT_TEMPERATURE;
    for weekday in Weekday::iter() {
        let Some(day) = schedule.get(&weekday) else {
            continue;
        };
        if day.points.len() > SLOTS_PER_WEEKDAY {
            return Err(EncodeError::Capacity(weekday, day.points.len()));
        }
        for slot in 1..=SLOTS_PER_WEEKDAY {
            match day.points.get(slot - 1) {
                Some(point) => {
                    last_temperature = point.temperature;
                    set.insert(temperature_key(weekday, slot), Value::Double(point.temperature));
                    set.insert(endtime_key(weekday, slot), Value::Int(i64::from(point.end_minute)));
                    if point.end_minute == END_OF_DAY {
                        break;
                    }
                }
                None => {
                    set.insert(temperature_key(weekday, slot), Value::Double(last_temperature));
                    set.insert(endtime_key(weekday, slot), Value::Int(i64::from(END_OF_DAY)));
                    break;
                }
            }
        }
    }
    debug!(message = "encoded schedule", entries = set.len());
    Ok(set)
}

/// Render a paramset back into the weekly schedule text format.
///
/// All seven weekdays are rendered; the hub always stores a full week.
pub fn decode(set: &ParameterSet) -> Result<String, DecodeError> {
    let mut out = String::new();
    for weekday in Weekday::iter() {
        let _ = write!(out, "{weekday} =");
        for slot in 1..=SLOTS_PER_WEEKDAY {
            let temperature = numeric_entry(set, temperature_key(weekday, slot))?;
            let end_minute = numeric_entry(set, endtime_key(weekday, slot))?;
            let _ = write!(
                out,
                " {temperature:.1} > {clock};",
                clock = clock::clock_from_minutes(end_minute as u16)
            );
            if end_minute as u16 == END_OF_DAY {
                break;
            }
        }
        out.push('\n');
    }
    Ok(out)
}

fn numeric_entry(set: &ParameterSet, key: String) -> Result<f64, DecodeError> {
    let Some(value) = set.get(&key) else {
        return Err(DecodeError::MissingKey(key));
    };
    value.as_f64().ok_or(DecodeError::NotNumeric(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{TimePoint, WeekdaySchedule, parse_weekly_schedule};

    fn weekly(days: &[(Weekday, &[(f64, u16)])]) -> WeeklySchedule {
        days.iter()
            .map(|&(weekday, points)| {
                let points = points
                    .iter()
                    .map(|&(temperature, end_minute)| TimePoint { temperature, end_minute })
                    .collect();
                (weekday, WeekdaySchedule { weekday, points })
            })
            .collect()
    }

    fn full_week_at(temperature: f64) -> ParameterSet {
        let mut set = ParameterSet::new();
        for weekday in Weekday::iter() {
            set.insert(temperature_key(weekday, 1), Value::Double(temperature));
            set.insert(endtime_key(weekday, 1), Value::Int(1440));
        }
        set
    }

    #[test]
    fn encodes_the_documented_example() {
        let schedule = weekly(&[(Weekday::Monday, &[(17.0, 390), (21.0, 1320)])]);
        let set = encode(&schedule).unwrap();
        assert_eq!(set["TEMPERATURE_MONDAY_1"], Value::Double(17.0));
        assert_eq!(set["ENDTIME_MONDAY_1"], Value::Int(390));
        assert_eq!(set["TEMPERATURE_MONDAY_2"], Value::Double(21.0));
        assert_eq!(set["ENDTIME_MONDAY_2"], Value::Int(1320));
        // One terminator slot carrying the last temperature, then nothing.
        assert_eq!(set["TEMPERATURE_MONDAY_3"], Value::Double(21.0));
        assert_eq!(set["ENDTIME_MONDAY_3"], Value::Int(1440));
        assert_eq!(set.len(), 6);
    }

    #[test]
    fn weekday_with_no_points_uses_the_default_temperature() {
        let schedule = weekly(&[(Weekday::Tuesday, &[])]);
        let set = encode(&schedule).unwrap();
        assert_eq!(set["TEMPERATURE_TUESDAY_1"], Value::Double(DEFAULT_TEMPERATURE));
        assert_eq!(set["ENDTIME_TUESDAY_1"], Value::Int(1440));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn carry_crosses_weekdays_in_monday_first_order() {
        let schedule = weekly(&[
            (Weekday::Monday, &[(22.5, 600)]),
            (Weekday::Tuesday, &[]),
        ]);
        let set = encode(&schedule).unwrap();
        // Monday's terminator repeats Monday's own last temperature...
        assert_eq!(set["TEMPERATURE_MONDAY_2"], Value::Double(22.5));
        // ...and an empty Tuesday inherits it too.
        assert_eq!(set["TEMPERATURE_TUESDAY_1"], Value::Double(22.5));
        assert_eq!(set["ENDTIME_TUESDAY_1"], Value::Int(1440));
    }

    #[test]
    fn explicit_end_of_day_point_terminates_the_weekday() {
        let schedule = weekly(&[(Weekday::Friday, &[(19.0, 480), (16.0, 1440)])]);
        let set = encode(&schedule).unwrap();
        assert_eq!(set["TEMPERATURE_FRIDAY_2"], Value::Double(16.0));
        assert_eq!(set["ENDTIME_FRIDAY_2"], Value::Int(1440));
        assert!(!set.contains_key("TEMPERATURE_FRIDAY_3"));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn every_encoded_weekday_has_exactly_one_terminator_and_it_is_last() {
        let schedule = weekly(&[
            (Weekday::Monday, &[(17.0, 390), (21.0, 1320)]),
            (Weekday::Wednesday, &[(18.0, 1440)]),
            (Weekday::Sunday, &[]),
        ]);
        let set = encode(&schedule).unwrap();
        for weekday in [Weekday::Monday, Weekday::Wednesday, Weekday::Sunday] {
            let mut terminator_slot = None;
            let mut last_slot = 0;
            for slot in 1..=SLOTS_PER_WEEKDAY {
                let Some(end) = set.get(&endtime_key(weekday, slot)) else {
                    continue;
                };
                last_slot = slot;
                if end.as_i64() == Some(1440) {
                    assert_eq!(terminator_slot, None, "{weekday} has two terminators");
                    terminator_slot = Some(slot);
                }
            }
            assert_eq!(terminator_slot, Some(last_slot), "{weekday} terminator is not last");
        }
    }

    #[test]
    fn full_thirteen_point_weekday_needs_no_terminator_slot() {
        let points = (1u16..=13).map(|i| (20.0, i * 60)).collect::<Vec<_>>();
        let schedule = weekly(&[(Weekday::Monday, points.as_slice())]);
        let set = encode(&schedule).unwrap();
        assert_eq!(set["ENDTIME_MONDAY_13"], Value::Int(13 * 60));
        assert_eq!(set.len(), 26);
    }

    #[test]
    fn fourteen_points_is_a_capacity_error() {
        let points = (1u16..=14).map(|i| (20.0, i * 60)).collect::<Vec<_>>();
        let schedule = weekly(&[(Weekday::Monday, points.as_slice())]);
        assert_eq!(encode(&schedule), Err(EncodeError::Capacity(Weekday::Monday, 14)));
    }

    #[test]
    fn decodes_a_full_week() {
        let mut set = full_week_at(17.0);
        set.insert(temperature_key(Weekday::Monday, 1), Value::Double(17.0));
        set.insert(endtime_key(Weekday::Monday, 1), Value::Int(390));
        set.insert(temperature_key(Weekday::Monday, 2), Value::Double(21.0));
        set.insert(endtime_key(Weekday::Monday, 2), Value::Int(1320));
        set.insert(temperature_key(Weekday::Monday, 3), Value::Double(21.0));
        set.insert(endtime_key(Weekday::Monday, 3), Value::Int(1440));
        let text = decode(&set).unwrap();
        let monday = text.lines().next().unwrap();
        assert_eq!(monday, "MONDAY = 17.0 > 06:30; 21.0 > 22:00; 21.0 > 24:00;");
        assert_eq!(text.lines().count(), 7);
        assert_eq!(text.lines().last().unwrap(), "SUNDAY = 17.0 > 24:00;");
    }

    #[test]
    fn decoder_coerces_integer_temperatures() {
        let mut set = full_week_at(17.0);
        set.insert(temperature_key(Weekday::Monday, 1), Value::Int(21));
        let text = decode(&set).unwrap();
        assert!(text.starts_with("MONDAY = 21.0 > 24:00;"));
    }

    #[test]
    fn missing_slot_key_before_the_terminator_is_an_error() {
        let mut set = full_week_at(17.0);
        set.remove("ENDTIME_THURSDAY_1");
        assert_eq!(
            decode(&set),
            Err(DecodeError::MissingKey("ENDTIME_THURSDAY_1".to_string()))
        );
    }

    #[test]
    fn non_numeric_entry_is_an_error() {
        let mut set = full_week_at(17.0);
        set.insert("TEMPERATURE_MONDAY_1".to_string(), Value::String("warm".to_string()));
        assert_eq!(
            decode(&set),
            Err(DecodeError::NotNumeric("TEMPERATURE_MONDAY_1".to_string()))
        );
    }

    #[test]
    fn decode_inverts_encode_for_a_full_week() {
        let source = "\
            MONDAY = 17.0 > 06:30; 21.0 > 22:00;\n\
            TUESDAY = 18.5 > 07:00;\n\
            WEDNESDAY = 17.0 > 06:30; 21.0 > 22:00;\n\
            THURSDAY = 17.0 > 06:30; 21.0 > 22:00;\n\
            FRIDAY = 17.0 > 06:30; 22.0 > 23:30;\n\
            SATURDAY = 20.0 > 23:00;\n\
            SUNDAY = 20.0 > 22:00;\n";
        let schedule = parse_weekly_schedule(source).unwrap();
        let decoded = decode(&encode(&schedule).unwrap()).unwrap();
        // Every source tuple survives; each weekday gains its trailing
        // terminator tuple.
        for (source_line, decoded_line) in source.lines().zip(decoded.lines()) {
            assert!(
                decoded_line.starts_with(source_line.trim_end_matches(';')),
                "{decoded_line:?} does not extend {source_line:?}"
            );
            assert!(decoded_line.ends_with("> 24:00;"));
        }
        // And the rendered text parses and re-encodes to the same paramset.
        let reparsed = parse_weekly_schedule(&decoded).unwrap();
        assert_eq!(encode(&reparsed).unwrap(), encode(&schedule).unwrap());
    }
}
