use std::collections::BTreeMap;

use crate::clock::{self, ClockError};

/// The hub stores at most this many (temperature, end time) slots per weekday.
pub const SLOTS_PER_WEEKDAY: usize = 13;

/// Temperature the encoder assumes before the first explicit point.
pub const DEFAULT_TEMPERATURE: f64 = 17.0;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

/// Hold `temperature` until `end_minute` minutes after midnight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimePoint {
    pub temperature: f64,
    pub end_minute: u16,
}

/// One weekday's ordered slot points, in source order.
///
/// Order is taken from the input as-is. The caller is expected to supply
/// points with non-decreasing end times; nothing here sorts or deduplicates.
#[derive(Clone, Debug, PartialEq)]
pub struct WeekdaySchedule {
    pub weekday: Weekday,
    pub points: Vec<TimePoint>,
}

/// Weekday-keyed schedule. Absent weekdays are simply not transmitted.
pub type WeeklySchedule = BTreeMap<Weekday, WeekdaySchedule>;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("line {0} is not a `WEEKDAY = ...` schedule line: `{1}`")]
    Line(usize, String),
    #[error("`{1}` on line {0} is not a weekday name")]
    Weekday(usize, String),
    #[error("`{1}` on line {0} is not a `temperature > time` tuple")]
    Tuple(usize, String),
    #[error("`{1}` on line {0} is not a temperature")]
    Temperature(usize, String),
    #[error("bad time on line {0}")]
    Time(usize, #[source] ClockError),
    #[error("{1} has {2} points on line {0}, the device stores at most {max}", max = SLOTS_PER_WEEKDAY)]
    TooManyPoints(usize, Weekday, usize),
}

/// Parse the plain-text weekly schedule format:
///
/// ```text
/// # comment
/// MONDAY = 17.0 > 06:30; 21.0 > 22:00;
/// TUESDAY = 18.5 > 07:00;
/// ```
///
/// Comment and blank lines are skipped. Weekday names are case-insensitive.
/// A weekday named twice keeps the later line.
pub fn parse_weekly_schedule(text: &str) -> Result<WeeklySchedule, ParseError> {
    let mut schedule = WeeklySchedule::new();
    for (index, line) in text.lines().enumerate() {
        let number = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((weekday, points)) = split_exactly_once(line, '=') else {
            return Err(ParseError::Line(number, line.to_string()));
        };
        let weekday = weekday
            .trim()
            .parse::<Weekday>()
            .map_err(|_| ParseError::Weekday(number, weekday.trim().to_string()))?;
        let points = parse_points(number, weekday, points)?;
        schedule.insert(weekday, WeekdaySchedule { weekday, points });
    }
    Ok(schedule)
}

fn parse_points(
    number: usize,
    weekday: Weekday,
    text: &str,
) -> Result<Vec<TimePoint>, ParseError> {
    let mut points = Vec::new();
    for item in text.split(';') {
        let item = item.trim();
        if item.is_empty() {
            // A trailing `;` leaves an empty last item.
            continue;
        }
        points.push(parse_tuple(number, item)?);
    }
    if points.len() > SLOTS_PER_WEEKDAY {
        return Err(ParseError::TooManyPoints(number, weekday, points.len()));
    }
    Ok(points)
}

/// Parse one `temperature > HH:MM` tuple.
fn parse_tuple(number: usize, item: &str) -> Result<TimePoint, ParseError> {
    let Some((temperature, time)) = split_exactly_once(item, '>') else {
        return Err(ParseError::Tuple(number, item.to_string()));
    };
    let temperature = temperature
        .trim()
        .parse::<f64>()
        .map_err(|_| ParseError::Temperature(number, temperature.trim().to_string()))?;
    let end_minute =
        clock::minutes_from_clock(time.trim()).map_err(|e| ParseError::Time(number, e))?;
    Ok(TimePoint { temperature, end_minute })
}

fn split_exactly_once(text: &str, separator: char) -> Option<(&str, &str)> {
    let (left, right) = text.split_once(separator)?;
    if right.contains(separator) {
        return None;
    }
    Some((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(temperature: f64, end_minute: u16) -> TimePoint {
        TimePoint { temperature, end_minute }
    }

    #[test]
    fn parses_the_documented_example() {
        let schedule = parse_weekly_schedule("MONDAY = 17.0 > 06:30; 21.0 > 22:00;").unwrap();
        assert_eq!(schedule.len(), 1);
        assert_eq!(
            schedule[&Weekday::Monday].points,
            vec![point(17.0, 390), point(21.0, 1320)]
        );
    }

    #[test]
    fn weekday_names_are_case_insensitive() {
        let schedule =
            parse_weekly_schedule("monday = 20.0 > 12:00;\nTuEsDaY = 18.5 > 07:00;").unwrap();
        assert_eq!(schedule[&Weekday::Monday].points, vec![point(20.0, 720)]);
        assert_eq!(schedule[&Weekday::Tuesday].points, vec![point(18.5, 420)]);
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let text = "# heating plan\n\n   \nSUNDAY = 21.0 > 23:00;\n# trailing comment\n";
        let schedule = parse_weekly_schedule(text).unwrap();
        assert_eq!(schedule.len(), 1);
        assert!(schedule.contains_key(&Weekday::Sunday));
    }

    #[test]
    fn weekday_with_no_tuples_parses_empty() {
        let schedule = parse_weekly_schedule("FRIDAY =").unwrap();
        assert_eq!(schedule[&Weekday::Friday].points, Vec::new());
    }

    #[test]
    fn later_line_wins_for_a_repeated_weekday() {
        let text = "MONDAY = 17.0 > 06:00;\nMONDAY = 19.0 > 08:00;";
        let schedule = parse_weekly_schedule(text).unwrap();
        assert_eq!(schedule[&Weekday::Monday].points, vec![point(19.0, 480)]);
    }

    #[test]
    fn rejects_lines_without_exactly_one_equals() {
        assert_eq!(
            parse_weekly_schedule("MONDAY 17.0 > 06:30;"),
            Err(ParseError::Line(1, "MONDAY 17.0 > 06:30;".to_string()))
        );
        assert_eq!(
            parse_weekly_schedule("MONDAY = 17.0 = 06:30;"),
            Err(ParseError::Line(1, "MONDAY = 17.0 = 06:30;".to_string()))
        );
    }

    #[test]
    fn rejects_unknown_weekdays() {
        assert_eq!(
            parse_weekly_schedule("FUNDAY = 17.0 > 06:30;"),
            Err(ParseError::Weekday(1, "FUNDAY".to_string()))
        );
    }

    #[test]
    fn rejects_malformed_tuples() {
        assert_eq!(
            parse_weekly_schedule("MONDAY = 17.0 06:30;"),
            Err(ParseError::Tuple(1, "17.0 06:30".to_string()))
        );
        assert_eq!(
            parse_weekly_schedule("MONDAY = 17.0 > 06:30 > 07:00;"),
            Err(ParseError::Tuple(1, "17.0 > 06:30 > 07:00".to_string()))
        );
        assert_eq!(
            parse_weekly_schedule("MONDAY = warm > 06:30;"),
            Err(ParseError::Temperature(1, "warm".to_string()))
        );
        assert!(matches!(
            parse_weekly_schedule("MONDAY = 17.0 > dawn;"),
            Err(ParseError::Time(1, _))
        ));
    }

    #[test]
    fn rejects_more_points_than_the_device_stores() {
        let tuples = (0..14).map(|i| format!("20.0 > {:02}:00;", i)).collect::<String>();
        let result = parse_weekly_schedule(&format!("MONDAY = {tuples}"));
        assert_eq!(result, Err(ParseError::TooManyPoints(1, Weekday::Monday, 14)));
    }

    #[test]
    fn exactly_thirteen_points_is_fine() {
        let tuples = (0..13).map(|i| format!("20.0 > {:02}:00;", i)).collect::<String>();
        let schedule = parse_weekly_schedule(&format!("MONDAY = {tuples}")).unwrap();
        assert_eq!(schedule[&Weekday::Monday].points.len(), 13);
    }
}
