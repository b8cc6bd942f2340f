/// End of the day in minutes since midnight.
///
/// The thermostat firmware uses this value as the terminator of a weekday's
/// slot sequence, so inputs past it are clamped rather than rejected.
pub const END_OF_DAY: u16 = 1440;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("`{0}` is not a HH:MM clock time")]
pub struct ClockError(pub String);

/// Parse a `HH:MM` 24-hour clock string into minutes since midnight.
///
/// Values past the end of the day clamp to [`END_OF_DAY`].
pub fn minutes_from_clock(text: &str) -> Result<u16, ClockError> {
    let error = || ClockError(text.to_string());
    let (hours, minutes) = text.split_once(':').ok_or_else(error)?;
    if minutes.contains(':') {
        return Err(error());
    }
    let hours = hours.trim().parse::<u32>().map_err(|_| error())?;
    let minutes = minutes.trim().parse::<u32>().map_err(|_| error())?;
    let total = hours.saturating_mul(60).saturating_add(minutes);
    Ok(total.min(u32::from(END_OF_DAY)) as u16)
}

/// Render minutes since midnight as a zero-padded `HH:MM` string.
///
/// The day-end sentinel renders as `24:00`. That is what the hub stores and
/// what `minutes_from_clock` accepts back, so it is kept as-is instead of
/// being rounded to a "real" clock time.
pub fn clock_from_minutes(minutes: u16) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ordinary_times() {
        assert_eq!(minutes_from_clock("06:30"), Ok(390));
        assert_eq!(minutes_from_clock("00:00"), Ok(0));
        assert_eq!(minutes_from_clock("22:00"), Ok(1320));
        assert_eq!(minutes_from_clock("6:5"), Ok(365));
    }

    #[test]
    fn round_trips_below_the_sentinel() {
        for minutes in 0..=END_OF_DAY {
            let clock = clock_from_minutes(minutes);
            assert_eq!(minutes_from_clock(&clock), Ok(minutes));
        }
    }

    #[test]
    fn clamps_past_end_of_day() {
        assert_eq!(minutes_from_clock("24:00"), Ok(END_OF_DAY));
        assert_eq!(minutes_from_clock("24:01"), Ok(END_OF_DAY));
        assert_eq!(minutes_from_clock("99:99"), Ok(END_OF_DAY));
    }

    #[test]
    fn sentinel_renders_as_2400() {
        assert_eq!(clock_from_minutes(END_OF_DAY), "24:00");
    }

    #[test]
    fn rejects_malformed_times() {
        for bad in ["", "12", "12:", ":30", "12:xx", "ab:cd", "1:2:3", "-1:30"] {
            assert_eq!(minutes_from_clock(bad), Err(ClockError(bad.to_string())));
        }
    }
}
