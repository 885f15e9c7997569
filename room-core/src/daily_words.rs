use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use room_types::RoomError;

pub const WORD_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_word_date(value: &str) -> Result<NaiveDate, RoomError> {
    NaiveDate::parse_from_str(value.trim(), WORD_DATE_FORMAT).map_err(|_| {
        RoomError::InvalidWordDate {
            date: value.trim().to_string(),
        }
    })
}

pub fn format_word_date(date: NaiveDate) -> String {
    date.format(WORD_DATE_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD,word` schedule. Blank lines and `#` comments are skipped.
pub fn parse_word_schedule(text: &str) -> Result<Vec<(NaiveDate, String)>> {
    let mut schedule = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (date, word) = line
            .split_once(',')
            .ok_or_else(|| anyhow!("line {}: expected 'YYYY-MM-DD,word'", index + 1))?;
        let date = NaiveDate::parse_from_str(date.trim(), WORD_DATE_FORMAT)
            .map_err(|e| anyhow!("line {}: bad date '{}': {}", index + 1, date.trim(), e))?;
        let word = word.trim();
        if word.is_empty() {
            return Err(anyhow!("line {}: missing word", index + 1));
        }

        schedule.push((date, word.to_string()));
    }

    Ok(schedule)
}
