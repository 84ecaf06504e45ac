use chrono::NaiveDate;

/// One game as observed on a single poll, normalized from the feed's wire shape
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    pub id: String,
    /// Raw status string as sent by the feed, when present
    pub status: Option<String>,
    pub home_label: String,
    pub away_label: String,
    pub home_points: Option<u32>,
    pub away_points: Option<u32>,
    /// The watch-date this record was fetched under
    pub watch_date: NaiveDate,
}

impl GameRecord {
    /// Short "away at home" tag for log lines
    pub fn matchup(&self) -> String {
        format!("{} at {}", self.away_label, self.home_label)
    }
}
