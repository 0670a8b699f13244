use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref DATE_SEPARATORS: Regex = Regex::new(r"[-/]").unwrap();
    static ref ISO_DATE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

/// One inventory lot, i.e. one worksheet row.
///
/// Every field is kept as the sheet shows it, except for the two integer
/// columns. Fields a worksheet's schema lacks stay empty.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct Lot {
    pub seq: i64,
    pub code: String,
    pub name: String,
    pub date_in: String,
    pub year: String,
    pub location: String,
    pub quantity: i64,
    pub condition: String,
    pub handler: String,
    pub notes: String,
}

impl Lot {
    /// A row is blank when every text field is empty and both counters are zero.
    pub fn is_blank(&self) -> bool {
        self.seq == 0
            && self.quantity == 0
            && [
                &self.code,
                &self.name,
                &self.date_in,
                &self.year,
                &self.location,
                &self.condition,
                &self.handler,
                &self.notes,
            ]
            .iter()
            .all(|s| s.is_empty())
    }

    /// Upsert key: name, date-in and condition must all match exactly.
    pub fn same_batch(&self, name: &str, date_in: &str, condition: &str) -> bool {
        self.name == name && self.date_in == date_in && self.condition == condition
    }

    /// Transfer key: name and condition.
    pub fn same_item(&self, name: &str, condition: &str) -> bool {
        self.name == name && self.condition == condition
    }
}

/// A lot as submitted by the "add" form, before a sequence number and code
/// are assigned.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct NewLot {
    pub name: String,
    pub quantity: i64,
    /// Defaults to the profile's "good" label.
    #[serde(default)]
    pub condition: Option<String>,
    /// `YYYY-MM-DD`; defaults to today.
    #[serde(default)]
    pub date_in: Option<String>,
    /// Defaults to the current year.
    #[serde(default)]
    pub year: Option<String>,
    pub handler: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Labels a deployment uses for the three conditions the dashboard knows.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Conditions {
    pub good: String,
    pub damaged: String,
    pub needs_repair: String,
}

impl Default for Conditions {
    fn default() -> Self {
        Self {
            good: "Good".to_string(),
            damaged: "Damaged".to_string(),
            needs_repair: "Needs Repair".to_string(),
        }
    }
}

impl Conditions {
    pub fn labels(&self) -> Vec<&str> {
        vec![
            self.good.as_str(),
            self.damaged.as_str(),
            self.needs_repair.as_str(),
        ]
    }

    pub fn highlight(&self, condition: &str) -> Highlight {
        if condition == self.damaged {
            Highlight::Damaged
        } else if condition == self.needs_repair {
            Highlight::NeedsRepair
        } else {
            Highlight::None
        }
    }
}

/// Row colouring in the stock view.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Highlight {
    None,
    Damaged,
    NeedsRepair,
}

impl Highlight {
    pub fn css_class(&self) -> &'static str {
        match self {
            Highlight::None => "",
            Highlight::Damaged => "damaged",
            Highlight::NeedsRepair => "needs-repair",
        }
    }
}

/// Build the generated inventory code, e.g. `INV-20240105-007`.
pub fn inventory_code(date_in: &str, seq: i64) -> String {
    let slug = DATE_SEPARATORS.replace_all(date_in, "");
    format!("INV-{}-{:03}", slug, seq)
}

/// Sequence number for the next appended row: the last row's number plus one.
/// A hand-edited sheet ending at `i64::MAX` keeps repeating that number.
pub fn next_seq<'a>(lots: impl IntoIterator<Item = &'a Lot>) -> i64 {
    lots.into_iter()
        .last()
        .map(|lot| lot.seq.saturating_add(1))
        .unwrap_or(1)
}

pub fn is_iso_date(s: &str) -> bool {
    ISO_DATE.is_match(s) && chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_code_strips_date_separators_and_pads() {
        assert_eq!(inventory_code("2024-01-05", 7), "INV-20240105-007");
        assert_eq!(inventory_code("05/01/2024", 12), "INV-05012024-012");
        assert_eq!(inventory_code("2024-01-05", 1234), "INV-20240105-1234");
    }

    #[test]
    fn next_seq_follows_last_row_not_maximum() {
        let lots = vec![
            Lot { seq: 9, ..Lot::default() },
            Lot { seq: 4, ..Lot::default() },
        ];
        assert_eq!(next_seq(&lots), 5);
        assert_eq!(next_seq(&Vec::<Lot>::new()), 1);
    }

    #[test]
    fn next_seq_does_not_overflow_on_a_maxed_out_sheet() {
        let lots = vec![Lot { seq: i64::MAX, ..Lot::default() }];
        assert_eq!(next_seq(&lots), i64::MAX);
    }

    #[test]
    fn blank_lot_detection() {
        assert!(Lot::default().is_blank());
        let lot = Lot {
            notes: "x".into(),
            ..Lot::default()
        };
        assert!(!lot.is_blank());
    }

    #[test]
    fn highlight_follows_condition_labels() {
        let conditions = Conditions::default();
        assert_eq!(conditions.highlight("Damaged"), Highlight::Damaged);
        assert_eq!(conditions.highlight("Needs Repair"), Highlight::NeedsRepair);
        assert_eq!(conditions.highlight("Good"), Highlight::None);
        assert_eq!(Highlight::NeedsRepair.css_class(), "needs-repair");
    }

    #[test]
    fn iso_dates() {
        assert!(is_iso_date("2024-02-29"));
        assert!(!is_iso_date("2023-02-29"));
        assert!(!is_iso_date("2024/01/01"));
    }
}
