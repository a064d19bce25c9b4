//! Month buckets, paper identifiers and validated scan ranges.
//!
//! New-style arXiv identifiers are a `YYMM` month prefix plus a zero-padded sequence number
//! (`2305.04592`). The sequence number is four digits wide for months before 2015 and five digits
//! from January 2015 on. Within a month the sequence is contiguous, which is what lets the
//! scanner treat the number itself as its scan position.
//!
//! # Examples
//!
//! ```
//! use harvest::identifier::{Month, PaperId};
//!
//! let month: Month = "2023-05".parse().unwrap();
//! let id = PaperId::new(month, 4592);
//! assert_eq!(id.to_string(), "2305.04592");
//! assert_eq!(id.folder_name(), "2305-04592");
//! assert_eq!(id.versioned(2), "2305.04592v2");
//! ```

use super::*;

lazy_static! {
  /// `YYYY-MM` month bucket.
  static ref MONTH: Regex = Regex::new(r"^(\d{4})-(\d{2})$").unwrap();
  /// New-style identifier with an optional version suffix.
  static ref PAPER_ID: Regex = Regex::new(r"^(\d{2})(\d{2})\.(\d{4,5})(?:v(\d+))?$").unwrap();
}

/// First month whose identifiers use a five digit sequence number.
const FIVE_DIGIT_EPOCH: Month = Month { year: 2015, month: 1 };

/// A calendar month, the partition unit of the arXiv identifier space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
  /// Four digit year
  year:  u16,
  /// Month of the year, 1..=12
  month: u8,
}

impl Month {
  /// Creates a month, rejecting anything outside `1..=12` or outside the arXiv epoch.
  pub fn new(year: u16, month: u8) -> Result<Self> {
    if !(1..=12).contains(&month) || !(1991..=2099).contains(&year) {
      return Err(HarvestError::InvalidMonth(format!("{year:04}-{month:02}")));
    }
    Ok(Self { year, month })
  }

  /// The four digit year.
  pub fn year(&self) -> u16 { self.year }

  /// The month of the year.
  pub fn month(&self) -> u8 { self.month }

  /// The `YYMM` identifier prefix.
  pub fn prefix(&self) -> String { format!("{:02}{:02}", self.year % 100, self.month) }

  /// Number of digits in this month's sequence numbers.
  pub fn sequence_width(&self) -> usize {
    if *self >= FIVE_DIGIT_EPOCH {
      5
    } else {
      4
    }
  }

  /// Largest sequence number representable in this month.
  pub fn max_sequence(&self) -> u64 { 10u64.pow(self.sequence_width() as u32) - 1 }

  /// The calendar month after this one.
  pub fn next(&self) -> Self {
    if self.month == 12 {
      Self { year: self.year + 1, month: 1 }
    } else {
      Self { year: self.year, month: self.month + 1 }
    }
  }
}

impl Display for Month {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:04}-{:02}", self.year, self.month)
  }
}

impl FromStr for Month {
  type Err = HarvestError;

  fn from_str(s: &str) -> Result<Self> {
    let caps = MONTH.captures(s.trim()).ok_or_else(|| HarvestError::InvalidMonth(s.to_owned()))?;
    let year = caps[1].parse().map_err(|_| HarvestError::InvalidMonth(s.to_owned()))?;
    let month = caps[2].parse().map_err(|_| HarvestError::InvalidMonth(s.to_owned()))?;
    Self::new(year, month).map_err(|_| HarvestError::InvalidMonth(s.to_owned()))
  }
}

impl TryFrom<String> for Month {
  type Error = HarvestError;

  fn try_from(value: String) -> Result<Self> { value.parse() }
}

impl From<Month> for String {
  fn from(month: Month) -> Self { month.to_string() }
}

/// A versionless new-style arXiv identifier.
///
/// Ordering follows `(month, number)`, which is the order the scanner accounts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PaperId {
  /// Month bucket the paper was announced in
  pub month:  Month,
  /// Sequence number within the month
  pub number: u64,
}

impl PaperId {
  /// Builds the identifier for `number` within `month`.
  pub fn new(month: Month, number: u64) -> Self { Self { month, number } }

  /// Name of the per-paper output folder, `YYMM-NNNNN`.
  ///
  /// Every task writes under this folder, so concurrent attempts for different papers never
  /// touch the same path.
  pub fn folder_name(&self) -> String {
    format!("{}-{:0width$}", self.month.prefix(), self.number, width = self.month.sequence_width())
  }

  /// The identifier with an explicit version suffix, e.g. `2305.04592v2`.
  pub fn versioned(&self, version: u32) -> String { format!("{self}v{version}") }

  /// Parses an identifier, returning the version suffix separately when present.
  pub fn parse_versioned(input: &str) -> Result<(Self, Option<u32>)> {
    let invalid = || HarvestError::InvalidIdentifier(input.to_owned());
    let caps = PAPER_ID.captures(input.trim()).ok_or_else(invalid)?;

    let yy: u16 = caps[1].parse().map_err(|_| invalid())?;
    let mm: u8 = caps[2].parse().map_err(|_| invalid())?;
    let month = Month::new(2000 + yy, mm).map_err(|_| invalid())?;
    if caps[3].len() != month.sequence_width() {
      return Err(invalid());
    }
    let number = caps[3].parse().map_err(|_| invalid())?;
    let version = caps.get(4).map(|v| v.as_str().parse()).transpose().map_err(|_| invalid())?;

    Ok((Self { month, number }, version))
  }
}

impl Display for PaperId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{}.{:0width$}",
      self.month.prefix(),
      self.number,
      width = self.month.sequence_width()
    )
  }
}

impl FromStr for PaperId {
  type Err = HarvestError;

  fn from_str(s: &str) -> Result<Self> { Self::parse_versioned(s).map(|(id, _)| id) }
}

/// A validated harvest range: from `start_id` in `start_month` to `end_id` in `end_month`.
///
/// Validation happens once, here, so that a malformed range is rejected before any phase of a
/// run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
  /// Month the range starts in
  pub start_month: Month,
  /// First sequence number in the start month
  pub start_id:    u64,
  /// Month the range ends in
  pub end_month:   Month,
  /// Last sequence number in the end month
  pub end_id:      u64,
}

impl RangeSpec {
  /// Validates and builds a range.
  ///
  /// # Errors
  ///
  /// Returns [`HarvestError::InvalidRange`] if the end is before the start, if the range spans
  /// more than two consecutive months, if an id is zero, or if an id does not fit its month's
  /// sequence width.
  pub fn new(start_month: Month, start_id: u64, end_month: Month, end_id: u64) -> Result<Self> {
    if end_month < start_month {
      return Err(HarvestError::InvalidRange(format!(
        "end month {end_month} is before start month {start_month}"
      )));
    }
    if end_month != start_month && end_month != start_month.next() {
      return Err(HarvestError::InvalidRange(format!(
        "{start_month} and {end_month} are not adjacent; a range covers one month or two \
         consecutive ones"
      )));
    }
    for (month, id) in [(start_month, start_id), (end_month, end_id)] {
      if id == 0 {
        return Err(HarvestError::InvalidRange(format!("ids start at 1, got 0 in {month}")));
      }
      if id > month.max_sequence() {
        return Err(HarvestError::InvalidRange(format!(
          "id {id} does not fit in {month} (max {})",
          month.max_sequence()
        )));
      }
    }
    if start_month == end_month && end_id < start_id {
      return Err(HarvestError::InvalidRange(format!(
        "end id {end_id} is before start id {start_id} in {start_month}"
      )));
    }
    Ok(Self { start_month, start_id, end_month, end_id })
  }

  /// Whether the whole range lies in one month.
  pub fn is_single_month(&self) -> bool { self.start_month == self.end_month }
}

impl Display for RangeSpec {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{} to {}",
      PaperId::new(self.start_month, self.start_id),
      PaperId::new(self.end_month, self.end_id)
    )
  }
}
