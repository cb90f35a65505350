use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Era boundaries for the map. The base map depicts 1291; anything first
/// attested from 1292 onwards is out of frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Era {
    pub map_year: i32,
    pub end_year: i32,
    pub present_year: i32,
}

impl Default for Era {
    fn default() -> Self {
        Era {
            map_year: 1291,
            end_year: 1292,
            present_year: 2021,
        }
    }
}

/// Closed year interval. Scraped dates are rarely exact; a single known year
/// is the degenerate range. JSON form is the original artifact's array of
/// year strings: `["1001"]` or `["981", "1001"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub earliest: i32,
    pub latest: i32,
}

impl YearRange {
    pub fn single(year: i32) -> Self {
        YearRange { earliest: year, latest: year }
    }

    pub fn new(a: i32, b: i32) -> Self {
        YearRange { earliest: a.min(b), latest: a.max(b) }
    }

    pub fn from_years(years: &[i32]) -> Option<Self> {
        let earliest = years.iter().copied().min()?;
        let latest = years.iter().copied().max()?;
        Some(YearRange { earliest, latest })
    }

    pub fn is_exact(&self) -> bool {
        self.earliest == self.latest
    }
}

// parseInt semantics: leading integer, ignoring a fuzzy suffix like "1040-uu-uu".
fn parse_leading_year(s: &str) -> Option<i32> {
    let t = s.trim();
    let digits: String = t.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

impl Serialize for YearRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let v: Vec<String> = if self.is_exact() {
            vec![self.earliest.to_string()]
        } else {
            vec![self.earliest.to_string(), self.latest.to_string()]
        };
        v.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for YearRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        let years: Vec<i32> = raw.iter().filter_map(|s| parse_leading_year(s)).collect();
        YearRange::from_years(&years)
            .ok_or_else(|| D::Error::custom(format!("no parsable years in {raw:?}")))
    }
}

/// A death date is either a year range or the literal `"alive"` marker the
/// original artifacts use for people who outlive the era.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathDate {
    Alive,
    Range(YearRange),
}

impl DeathDate {
    /// Latest plausible death year, substituting the present for `Alive`.
    pub fn latest(&self, era: &Era) -> i32 {
        match self {
            DeathDate::Alive => era.present_year,
            DeathDate::Range(r) => r.latest,
        }
    }
}

impl Serialize for DeathDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DeathDate::Alive => serializer.serialize_str("alive"),
            DeathDate::Range(r) => r.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for DeathDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::String(s) if s.eq_ignore_ascii_case("alive") => Ok(DeathDate::Alive),
            serde_json::Value::Array(_) => {
                let r: YearRange = serde_json::from_value(v).map_err(D::Error::custom)?;
                Ok(DeathDate::Range(r))
            }
            other => Err(D::Error::custom(format!("unexpected death date {other}"))),
        }
    }
}

/// "before 1001" style birth dates widen downward by twenty years.
pub fn birth_from_scrape(years: &[i32], before: bool) -> Option<YearRange> {
    let range = YearRange::from_years(years)?;
    if before {
        Some(YearRange::new(range.earliest - 20, range.earliest))
    } else {
        Some(range)
    }
}

/// "before 1135" death dates widen downward by twenty years, floored at a
/// minimum fifteen-year lifespan when the birth year is known. The range
/// collapses to the stated year when the floor is not strictly below it.
pub fn death_from_scrape(years: &[i32], before: bool, birth: Option<YearRange>) -> Option<YearRange> {
    let range = YearRange::from_years(years)?;
    if !before {
        return Some(range);
    }
    let mut floor = range.earliest - 20;
    if let Some(b) = birth {
        floor = floor.max(b.earliest + 15);
    }
    if floor < range.earliest {
        Some(YearRange::new(floor, range.earliest))
    } else {
        Some(YearRange::single(range.earliest))
    }
}

/// Convert a scraped death range against the era boundary. A range entirely
/// past the era end means the person is alive on the map. A range that merely
/// straddles it is returned unchanged with the `may_be_alive` flag set.
pub fn normalize_death(range: YearRange, era: &Era) -> (DeathDate, bool) {
    if range.earliest >= era.end_year {
        (DeathDate::Alive, false)
    } else {
        (DeathDate::Range(range), range.latest >= era.end_year)
    }
}

/// Classification of a free-text founding date against the map year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateClass {
    Pre,
    Post,
    Unknown,
}

static ANY_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{3,4}").expect("year regex"));

// Years 1000-1299 not preceded by a dot (avoids decimals) or another digit.
static PRE_ERA_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^.\d])(1[0-2]\d{2})\b").expect("pre-era year regex"));

static POST_ERA_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(1[3-9]\d{2})\b").expect("post-era year regex"));

static CENTURY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(1[1-3])th\s+century").expect("century regex"));

/// Classify a castle table's date column. Century mentions and explicit years
/// each count as clues for one side of the era boundary; conflicting clues
/// come back `Unknown`.
pub fn classify_founding_text(text: &str, era: &Era) -> DateClass {
    let lower = text.to_lowercase();
    if lower.trim().is_empty() {
        return DateClass::Unknown;
    }

    let mut pre_clues = 0u32;
    let mut post_clues = 0u32;

    for c in ["11th", "12th", "13th"] {
        if lower.contains(c) {
            pre_clues += 1;
        }
    }
    for c in ["14th", "15th", "16th", "17th", "18th", "19th", "20th"] {
        if lower.contains(c) {
            post_clues += 1;
        }
    }

    for m in ANY_YEAR_RE.find_iter(&lower) {
        if let Ok(year) = m.as_str().parse::<i32>() {
            if year > era.map_year {
                post_clues += 1;
            } else {
                pre_clues += 1;
            }
        }
    }

    match (pre_clues, post_clues) {
        (0, 0) => DateClass::Unknown,
        (_, 0) => DateClass::Pre,
        (0, _) => DateClass::Post,
        _ => DateClass::Unknown,
    }
}

/// Earliest attested founding: an explicit year, or a century when the page
/// never names one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FoundingDate {
    Year(i32),
    Century(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarliestFinding {
    pub earliest: Option<FoundingDate>,
    #[serde(rename = "pre1291Found")]
    pub pre_era_found: bool,
    #[serde(rename = "post1291Found")]
    pub post_era_found: bool,
}

/// Scan page text for the earliest year at or before the map year, falling
/// back to century mentions when no usable year appears.
pub fn extract_earliest_pre_era(text: &str, era: &Era) -> EarliestFinding {
    let mut earliest: Option<i32> = None;
    let mut pre_found = false;

    for cap in PRE_ERA_YEAR_RE.captures_iter(text) {
        if let Ok(year) = cap[1].parse::<i32>() {
            if year <= era.map_year {
                pre_found = true;
                earliest = Some(earliest.map_or(year, |e: i32| e.min(year)));
            }
        }
    }

    let mut found = earliest.map(FoundingDate::Year);
    if found.is_none() {
        // The lowest century mentioned is the earliest estimate.
        let century = CENTURY_RE
            .captures_iter(text)
            .filter_map(|cap| cap[1].parse::<u32>().ok())
            .min();
        if let Some(c) = century {
            found = Some(FoundingDate::Century(format!("{c}th Century")));
            pre_found = true;
        }
    }

    let post_found = POST_ERA_YEAR_RE.is_match(text);

    EarliestFinding {
        earliest: found,
        pre_era_found: pre_found,
        post_era_found: post_found,
    }
}

/// Classify a full page's text: any pre-era evidence wins over post-era
/// evidence, since old castles accumulate later dates in their histories.
pub fn classify_page_text(text: &str, era: &Era) -> DateClass {
    let finding = extract_earliest_pre_era(text, era);
    if finding.pre_era_found {
        DateClass::Pre
    } else if finding.post_era_found {
        DateClass::Post
    } else {
        DateClass::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_range_json_forms() {
        let exact = YearRange::single(1040);
        assert_eq!(serde_json::to_value(exact).unwrap(), serde_json::json!(["1040"]));

        let fuzzy = YearRange::new(981, 1001);
        assert_eq!(
            serde_json::to_value(fuzzy).unwrap(),
            serde_json::json!(["981", "1001"])
        );

        let back: YearRange = serde_json::from_value(serde_json::json!(["1001", "981"])).unwrap();
        assert_eq!(back, fuzzy);
    }

    #[test]
    fn year_range_parses_fuzzy_suffix() {
        let r: YearRange = serde_json::from_value(serde_json::json!(["1135-uu-uu"])).unwrap();
        assert_eq!(r, YearRange::single(1135));
    }

    #[test]
    fn death_date_alive_marker() {
        let d: DeathDate = serde_json::from_value(serde_json::json!("alive")).unwrap();
        assert_eq!(d, DeathDate::Alive);
        assert_eq!(serde_json::to_value(d).unwrap(), serde_json::json!("alive"));

        let d: DeathDate = serde_json::from_value(serde_json::json!(["1286"])).unwrap();
        assert_eq!(d, DeathDate::Range(YearRange::single(1286)));
    }

    #[test]
    fn before_widens_birth() {
        let r = birth_from_scrape(&[1001], true).unwrap();
        assert_eq!(r, YearRange::new(981, 1001));
    }

    #[test]
    fn before_death_floors_at_min_lifespan() {
        // Widens by twenty years when the birth leaves room.
        let r = death_from_scrape(&[1135], true, Some(YearRange::single(1090))).unwrap();
        assert_eq!(r, YearRange::new(1115, 1135));

        // Late birth pulls the floor up past the widened bound.
        let r = death_from_scrape(&[1135], true, Some(YearRange::single(1105))).unwrap();
        assert_eq!(r, YearRange::new(1120, 1135));

        // No room at all collapses to the stated year.
        let r = death_from_scrape(&[1135], true, Some(YearRange::single(1125))).unwrap();
        assert_eq!(r, YearRange::single(1135));
    }

    #[test]
    fn death_past_era_end_is_alive() {
        let era = Era::default();
        let (d, warn) = normalize_death(YearRange::new(1295, 1310), &era);
        assert_eq!(d, DeathDate::Alive);
        assert!(!warn);

        let (d, warn) = normalize_death(YearRange::new(1288, 1295), &era);
        assert_eq!(d, DeathDate::Range(YearRange::new(1288, 1295)));
        assert!(warn, "range straddling the era end should be flagged");
    }

    #[test]
    fn founding_classification() {
        let era = Era::default();
        assert_eq!(classify_founding_text("12th century", &era), DateClass::Pre);
        assert_eq!(classify_founding_text("c. 1450", &era), DateClass::Post);
        assert_eq!(classify_founding_text("", &era), DateClass::Unknown);
        // Conflicting clues stay unknown.
        assert_eq!(
            classify_founding_text("13th century, rebuilt 1560", &era),
            DateClass::Unknown
        );
    }

    #[test]
    fn earliest_year_extraction() {
        let era = Era::default();
        let f = extract_earliest_pre_era("granted in 1124, besieged 1304, built on a 1072 motte", &era);
        assert_eq!(f.earliest, Some(FoundingDate::Year(1072)));
        assert!(f.pre_era_found);
        assert!(f.post_era_found);

        // Decimals do not count as years.
        let f = extract_earliest_pre_era("located at 56.1234 north, rebuilt 1560", &era);
        assert_eq!(f.earliest, None);
        assert!(!f.pre_era_found);
        assert!(f.post_era_found);
    }

    #[test]
    fn century_fallback() {
        let era = Era::default();
        let f = extract_earliest_pre_era("a 12th century tower house", &era);
        assert_eq!(f.earliest, Some(FoundingDate::Century("12th Century".into())));
        assert!(f.pre_era_found);

        // The lowest century wins regardless of where it appears.
        let f = extract_earliest_pre_era("a 13th century hall in an 11th century bailey", &era);
        assert_eq!(f.earliest, Some(FoundingDate::Century("11th Century".into())));
    }

    #[test]
    fn earliest_finding_json_keys_match_artifacts() {
        let f = EarliestFinding {
            earliest: Some(FoundingDate::Year(1124)),
            pre_era_found: true,
            post_era_found: false,
        };
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["earliest"], serde_json::json!(1124));
        assert_eq!(v["pre1291Found"], serde_json::json!(true));
        assert_eq!(v["post1291Found"], serde_json::json!(false));
    }
}
