use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use annals_core::dates::{birth_from_scrape, death_from_scrape, normalize_death, Era, YearRange};
use annals_core::models::Gender;
use annals_core::DeathDate;

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<h1 itemprop="name">(.+?)</h1>"#).expect("name regex"));

static BIRTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<time id="birth_date" itemprop="birthDate" content="[^"]*">([^<]+)</time>"#)
        .expect("birth regex")
});

static DEATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<span itemprop=['"]deathDate['"] content="[^"]+">\s*([^<]+?)\s*</span>"#)
        .expect("death regex")
});

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").expect("year regex"));

static FATHER_OF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Father of.*?<br\s*/?>").expect("father-of regex"));

static MOTHER_OF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Mother of.*?<br\s*/?>").expect("mother-of regex"));

static HREF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"href="([^"]+)""#).expect("href regex"));

static BIRTH_PLACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)birth_location.*?</td>").expect("birth place regex"));

static DEATH_PLACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)deathDate.*?</td>").expect("death place regex"));

// Profiles born or dying on the continent are outside the map; their names
// are anonymized so the purge rules drop them.
const FOREIGN_BIRTH_MARKS: &[&str] = &[
    "Germany", "German", "Italy", "Italian", "Spain", "Spanish", "Poland", "Polish", "Hungary",
    "Hungarian", "France", "French",
];
const FOREIGN_DEATH_MARKS: &[&str] = &[
    "Germany", "German", "Italy", "Italian", "Spain", "Spanish", "Poland", "Polish", "Hungary",
    "Hungarian",
];

#[derive(Debug, Clone, PartialEq)]
pub struct GeniProfile {
    pub name: String,
    pub birth: Option<YearRange>,
    pub death: Option<DeathDate>,
    /// Death range straddles the era end; worth a log line, not a data change.
    pub may_be_alive: bool,
    pub gender: Gender,
    pub child_links: Vec<String>,
}

fn years_in(text: &str) -> Vec<i32> {
    YEAR_RE
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

fn has_before(text: &str) -> bool {
    text.contains("before") || text.contains("Before")
}

/// Parse a Geni profile page. `blacklist` suppresses child links both for
/// blacklisted children and for a blacklisted profile itself, so bad lines
/// never propagate.
pub fn parse_profile(
    html: &str,
    profile_url: &str,
    era: &Era,
    blacklist: &[String],
) -> Result<GeniProfile> {
    let mut name = NAME_RE
        .captures(html)
        .map(|c| c[1].trim().to_string())
        .ok_or_else(|| anyhow!("no name heading on {profile_url}"))?;
    // Titles follow the first comma.
    if let Some(idx) = name.find(',') {
        name.truncate(idx);
    }

    if let Some(m) = BIRTH_PLACE_RE.find(html) {
        if FOREIGN_BIRTH_MARKS.iter().any(|w| m.as_str().contains(w)) {
            name = "NN".to_string();
        }
    }
    if let Some(m) = DEATH_PLACE_RE.find(html) {
        if FOREIGN_DEATH_MARKS.iter().any(|w| m.as_str().contains(w)) {
            name = "NN".to_string();
        }
    }

    let birth = BIRTH_RE
        .captures(html)
        .and_then(|c| birth_from_scrape(&years_in(&c[1]), has_before(&c[1])));

    let (death, may_be_alive) = match DEATH_RE.captures(html) {
        Some(c) => {
            match death_from_scrape(&years_in(&c[1]), has_before(&c[1]), birth) {
                Some(range) => {
                    let (d, warn) = normalize_death(range, era);
                    (Some(d), warn)
                }
                None => (None, false),
            }
        }
        None => (None, false),
    };

    // Whichever of "Son of" / "Daughter of" appears first wins.
    let son_idx = html.find("Son of");
    let daughter_idx = html.find("Daughter of");
    let gender = match (son_idx, daughter_idx) {
        (Some(s), Some(d)) if s < d => Gender::Male,
        (Some(_), None) => Gender::Male,
        _ => Gender::Female,
    };

    let child_links = if blacklist.iter().any(|b| b == profile_url) {
        Vec::new()
    } else {
        let block = match gender {
            Gender::Male => FATHER_OF_RE.find(html),
            Gender::Female => MOTHER_OF_RE.find(html),
        };
        block
            .map(|m| {
                HREF_RE
                    .captures_iter(m.as_str())
                    .map(|c| c[1].to_string())
                    .filter(|link| !blacklist.iter().any(|b| b == link))
                    .collect()
            })
            .unwrap_or_default()
    };

    Ok(GeniProfile {
        name,
        birth,
        death,
        may_be_alive,
        gender,
        child_links,
    })
}
