use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dates::{DeathDate, EarliestFinding, YearRange};

pub type PersonId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

/// One genealogical record. Field names and shapes match the scraped
/// `geni-profiles.json` artifact, so existing data loads unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "birthYear", default, skip_serializing_if = "Option::is_none")]
    pub birth: Option<YearRange>,

    #[serde(rename = "deathYear", default, skip_serializing_if = "Option::is_none")]
    pub death: Option<DeathDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father: Option<PersonId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother: Option<PersonId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<PersonId>>,

    #[serde(rename = "geni_profile", default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl Person {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(unnamed)")
    }

    pub fn is_alive(&self) -> bool {
        matches!(self.death, Some(DeathDate::Alive))
    }

    pub fn child_ids(&self) -> &[PersonId] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn add_child(&mut self, id: PersonId) {
        let children = self.children.get_or_insert_with(Vec::new);
        if !children.contains(&id) {
            children.push(id);
        }
    }
}

/// Insertion-ordered so that rewrites of the artifact diff cleanly.
pub type People = IndexMap<PersonId, Person>;

/// Next free numeric ID, as the original allocator did (max + 1).
pub fn next_person_id(people: &People) -> PersonId {
    let max = people
        .keys()
        .filter_map(|id| id.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    (max + 1).to_string()
}

pub fn find_by_profile<'a>(people: &'a People, profile_url: &str) -> Option<&'a PersonId> {
    people
        .iter()
        .find(|(_, p)| p.profile.as_deref() == Some(profile_url))
        .map(|(id, _)| id)
}

/// Geographic fix scraped from a Wikipedia `.geo` span, kept as the raw
/// strings the page carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: String,
    pub lon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Castle {
    pub name: String,
    #[serde(rename = "wikiPage")]
    pub wiki_page: String,
    pub text: String,
    #[serde(rename = "earliestDate")]
    pub earliest_date: EarliestFinding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landowner {
    pub name: String,
    pub clan: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possessor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possessor_clan: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notable_landowners: Vec<Landowner>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Burgh {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_pixel: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_pixel: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The site's hand-maintained `map-data.json`. Unknown top-level sections are
/// carried through untouched so a rewrite never loses manual patches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapData {
    #[serde(default)]
    pub regions: IndexMap<String, Region>,
    #[serde(default)]
    pub burghs: IndexMap<String, Burgh>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn person_round_trips_original_keys() {
        let v = json!({
            "name": "Duncan I, King of Scots",
            "birthYear": ["1001"],
            "deathYear": ["1040"],
            "gender": "Male",
            "father": "3",
            "children": ["15", "16"],
            "geni_profile": "https://www.geni.com/people/Duncan-I/6000000005037689063"
        });
        let p: Person = serde_json::from_value(v.clone()).unwrap();
        assert_eq!(p.birth, Some(YearRange::single(1001)));
        assert_eq!(p.gender, Some(Gender::Male));
        assert_eq!(serde_json::to_value(&p).unwrap(), v);
    }

    #[test]
    fn absent_fields_are_omitted() {
        let p = Person {
            name: Some("Bethóc".into()),
            ..Person::default()
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v, json!({"name": "Bethóc"}));
    }

    #[test]
    fn next_id_is_max_plus_one() {
        let mut people = People::new();
        people.insert("3".into(), Person::default());
        people.insert("17".into(), Person::default());
        people.insert("9".into(), Person::default());
        assert_eq!(next_person_id(&people), "18");
        assert_eq!(next_person_id(&People::new()), "1");
    }

    #[test]
    fn add_child_deduplicates() {
        let mut p = Person::default();
        p.add_child("4".into());
        p.add_child("4".into());
        p.add_child("5".into());
        assert_eq!(p.child_ids(), ["4".to_string(), "5".to_string()]);
    }

    #[test]
    fn map_data_preserves_unknown_sections() {
        let v = json!({
            "regions": {
                "fife": {
                    "name": "Fife",
                    "status": "Earl",
                    "possessor": "Duncan MacDuff",
                    "possessor_clan": "MacDuff"
                }
            },
            "burghs": {
                "255000000": {
                    "name": "Edinburgh",
                    "latitude": 55.953,
                    "longitude": -3.189,
                    "level": 3
                }
            },
            "castial_overrides": {"x": 1}
        });
        let m: MapData = serde_json::from_value(v.clone()).unwrap();
        assert_eq!(m.regions["fife"].possessor.as_deref(), Some("Duncan MacDuff"));
        assert_eq!(serde_json::to_value(&m).unwrap(), v);
    }
}
