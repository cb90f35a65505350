use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::MapData;

/// Title granted to a region's notable landowners.
const LANDOWNER_TITLE: &str = "Laird";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleEntry {
    pub title: String,
    pub region: String,
}

/// The `family-trees.json` artifact: clan membership and per-member titles,
/// both derived from region ownership.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClanRolls {
    #[serde(rename = "clanMap")]
    pub clan_map: IndexMap<String, Vec<String>>,
    #[serde(rename = "titleMap")]
    pub title_map: IndexMap<String, Vec<TitleEntry>>,
}

impl ClanRolls {
    fn enroll(&mut self, clan: &str, member: &str, title: &str, region: &str) {
        let members = self.clan_map.entry(clan.to_string()).or_default();
        if !members.iter().any(|m| m == member) {
            members.push(member.to_string());
        }
        self.title_map
            .entry(member.to_string())
            .or_default()
            .push(TitleEntry {
                title: title.to_string(),
                region: region.to_string(),
            });
    }
}

/// A region with both a possessor and a possessor clan contributes that
/// possessor under the region's status title; any other region contributes
/// its notable landowners as lairds, since a possessor without a clan cannot
/// be filed anywhere. Members dedupe within a clan, titles accumulate per
/// member.
pub fn build_rolls(map_data: &MapData) -> ClanRolls {
    let mut rolls = ClanRolls::default();

    for region in map_data.regions.values() {
        match (&region.possessor, &region.possessor_clan) {
            (Some(member), Some(clan)) => {
                let title = region.status.as_deref().unwrap_or_default();
                rolls.enroll(clan, member, title, &region.name);
            }
            _ => {
                for landowner in &region.notable_landowners {
                    rolls.enroll(&landowner.clan, &landowner.name, LANDOWNER_TITLE, &region.name);
                }
            }
        }
    }

    rolls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Landowner, Region};
    use serde_json::json;

    fn region(name: &str, possessor: Option<(&str, &str, &str)>, landowners: &[(&str, &str)]) -> Region {
        Region {
            name: name.into(),
            status: possessor.map(|(_, _, title)| title.to_string()),
            possessor: possessor.map(|(member, _, _)| member.to_string()),
            possessor_clan: possessor.map(|(_, clan, _)| clan.to_string()),
            notable_landowners: landowners
                .iter()
                .map(|(n, c)| Landowner {
                    name: n.to_string(),
                    clan: c.to_string(),
                    extra: Default::default(),
                })
                .collect(),
            extra: Default::default(),
        }
    }

    #[test]
    fn possessors_and_landowners_are_enrolled() {
        let mut map_data = MapData::default();
        map_data
            .regions
            .insert("fife".into(), region("Fife", Some(("Duncan MacDuff", "MacDuff", "Earl")), &[]));
        map_data.regions.insert(
            "lennox".into(),
            region("Lennox", None, &[("Maol Domhnaich", "Lennox"), ("Aulay", "Lennox")]),
        );

        let rolls = build_rolls(&map_data);
        assert_eq!(rolls.clan_map["MacDuff"], vec!["Duncan MacDuff"]);
        assert_eq!(rolls.clan_map["Lennox"], vec!["Maol Domhnaich", "Aulay"]);
        assert_eq!(
            rolls.title_map["Duncan MacDuff"],
            vec![TitleEntry { title: "Earl".into(), region: "Fife".into() }]
        );
        assert_eq!(
            rolls.title_map["Aulay"],
            vec![TitleEntry { title: "Laird".into(), region: "Lennox".into() }]
        );
    }

    #[test]
    fn possessor_without_clan_falls_back_to_landowners() {
        let mut map_data = MapData::default();
        let mut moray = region("Moray", None, &[("Freskin", "Murray")]);
        moray.possessor = Some("Freskin".into()); // no possessor_clan recorded
        map_data.regions.insert("moray".into(), moray);

        let rolls = build_rolls(&map_data);
        assert_eq!(rolls.clan_map["Murray"], vec!["Freskin"]);
        assert_eq!(
            rolls.title_map["Freskin"],
            vec![TitleEntry { title: "Laird".into(), region: "Moray".into() }]
        );
    }

    #[test]
    fn titles_accumulate_and_members_dedupe() {
        let mut map_data = MapData::default();
        map_data
            .regions
            .insert("fife".into(), region("Fife", Some(("Duncan MacDuff", "MacDuff", "Earl")), &[]));
        map_data
            .regions
            .insert("strathearn".into(), region("Strathearn", Some(("Duncan MacDuff", "MacDuff", "Mormaer")), &[]));

        let rolls = build_rolls(&map_data);
        assert_eq!(rolls.clan_map["MacDuff"], vec!["Duncan MacDuff"]);
        assert_eq!(rolls.title_map["Duncan MacDuff"].len(), 2);
    }

    #[test]
    fn artifact_keys_match_original() {
        let rolls = ClanRolls::default();
        let v = serde_json::to_value(&rolls).unwrap();
        assert_eq!(v, json!({"clanMap": {}, "titleMap": {}}));
    }
}
