use std::collections::{HashMap, VecDeque};

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use annals_core::dates::Era;
use annals_core::models::{find_by_profile, next_person_id, Gender, People, Person, PersonId};

use crate::fetch::PageSource;
use crate::geni::parse_profile;

/// Profiles whose lines repeatedly poisoned the data; never followed.
pub const DEFAULT_BLACKLIST: &[&str] = &[
    "https://www.geni.com/people/Robert-de-Tyndale/6000000010337054868",
    "https://www.geni.com/people/Aliva-de-Braose/6000000000796840899",
];

// Names the scraper anonymizes; records carrying them are dropped.
const PLACEHOLDER_NAMES: &[&str] = &["NN", "Unknown", "N.N"];

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    pub fetched: usize,
    pub added: usize,
    pub reused: usize,
    pub purged: usize,
    pub failed: usize,
}

struct Job {
    url: String,
    parent: Option<(PersonId, Gender)>,
}

/// Breadth-first walk of Geni profiles from a root, extending the people map
/// in place. A visited set replaces the original's unguarded recursion, so
/// shared ancestors are fetched once and ancestry loops cannot hang the walk.
pub struct TreeBuilder<'a, S: PageSource> {
    source: &'a S,
    era: Era,
    blacklist: Vec<String>,
}

impl<'a, S: PageSource> TreeBuilder<'a, S> {
    pub fn new(source: &'a S, era: Era) -> Self {
        TreeBuilder {
            source,
            era,
            blacklist: DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_blacklist(mut self, blacklist: Vec<String>) -> Self {
        self.blacklist = blacklist;
        self
    }

    pub async fn extend(&self, people: &mut People, root_url: &str) -> Result<WalkStats> {
        let mut stats = WalkStats::default();
        // url -> surviving person id; None for purged or failed profiles.
        let mut visited: HashMap<String, Option<PersonId>> = HashMap::new();
        let mut queue: VecDeque<Job> = VecDeque::new();
        queue.push_back(Job { url: root_url.to_string(), parent: None });

        while let Some(job) = queue.pop_front() {
            if let Some(outcome) = visited.get(&job.url) {
                if let Some(id) = outcome.clone() {
                    link_parent(people, &id, &job.parent);
                }
                continue;
            }

            // A record scraped in an earlier run is reused, not re-fetched.
            if let Some(id) = find_by_profile(people, &job.url).cloned() {
                if people[&id].birth.is_some() {
                    visited.insert(job.url.clone(), Some(id.clone()));
                    stats.reused += 1;
                    link_parent(people, &id, &job.parent);
                    continue;
                }
            }

            let html = match self.source.fetch_page(&job.url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(url = %job.url, error = %e, "failed to fetch profile");
                    visited.insert(job.url.clone(), None);
                    stats.failed += 1;
                    continue;
                }
            };
            stats.fetched += 1;

            let profile = match parse_profile(&html, &job.url, &self.era, &self.blacklist) {
                Ok(profile) => profile,
                Err(e) => {
                    warn!(url = %job.url, error = %e, "failed to parse profile");
                    visited.insert(job.url.clone(), None);
                    stats.failed += 1;
                    continue;
                }
            };

            if profile.may_be_alive {
                info!(name = %profile.name, "may be alive");
            }

            let out_of_era = profile
                .birth
                .map_or(true, |b| b.earliest >= self.era.end_year);
            let placeholder = PLACEHOLDER_NAMES.iter().any(|p| profile.name.contains(p));
            if out_of_era || placeholder {
                // Drop any stub created for this profile in an earlier run,
                // along with every reference to it.
                if let Some(id) = find_by_profile(people, &job.url).cloned() {
                    remove_person(people, &id);
                }
                info!(url = %job.url, name = %profile.name, "purged profile");
                visited.insert(job.url.clone(), None);
                stats.purged += 1;
                continue;
            }

            let id = match find_by_profile(people, &job.url).cloned() {
                Some(id) => id,
                None => {
                    let id = next_person_id(people);
                    people.insert(id.clone(), Person::default());
                    stats.added += 1;
                    id
                }
            };

            {
                let person = &mut people[&id];
                if person.name.is_none() {
                    person.name = Some(profile.name.clone());
                }
                person.birth = profile.birth;
                person.death = profile.death;
                person.gender = Some(profile.gender);
                person.profile = Some(job.url.clone());
            }
            info!(id = %id, name = %profile.name, "recorded person");

            visited.insert(job.url.clone(), Some(id.clone()));
            link_parent(people, &id, &job.parent);

            for link in profile.child_links {
                queue.push_back(Job {
                    url: link,
                    parent: Some((id.clone(), profile.gender)),
                });
            }
        }

        Ok(stats)
    }
}

// Removal keeps the map self-consistent: a stale record from an earlier run
// may already be someone's parent or child.
fn remove_person(people: &mut People, id: &PersonId) {
    people.shift_remove(id);
    for person in people.values_mut() {
        if person.father.as_ref() == Some(id) {
            person.father = None;
        }
        if person.mother.as_ref() == Some(id) {
            person.mother = None;
        }
        if let Some(children) = &mut person.children {
            children.retain(|c| c != id);
            if children.is_empty() {
                person.children = None;
            }
        }
    }
}

fn link_parent(people: &mut People, child_id: &PersonId, parent: &Option<(PersonId, Gender)>) {
    let Some((parent_id, parent_gender)) = parent else {
        return;
    };
    {
        let child = &mut people[child_id];
        match parent_gender {
            Gender::Male => child.father = Some(parent_id.clone()),
            Gender::Female => child.mother = Some(parent_id.clone()),
        }
    }
    people[parent_id].add_child(child_id.clone());
}
