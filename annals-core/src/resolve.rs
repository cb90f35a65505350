use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dates::{DeathDate, Era, YearRange};
use crate::graph::{living_focus, FamilyGraph, GraphError};
use crate::models::{People, PersonId};

/// Minimum parent/child age gap, in years.
pub const MIN_PARENT_AGE: i32 = 15;

/// A birth year only moves automatically when the move leaves this much room.
const ADJUST_SLACK: i32 = 5;

// Death-inference cohort boundaries, tuned for the 1291 map population.
const ALIVE_EARLIEST_BIRTH: i32 = 1250;
const ALIVE_LATEST_BIRTH: i32 = 1290;
const EARLY_COHORT_EARLIEST: i32 = 1231;
const EARLY_COHORT_LATEST: i32 = 1250;
const TYPICAL_LIFESPAN: i32 = 45;
const LONG_LIFESPAN: i32 = 65;
const INFERRED_DEATH_CAP: i32 = 1280;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    MissingBirth { person: PersonId },
    MissingDeath { person: PersonId },
    BirthAfterDeath { person: PersonId, birth_earliest: i32, death_latest: i32 },
    ParentTooYoung {
        parent: PersonId,
        child: PersonId,
        parent_birth_earliest: i32,
        child_birth_latest: i32,
    },
    DeadBeforeChildBirth {
        parent: PersonId,
        child: PersonId,
        parent_death_latest: i32,
        child_birth_earliest: i32,
    },
    Unresolvable { parent: PersonId, child: PersonId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Adjustment {
    ParentBirthMoved { person: PersonId, to: i32 },
    ChildBirthMoved { person: PersonId, to: i32 },
    MarkedAlive { person: PersonId },
    DeathInferred { person: PersonId, earliest: i32, latest: i32 },
}

#[derive(Debug, Default, Serialize)]
pub struct Report {
    pub violations: Vec<Violation>,
    pub adjustments: Vec<Adjustment>,
    pub purged: Vec<PersonId>,
}

impl Report {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Birth/death-year constraint resolution over the genealogical DAG.
///
/// Invariants, for parent P with child C:
///   I1: P.birth.earliest + MIN_PARENT_AGE <= C.birth.latest
///   I2: P.death.latest >= C.birth.earliest - 1
///   I3: P.birth.earliest <= P.death.latest
///
/// Every pass validates references and acyclicity first; a loop in the
/// scraped ancestry is reported as an error rather than walked forever.
#[derive(Debug, Clone)]
pub struct Resolver {
    pub era: Era,
}

impl Resolver {
    pub fn new(era: Era) -> Self {
        Resolver { era }
    }

    fn validated(&self, people: &People) -> Result<FamilyGraph, GraphError> {
        let graph = FamilyGraph::build(people)?;
        graph.ensure_acyclic(people)?;
        Ok(graph)
    }

    /// Walk the living-focus set and report every invariant breach without
    /// touching the data.
    pub fn check(&self, people: &People) -> Result<Vec<Violation>, GraphError> {
        let graph = self.validated(people)?;
        let mut violations = Vec::new();

        for id in living_focus(people) {
            let person = &people[&id];
            let (birth, death) = match (person.birth, person.death) {
                (Some(b), Some(d)) => (b, d),
                (None, _) => {
                    violations.push(Violation::MissingBirth { person: id.clone() });
                    continue;
                }
                (_, None) => {
                    violations.push(Violation::MissingDeath { person: id.clone() });
                    continue;
                }
            };
            let death_latest = death.latest(&self.era);

            for child_id in graph.children_of(&id) {
                let child = &people[child_id];
                let (child_birth, _child_death) = match (child.birth, child.death) {
                    (Some(b), Some(d)) => (b, d),
                    // The original checker skipped children with incomplete
                    // dates; they surface through their own focus entry.
                    _ => continue,
                };

                if birth.earliest + MIN_PARENT_AGE > child_birth.latest {
                    violations.push(Violation::ParentTooYoung {
                        parent: id.clone(),
                        child: child_id.clone(),
                        parent_birth_earliest: birth.earliest,
                        child_birth_latest: child_birth.latest,
                    });
                } else if death_latest < child_birth.earliest - 1 {
                    violations.push(Violation::DeadBeforeChildBirth {
                        parent: id.clone(),
                        child: child_id.clone(),
                        parent_death_latest: death_latest,
                        child_birth_earliest: child_birth.earliest,
                    });
                }
            }

            if birth.earliest > death_latest {
                violations.push(Violation::BirthAfterDeath {
                    person: id.clone(),
                    birth_earliest: birth.earliest,
                    death_latest,
                });
            }
        }

        Ok(violations)
    }

    /// Auto-repair age-gap breaches. A breach of at most ADJUST_SLACK years
    /// retreats the parent's birth to `child.birth.latest - MIN_PARENT_AGE`;
    /// a larger one advances the child's birth to
    /// `parent.birth.earliest + MIN_PARENT_AGE` if that stays inside the
    /// child's own lifetime. Anything else is reported untouched.
    pub fn reconcile(&self, people: &mut People) -> Result<Report, GraphError> {
        let graph = self.validated(people)?;
        let mut report = Report::default();

        for id in living_focus(people) {
            let (birth, death) = match (people[&id].birth, people[&id].death) {
                (Some(b), Some(d)) => (b, d),
                _ => continue, // check() reports these
            };
            let death_latest = death.latest(&self.era);

            for child_id in graph.children_of(&id).to_vec() {
                let child = &people[&child_id];
                let child_birth = match (child.birth, child.death) {
                    (Some(b), Some(_)) => b,
                    _ => continue,
                };
                let child_death_latest = child.death.map(|d| d.latest(&self.era));

                let breach = birth.earliest + MIN_PARENT_AGE - child_birth.latest;
                if breach > 0 {
                    if breach <= ADJUST_SLACK {
                        let to = child_birth.latest - MIN_PARENT_AGE;
                        people[&id].birth = Some(YearRange::single(to));
                        info!(person = %id, to, "parent birth year adjusted");
                        report.adjustments.push(Adjustment::ParentBirthMoved { person: id.clone(), to });
                    } else {
                        let to = birth.earliest + MIN_PARENT_AGE;
                        let fits = child_death_latest.map_or(false, |d| to <= d);
                        if fits {
                            people[&child_id].birth = Some(YearRange::single(to));
                            info!(person = %child_id, to, "child birth year adjusted");
                            report
                                .adjustments
                                .push(Adjustment::ChildBirthMoved { person: child_id.clone(), to });
                        } else {
                            warn!(parent = %id, child = %child_id, "age gap unresolvable");
                            report.violations.push(Violation::Unresolvable {
                                parent: id.clone(),
                                child: child_id.clone(),
                            });
                        }
                    }
                } else if death_latest < child_birth.earliest - 1 {
                    // No safe auto-repair for a parent dying before the
                    // child's earliest birth; leave it for review.
                    report.violations.push(Violation::DeadBeforeChildBirth {
                        parent: id.clone(),
                        child: child_id.clone(),
                        parent_death_latest: death_latest,
                        child_birth_earliest: child_birth.earliest,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Fill in missing death dates from the birth cohort: late births are
    /// alive on the map; early births get a typical-lifespan range, capped so
    /// nobody lingers implausibly close to the era end.
    pub fn infer_death(&self, people: &mut People) -> Vec<Adjustment> {
        let mut adjustments = Vec::new();

        for (id, person) in people.iter_mut() {
            if person.death.is_some() {
                continue;
            }
            let birth = match person.birth {
                Some(b) => b,
                None => continue,
            };

            if birth.earliest >= ALIVE_EARLIEST_BIRTH || birth.latest >= ALIVE_LATEST_BIRTH {
                person.death = Some(DeathDate::Alive);
                debug!(person = %id, "marked alive from birth cohort");
                adjustments.push(Adjustment::MarkedAlive { person: id.clone() });
            } else if birth.earliest <= EARLY_COHORT_EARLIEST && birth.latest <= EARLY_COHORT_LATEST {
                let earliest = birth.earliest + TYPICAL_LIFESPAN;
                let latest = INFERRED_DEATH_CAP.min(birth.latest + LONG_LIFESPAN);
                person.death = Some(DeathDate::Range(YearRange::new(earliest, latest)));
                debug!(person = %id, earliest, latest, "death range inferred");
                adjustments.push(Adjustment::DeathInferred { person: id.clone(), earliest, latest });
            }
        }

        adjustments
    }

    /// Drop people with neither a birth year nor children, then strip any
    /// references to the removed records so the map stays self-consistent.
    pub fn purge_loose(&self, people: &mut People) -> Vec<PersonId> {
        let doomed: Vec<PersonId> = people
            .iter()
            .filter(|(_, p)| p.birth.is_none() && p.child_ids().is_empty())
            .map(|(id, _)| id.clone())
            .collect();

        if doomed.is_empty() {
            return doomed;
        }

        for id in &doomed {
            people.shift_remove(id);
        }
        for person in people.values_mut() {
            if person.father.as_ref().is_some_and(|f| doomed.contains(f)) {
                person.father = None;
            }
            if person.mother.as_ref().is_some_and(|m| doomed.contains(m)) {
                person.mother = None;
            }
            if let Some(children) = &mut person.children {
                children.retain(|c| !doomed.contains(c));
                if children.is_empty() {
                    person.children = None;
                }
            }
        }

        info!(count = doomed.len(), "purged loose people");
        doomed
    }

    /// The full offline pipeline: purge, infer, reconcile, then a final
    /// check over the repaired data.
    pub fn run(&self, people: &mut People) -> Result<Report, GraphError> {
        let purged = self.purge_loose(people);
        let mut adjustments = self.infer_death(people);
        let mut report = self.reconcile(people)?;
        adjustments.append(&mut report.adjustments);
        report.adjustments = adjustments;
        report.purged = purged;
        report.violations = self.check(people)?;
        Ok(report)
    }
}
