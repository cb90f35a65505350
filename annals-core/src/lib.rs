pub mod clans;
pub mod dates;
pub mod graph;
pub mod models;
pub mod projection;
pub mod resolve;
pub mod store;

pub use dates::{DeathDate, Era, YearRange};
pub use graph::{FamilyGraph, GraphError};
pub use models::{People, Person, PersonId};
pub use resolve::{Report, Resolver, Violation};
