use annals_builder::fetch::StaticPages;
use annals_builder::tree::TreeBuilder;
use annals_core::dates::{Era, YearRange};
use annals_core::models::{People, Person};
use annals_core::{FamilyGraph, Resolver};

const ROOT: &str = "https://www.geni.com/people/Duncan-I/1000";
const MALCOLM: &str = "https://www.geni.com/people/Malcolm-III/2000";
const EOCHAID: &str = "https://www.geni.com/people/Eochaid/3000";
const DAVID: &str = "https://www.geni.com/people/David/4000";

fn profile_page(name: &str, birth_text: Option<&str>, child_links: &[&str]) -> String {
    let mut html = format!("<html><body>\n<h1 itemprop=\"name\">{name}</h1>\n");
    if let Some(birth) = birth_text {
        html.push_str(&format!(
            "<time id=\"birth_date\" itemprop=\"birthDate\" content=\"x\">{birth}</time>\n"
        ));
    }
    html.push_str("<div>Son of <a href=\"https://www.geni.com/people/Somebody/1\">Somebody</a></div>\n");
    if !child_links.is_empty() {
        html.push_str("<div>Father of ");
        for link in child_links {
            html.push_str(&format!("<a href=\"{link}\">child</a> "));
        }
        html.push_str("<br/></div>\n");
    }
    html.push_str("</body></html>");
    html
}

fn family_pages() -> StaticPages {
    let mut pages = StaticPages::new();
    // Malcolm is listed twice; the second job must not re-fetch him.
    pages.insert(ROOT, profile_page("Duncan I", Some("1001"), &[MALCOLM, EOCHAID, MALCOLM]));
    pages.insert(MALCOLM, profile_page("Malcolm III", Some("1031"), &[DAVID]));
    pages.insert(EOCHAID, profile_page("Eochaid", Some("1295"), &[]));
    pages.insert(DAVID, profile_page("David", Some("1058"), &[]));
    pages
}

#[tokio::test]
async fn walk_builds_linked_family() {
    let pages = family_pages();
    let builder = TreeBuilder::new(&pages, Era::default()).with_blacklist(Vec::new());
    let mut people = People::new();

    let stats = builder.extend(&mut people, ROOT).await.unwrap();

    assert_eq!(stats.fetched, 4);
    assert_eq!(stats.added, 3);
    assert_eq!(stats.purged, 1, "out-of-era child is dropped");
    assert_eq!(stats.failed, 0);

    let duncan = &people["1"];
    assert_eq!(duncan.name.as_deref(), Some("Duncan I"));
    assert_eq!(duncan.birth, Some(YearRange::single(1001)));
    assert_eq!(duncan.child_ids(), ["2".to_string()]);

    let malcolm = &people["2"];
    assert_eq!(malcolm.name.as_deref(), Some("Malcolm III"));
    assert_eq!(malcolm.father.as_deref(), Some("1"));
    assert_eq!(malcolm.child_ids(), ["3".to_string()]);

    let david = &people["3"];
    assert_eq!(david.father.as_deref(), Some("2"));
    assert_eq!(david.profile.as_deref(), Some(DAVID));

    // Eochaid was purged and never got an id.
    assert_eq!(people.len(), 3);
}

#[tokio::test]
async fn second_walk_reuses_existing_records() {
    let pages = family_pages();
    let builder = TreeBuilder::new(&pages, Era::default()).with_blacklist(Vec::new());
    let mut people = People::new();

    builder.extend(&mut people, ROOT).await.unwrap();
    let stats = builder.extend(&mut people, ROOT).await.unwrap();

    assert_eq!(stats.fetched, 0);
    assert_eq!(stats.reused, 1, "root record is reused and its line not re-walked");
    assert_eq!(people.len(), 3);
}

#[tokio::test]
async fn purge_removes_stale_stub() {
    let pages = family_pages();
    let builder = TreeBuilder::new(&pages, Era::default()).with_blacklist(Vec::new());

    // A stub from an earlier run: profile known, birth never scraped.
    let mut people = People::new();
    people.insert(
        "7".into(),
        Person {
            profile: Some(EOCHAID.to_string()),
            ..Person::default()
        },
    );

    builder.extend(&mut people, ROOT).await.unwrap();

    assert!(!people.contains_key("7"), "purged stub must be removed");
    assert!(people.values().all(|p| p.profile.as_deref() != Some(EOCHAID)));
}

#[tokio::test]
async fn purging_a_stub_strips_references_to_it() {
    let pages = family_pages();
    let builder = TreeBuilder::new(&pages, Era::default()).with_blacklist(Vec::new());

    // An earlier run left a stub and a record pointing at it.
    let mut people = People::new();
    people.insert(
        "1".into(),
        Person {
            birth: Some(YearRange::single(1210)),
            children: Some(vec!["7".into()]),
            ..Person::default()
        },
    );
    people.insert(
        "7".into(),
        Person {
            father: Some("1".into()),
            profile: Some(EOCHAID.to_string()),
            ..Person::default()
        },
    );

    builder.extend(&mut people, ROOT).await.unwrap();

    assert!(!people.contains_key("7"));
    assert_eq!(people["1"].children, None, "child list must not dangle");
    assert!(FamilyGraph::build(&people).is_ok());
    assert!(Resolver::new(Era::default()).run(&mut people).is_ok());
}

#[tokio::test]
async fn fetch_failures_are_recorded_not_fatal() {
    let mut pages = StaticPages::new();
    pages.insert(ROOT, profile_page("Duncan I", Some("1001"), &[MALCOLM]));
    // Malcolm's page is missing.
    let builder = TreeBuilder::new(&pages, Era::default()).with_blacklist(Vec::new());
    let mut people = People::new();

    let stats = builder.extend(&mut people, ROOT).await.unwrap();

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.added, 1);
    assert_eq!(people.len(), 1);
}

#[tokio::test]
async fn placeholder_names_are_purged() {
    let mut pages = StaticPages::new();
    pages.insert(ROOT, profile_page("NN", Some("1100"), &[]));
    let builder = TreeBuilder::new(&pages, Era::default()).with_blacklist(Vec::new());
    let mut people = People::new();

    let stats = builder.extend(&mut people, ROOT).await.unwrap();

    assert_eq!(stats.purged, 1);
    assert!(people.is_empty());
}
