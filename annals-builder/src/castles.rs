use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use annals_core::dates::{
    classify_founding_text, classify_page_text, extract_earliest_pre_era, DateClass, Era,
};
use annals_core::models::{Castle, Coordinates};
use annals_core::store;

use crate::fetch::PageSource;

pub const CASTLE_INDEX_URL: &str = "https://en.wikipedia.org/wiki/List_of_castles_in_Scotland";

const WIKI_BASE: &str = "https://en.wikipedia.org";
const COUNCIL_SECTION_ID: &str = "Lists_by_council_area";
const SNIPPET_LEN: usize = 300;

static SUBPAGE_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r##"href="(/wiki/List_of_castles_in_[^"#]+)""##).expect("subpage regex"));

static SECTION_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"class="mw-heading mw-heading2""#).expect("section regex"));

static TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<table[^>]*class="[^"]*wikitable[^"]*".*?</table>"#).expect("table regex"));

static ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<tr[^>]*>.*?</tr>").expect("row regex"));

static CELL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<td[^>]*>.*?</td>").expect("cell regex"));

static HREF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"href="([^"]+)""#).expect("href regex"));

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));

static STYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<style[^>]*>.*?</style>").expect("style regex"));

static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<script[^>]*>.*?</script>").expect("script regex"));

static GEO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<span class="geo">([^<]+)</span>"#).expect("geo regex"));

static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("blank regex"));

static RUNS_OF_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("space regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub name: String,
    pub table_date: String,
    pub page_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Skip,
    Review,
}

/// Both signals pre-era: keep. Page says post-era and the table does not
/// disagree: skip. Everything else goes to the review file a human works
/// through, replacing the old interactive prompt.
pub fn decide(table: DateClass, page: DateClass) -> Decision {
    match (table, page) {
        (DateClass::Pre, DateClass::Pre) => Decision::Accept,
        (DateClass::Post, DateClass::Post) | (DateClass::Unknown, DateClass::Post) => Decision::Skip,
        _ => Decision::Review,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewEntry {
    pub name: String,
    pub page_url: String,
    pub table_date: String,
    pub table_class: String,
    pub page_class: String,
    pub snippet: String,
}

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub accepted: usize,
    pub skipped: usize,
    pub review: usize,
    pub failed: usize,
    pub resumed_after: Option<String>,
}

fn class_name(c: DateClass) -> &'static str {
    match c {
        DateClass::Pre => "pre",
        DateClass::Post => "post",
        DateClass::Unknown => "unknown",
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

fn strip_tags(html: &str) -> String {
    decode_entities(&TAG_RE.replace_all(html, " "))
}

/// Council-area subpage links under the "Lists by council area" heading.
/// Falls back to the index page itself when the section is missing.
pub fn subpage_links(html: &str, main_url: &str) -> Vec<String> {
    let Some(start) = html.find(&format!("id=\"{COUNCIL_SECTION_ID}\"")) else {
        warn!("council area heading not found, falling back to the index page");
        return vec![main_url.to_string()];
    };
    let section = &html[start..];
    // The heading's own container precedes `start`; the next heading2 ends
    // the section.
    let end = SECTION_BREAK_RE
        .find(section)
        .map(|m| m.start())
        .unwrap_or(section.len());
    let section = &section[..end];

    let mut links = Vec::new();
    for cap in SUBPAGE_LINK_RE.captures_iter(section) {
        let path = &cap[1];
        if path == "/wiki/List_of_castles_in_Scotland" {
            continue;
        }
        let full = format!("{WIKI_BASE}{path}");
        if !links.contains(&full) {
            links.push(full);
        }
    }

    if links.is_empty() {
        warn!("no council area subpages found, falling back to the index page");
        links.push(main_url.to_string());
    }
    links
}

/// Castle rows from every wikitable on a list page: name and link from the
/// first cell, founding date from the third.
pub fn castle_rows(html: &str) -> Vec<TableEntry> {
    let mut entries = Vec::new();

    for table in TABLE_RE.find_iter(html) {
        for row in ROW_RE.find_iter(table.as_str()).skip(1) {
            let cells: Vec<&str> = CELL_RE.find_iter(row.as_str()).map(|m| m.as_str()).collect();
            if cells.is_empty() {
                continue; // header row
            }
            let Some(link) = HREF_RE.captures(cells[0]).map(|c| c[1].to_string()) else {
                continue;
            };
            let name = strip_tags(cells[0]).trim().to_string();
            let table_date = cells
                .get(2)
                .map(|c| strip_tags(c).trim().to_string())
                .unwrap_or_default();
            let page_url = if link.starts_with("http") {
                link
            } else {
                format!("{WIKI_BASE}{link}")
            };
            entries.push(TableEntry { name, table_date, page_url });
        }
    }

    entries
}

/// Main article text with scripts, styles and the footer stripped, tags
/// removed and whitespace collapsed.
pub fn clean_text(html: &str) -> String {
    let body = match html.find("id=\"mw-content-text\"") {
        Some(start) => {
            let rest = &html[start..];
            let end = rest.find("class=\"printfooter\"").unwrap_or(rest.len());
            &rest[..end]
        }
        None => html,
    };
    let body = STYLE_RE.replace_all(body, "");
    let body = SCRIPT_RE.replace_all(&body, "");
    let text = strip_tags(&body);
    let text = BLANK_LINES_RE.replace_all(&text, "\n");
    RUNS_OF_SPACE_RE.replace_all(&text, " ").trim().to_string()
}

pub fn extract_coordinates(html: &str) -> Option<Coordinates> {
    let cap = GEO_RE.captures(html)?;
    let coord_text = cap[1].trim().replace(';', ",");
    let mut parts = coord_text.split(',');
    let lat = parts.next()?.trim().to_string();
    let lon = parts.next()?.trim().to_string();
    if lat.is_empty() || lon.is_empty() {
        return None;
    }
    Some(Coordinates { lat, lon })
}

fn review_path(out_path: &Path) -> PathBuf {
    let stem = out_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "castles".to_string());
    out_path.with_file_name(format!("{stem}-review.json"))
}

pub struct CastlePipeline<'a, S: PageSource> {
    source: &'a S,
    era: Era,
}

impl<'a, S: PageSource> CastlePipeline<'a, S> {
    pub fn new(source: &'a S, era: Era) -> Self {
        CastlePipeline { source, era }
    }

    async fn build_castle(&self, name: &str, page_url: &str, html: &str) -> Castle {
        let text = clean_text(html);
        let earliest_date = extract_earliest_pre_era(&text, &self.era);
        let coordinates = extract_coordinates(html);
        Castle {
            name: name.to_string(),
            wiki_page: page_url.to_string(),
            text,
            earliest_date,
            coordinates,
        }
    }

    /// Scrape the index, classify every table entry and extend the output
    /// artifact, resuming after the last previously accepted castle.
    pub async fn run(&self, index_url: &str, out_path: &Path) -> Result<RunReport> {
        let mut report = RunReport::default();

        let mut accepted: Vec<Castle> = if out_path.exists() {
            store::backup(out_path, "castles").context("backing up castles")?;
            store::load_json(out_path).context("loading existing castles")?
        } else {
            Vec::new()
        };
        let last_accepted = accepted.last().map(|c| c.wiki_page.clone());
        if let Some(ref page) = last_accepted {
            info!(after = %page, "resuming castle scrape");
        }
        report.resumed_after = last_accepted.clone();

        let index_html = self.source.fetch_page(index_url).await?;
        let subpages = subpage_links(&index_html, index_url);

        let mut reviews: Vec<ReviewEntry> = Vec::new();
        let mut processed: HashSet<String> =
            accepted.iter().map(|c| c.wiki_page.clone()).collect();
        let mut resumed = last_accepted.is_none();

        for subpage in subpages {
            let html = match self.source.fetch_page(&subpage).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(url = %subpage, error = %e, "failed to fetch subpage");
                    report.failed += 1;
                    continue;
                }
            };

            let mut pending: Vec<TableEntry> = Vec::new();
            for entry in castle_rows(&html) {
                if !resumed {
                    if Some(&entry.page_url) == last_accepted.as_ref() {
                        resumed = true;
                    }
                    continue;
                }
                if !processed.insert(entry.page_url.clone()) {
                    continue;
                }
                pending.push(entry);
            }

            let urls: Vec<String> = pending.iter().map(|e| e.page_url.clone()).collect();
            let mut pages = self.source.fetch_pages(&urls).await;

            for entry in pending {
                let table_class = classify_founding_text(&entry.table_date, &self.era);
                let page_html = match pages.remove(&entry.page_url) {
                    Some(Ok(html)) => html,
                    Some(Err(e)) => {
                        warn!(url = %entry.page_url, error = %e, "failed to fetch castle page");
                        report.failed += 1;
                        continue;
                    }
                    None => {
                        report.failed += 1;
                        continue;
                    }
                };
                let page_text = clean_text(&page_html);
                let page_class = classify_page_text(&page_text, &self.era);

                match decide(table_class, page_class) {
                    Decision::Accept => {
                        info!(name = %entry.name, "accepted castle");
                        accepted
                            .push(self.build_castle(&entry.name, &entry.page_url, &page_html).await);
                        report.accepted += 1;
                    }
                    Decision::Skip => {
                        info!(name = %entry.name, "skipped post-era castle");
                        report.skipped += 1;
                    }
                    Decision::Review => {
                        info!(name = %entry.name, "queued castle for review");
                        let snippet: String = page_text.chars().take(SNIPPET_LEN).collect();
                        reviews.push(ReviewEntry {
                            name: entry.name.clone(),
                            page_url: entry.page_url.clone(),
                            table_date: entry.table_date.clone(),
                            table_class: class_name(table_class).to_string(),
                            page_class: class_name(page_class).to_string(),
                            snippet,
                        });
                        report.review += 1;
                    }
                }
            }
        }

        store::save_json_atomic(out_path, &accepted).context("saving castles")?;
        if !reviews.is_empty() {
            let path = review_path(out_path);
            store::save_json_atomic(&path, &reviews).context("saving review file")?;
            info!(path = %path.display(), count = reviews.len(), "wrote review file");
        }

        Ok(report)
    }

    /// Re-fetch every already-accepted castle and rebuild its record with the
    /// current parsing logic, no filtering.
    pub async fn reprocess(&self, out_path: &Path) -> Result<RunReport> {
        let mut report = RunReport::default();
        let existing: Vec<Castle> = store::load_json(out_path).context("loading castles")?;
        store::backup(out_path, "castles").context("backing up castles")?;

        let urls: Vec<String> = existing.iter().map(|c| c.wiki_page.clone()).collect();
        let mut pages = self.source.fetch_pages(&urls).await;

        let mut rebuilt = Vec::with_capacity(existing.len());
        for castle in &existing {
            match pages.remove(&castle.wiki_page) {
                Some(Ok(html)) => {
                    rebuilt.push(self.build_castle(&castle.name, &castle.wiki_page, &html).await);
                    report.accepted += 1;
                }
                Some(Err(e)) => {
                    warn!(name = %castle.name, error = %e, "failed to reprocess castle");
                    report.failed += 1;
                }
                None => {
                    report.failed += 1;
                }
            }
        }

        store::save_json_atomic(out_path, &rebuilt).context("saving castles")?;
        Ok(report)
    }
}
