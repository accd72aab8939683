//! Nested deck outline and its flattening into pages.
//!
//! An outline is a list of entries, each either a bare page or a part that
//! groups several pages. Flattening keeps page order and tags every page with
//! the part it came from.

use serde::{Deserialize, Serialize};

/// Outline for a single page
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageOutline {
    pub title: String,
    #[serde(default)]
    pub points: Vec<String>,
    /// Set during flattening when the page belongs to a part
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
}

impl PageOutline {
    pub fn new(title: impl Into<String>, points: Vec<String>) -> Self {
        Self {
            title: title.into(),
            points,
            part: None,
        }
    }

    /// Section heading used in image prompts: the part if any, else the title
    pub fn section(&self) -> &str {
        self.part.as_deref().unwrap_or(&self.title)
    }
}

/// One top-level outline entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutlineEntry {
    Part { part: String, pages: Vec<PageOutline> },
    Page(PageOutline),
}

/// Ordered outline of a whole deck
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outline(pub Vec<OutlineEntry>);

impl Outline {
    pub fn new(entries: Vec<OutlineEntry>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[OutlineEntry] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Expand parts into their pages, preserving order
    pub fn flatten(&self) -> Vec<PageOutline> {
        let mut pages = Vec::new();
        for entry in &self.0 {
            match entry {
                OutlineEntry::Part { part, pages: part_pages } => {
                    pages.extend(part_pages.iter().map(|page| PageOutline {
                        part: Some(part.clone()),
                        ..page.clone()
                    }));
                }
                OutlineEntry::Page(page) => pages.push(page.clone()),
            }
        }
        pages
    }

    /// Regroup flattened pages, folding consecutive pages of one part back
    /// into a single part entry
    pub fn from_pages<'a>(pages: impl IntoIterator<Item = &'a PageOutline>) -> Self {
        let mut entries: Vec<OutlineEntry> = Vec::new();
        for page in pages {
            let Some(part) = page.part.as_deref() else {
                entries.push(OutlineEntry::Page(page.clone()));
                continue;
            };
            let untagged = PageOutline {
                part: None,
                ..page.clone()
            };
            match entries.last_mut() {
                Some(OutlineEntry::Part {
                    part: current,
                    pages,
                }) if current == part => pages.push(untagged),
                _ => entries.push(OutlineEntry::Part {
                    part: part.to_string(),
                    pages: vec![untagged],
                }),
            }
        }
        Self(entries)
    }

    /// Numbered list of top-level entries, one per line
    pub fn to_text(&self) -> String {
        self.0
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let heading = match entry {
                    OutlineEntry::Part { part, .. } => part.as_str(),
                    OutlineEntry::Page(page) if page.title.is_empty() => "Untitled",
                    OutlineEntry::Page(page) => page.title.as_str(),
                };
                format!("{}. {}", index + 1, heading)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
