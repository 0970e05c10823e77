//! Paper model representing a preprint fetched from the source API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A paper author, with affiliation when the source provides one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

impl Author {
    /// Author without a known affiliation
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            affiliation: None,
        }
    }

    /// Attach an affiliation
    pub fn with_affiliation(mut self, affiliation: impl Into<String>) -> Self {
        self.affiliation = Some(affiliation.into());
        self
    }
}

impl std::fmt::Display for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.affiliation {
            Some(affiliation) => write!(f, "{} ({})", self.name, affiliation),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A research paper as fetched from the preprint source
///
/// Immutable once fetched; later stages wrap it rather than modify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Source-assigned unique identifier (arXiv ID without version suffix)
    pub paper_id: String,

    /// Paper title
    pub title: String,

    /// Abstract text
    pub r#abstract: String,

    /// Authors in listed order
    pub authors: Vec<Author>,

    /// Publication (first submission) timestamp
    pub published: DateTime<Utc>,

    /// Last updated timestamp
    pub updated: Option<DateTime<Utc>>,

    /// Abstract page URL
    pub url: String,

    /// Direct PDF URL
    pub pdf_url: Option<String>,

    /// Subject categories (e.g. "cs.AI")
    pub categories: Vec<String>,
}

impl Paper {
    /// Create a new paper with required fields
    pub fn new(paper_id: String, title: String, url: String, published: DateTime<Utc>) -> Self {
        Self {
            paper_id,
            title,
            r#abstract: String::new(),
            authors: Vec::new(),
            published,
            updated: None,
            url,
            pdf_url: None,
            categories: Vec::new(),
        }
    }

    /// Author names joined for prompts and display
    pub fn author_names(&self) -> String {
        self.authors
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Authors with affiliations where known
    pub fn authors_with_affiliations(&self) -> String {
        self.authors
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Publication date as `YYYY-MM-DD`
    pub fn publish_date(&self) -> String {
        self.published.format("%Y-%m-%d").to_string()
    }

    /// Check if the paper shares at least one category with `allowed`
    ///
    /// An empty allow-list admits everything.
    pub fn in_categories(&self, allowed: &[String]) -> bool {
        allowed.is_empty() || self.categories.iter().any(|c| allowed.contains(c))
    }
}

/// Builder for constructing Paper objects
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: Paper,
}

impl PaperBuilder {
    /// Create a new builder with required fields
    pub fn new(
        paper_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        published: DateTime<Utc>,
    ) -> Self {
        Self {
            paper: Paper::new(paper_id.into(), title.into(), url.into(), published),
        }
    }

    /// Set abstract
    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.paper.r#abstract = abstract_text.into();
        self
    }

    /// Add an author
    pub fn author(mut self, author: Author) -> Self {
        self.paper.authors.push(author);
        self
    }

    /// Set all authors
    pub fn authors(mut self, authors: Vec<Author>) -> Self {
        self.paper.authors = authors;
        self
    }

    /// Set updated date
    pub fn updated(mut self, updated: DateTime<Utc>) -> Self {
        self.paper.updated = Some(updated);
        self
    }

    /// Set PDF URL
    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        self.paper.pdf_url = Some(url.into());
        self
    }

    /// Set categories
    pub fn categories(mut self, categories: Vec<String>) -> Self {
        self.paper.categories = categories;
        self
    }

    /// Build the Paper
    pub fn build(self) -> Paper {
        self.paper
    }
}
