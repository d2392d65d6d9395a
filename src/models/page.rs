//! Fetched page data.

use serde::Serialize;

/// Text content of the page the detector inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchedPage {
    /// URL the text was read from (after following the film link, if any)
    pub url: String,

    /// Rendered visible text
    pub text: String,

    /// Whether the film was listed on the cinema page.
    /// `None` when the film page was fetched directly.
    pub film_listed: Option<bool>,
}

impl FetchedPage {
    /// A page fetched directly, without cinema-page navigation.
    pub fn direct(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            film_listed: None,
        }
    }

    /// The cinema page did not list the film.
    pub fn film_not_listed(cinema_url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: cinema_url.into(),
            text: text.into(),
            film_listed: Some(false),
        }
    }

    /// Film page reached from the cinema page.
    pub fn via_cinema(film_page_url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: film_page_url.into(),
            text: text.into(),
            film_listed: Some(true),
        }
    }

    /// False only when navigation ran and found no film link.
    pub fn is_film_listed(&self) -> bool {
        self.film_listed.unwrap_or(true)
    }
}
