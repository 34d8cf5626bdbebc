//! Content sniffing: looks for a self-declared mature-content rating.
//!
//! Pages can declare their audience via `<meta name="rating">`. This is the
//! only piece of HTML the engine inspects; anything else on the page is out
//! of scope.

use scraper::{Html, Selector};
use std::sync::LazyLock;

static RATING_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[name=rating i]").unwrap());

/// Rating values that indicate mature or adult content. Includes the RTA
/// label used by adult-site self-labelling schemes.
const MATURE_RATINGS: &[&str] = &[
    "mature",
    "adult",
    "restricted",
    "rta-5042-1996-1400-1577-rta",
];

/// True when the page declares a mature-content rating meta tag. Both the
/// standard `content` attribute and the legacy `value` attribute are checked.
pub fn has_mature_rating(body: &str) -> bool {
    let document = Html::parse_document(body);

    for element in document.select(&RATING_SELECTOR) {
        let rating = element
            .value()
            .attr("content")
            .or_else(|| element.value().attr("value"));

        if let Some(rating) = rating
            && MATURE_RATINGS.contains(&rating.trim().to_lowercase().as_str())
        {
            return true;
        }
    }

    false
}
