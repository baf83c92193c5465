//! Character reference pages: URL construction, fetching, and image extraction.

use std::collections::BTreeMap;

use etymon_core::Category;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use scraper::{Html, Selector};

use crate::{
    client::HttpClient,
    error::{FetchError, Operation},
    retry::RetryPolicy,
    run_log::RunLog,
};

/// Path and query prefix of a character's reference page.
const PAGE_PATH: &str = "CharacterEtymology.aspx?characterInput=";

/// Image URLs found on one page, grouped by category in page order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CategoryImages(BTreeMap<Category, Vec<String>>);

impl CategoryImages {
    /// URLs listed for `category`, empty if the page had none.
    #[must_use]
    pub fn get(&self, category: Category) -> &[String] {
        self.0.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    /// Categories with at least one URL, in [`Category`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[String])> {
        self.0
            .iter()
            .filter(|(_, urls)| !urls.is_empty())
            .map(|(category, urls)| (*category, urls.as_slice()))
    }

    /// Total number of URLs across categories.
    #[must_use]
    pub fn total(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Returns `true` when the page listed no images at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl FromIterator<(Category, Vec<String>)> for CategoryImages {
    fn from_iter<I: IntoIterator<Item = (Category, Vec<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Builds the reference page URL for `character`.
///
/// # Examples
/// ```
/// use etymon_crawl::page_url;
///
/// assert_eq!(
///     page_url("http://host.test/", '啊'),
///     "http://host.test/CharacterEtymology.aspx?characterInput=%E5%95%8A",
/// );
/// ```
#[must_use]
pub fn page_url(base_url: &str, character: char) -> String {
    let mut buffer = [0_u8; 4];
    let encoded = utf8_percent_encode(character.encode_utf8(&mut buffer), NON_ALPHANUMERIC);
    format!("{}/{PAGE_PATH}{encoded}", base_url.trim_end_matches('/'))
}

/// Resolves an image `src` attribute against the site's base URL.
///
/// Absolute `http(s)` URLs are returned unchanged, protocol-relative URLs
/// gain `http:`, and anything else is treated as a path under `base_url`.
#[must_use]
pub fn resolve_image_url(base_url: &str, src: &str) -> String {
    let src = src.trim();
    if src.starts_with("http://") || src.starts_with("https://") {
        return src.to_owned();
    }
    if src.starts_with("//") {
        return format!("http:{src}");
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        src.trim_start_matches('/')
    )
}

/// Extracts the raw `src` attributes under each category marker of `html`.
///
/// # Errors
/// Returns [`FetchError::Selector`] if a category selector fails to compile.
pub fn extract_image_sources(html: &str) -> Result<BTreeMap<Category, Vec<String>>, FetchError> {
    let document = Html::parse_document(html);
    Category::ALL
        .into_iter()
        .map(|category| {
            let selector = category_selector(category)?;
            let sources = document
                .select(&selector)
                .filter_map(|img| img.value().attr("src"))
                .map(str::to_owned)
                .collect();
            Ok((category, sources))
        })
        .collect()
}

fn category_selector(category: Category) -> Result<Selector, FetchError> {
    let text = format!("span#{} img", category.marker_id());
    Selector::parse(&text).map_err(|err| FetchError::Selector {
        message: err.to_string(),
        selector: text.clone(),
    })
}

/// Fetches reference pages through an [`HttpClient`] with retries.
#[derive(Clone, Copy)]
pub struct PageFetcher<'a> {
    client: &'a dyn HttpClient,
    base_url: &'a str,
    retry: RetryPolicy,
}

impl<'a> PageFetcher<'a> {
    /// Creates a fetcher for pages under `base_url`.
    #[must_use]
    pub fn new(client: &'a dyn HttpClient, base_url: &'a str, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url,
            retry,
        }
    }

    /// Fetches the page for `character` and returns its resolved image URLs.
    ///
    /// Retry warnings and the final failure are written to `log`.
    ///
    /// # Errors
    /// Returns [`FetchError::Exhausted`] once every attempt has failed; the
    /// caller should skip the character.
    pub fn fetch(&self, character: char, log: &RunLog) -> Result<CategoryImages, FetchError> {
        let url = page_url(self.base_url, character);
        let target = character.to_string();
        let html = log.in_scope(|| {
            self.retry
                .run(Operation::Page, &target, || self.client.get_text(&url))
        })?;
        Ok(extract_image_sources(&html)?
            .into_iter()
            .map(|(category, sources)| {
                let urls = sources
                    .iter()
                    .map(|src| resolve_image_url(self.base_url, src))
                    .collect();
                (category, urls)
            })
            .collect())
    }
}
