//! Parsed documents and the parser seam
//!
//! [`DocumentParser`] turns a [`RawResponse`] into an HTML tree;
//! [`HtmlDocumentParser`] is the default, built on `scraper`. [`Document`]
//! wraps the tree together with the URL it came from so relative references
//! resolve the way a browser would resolve them, `<base href>` included.

use crate::error::{ParseError, SelectorError};
use crate::transport::RawResponse;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Converts a response body into an HTML tree
pub trait DocumentParser: Send + Sync {
    /// Parse a response
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the response is empty or is not a document.
    fn parse(&self, response: &RawResponse) -> Result<Html, ParseError>;
}

/// Lenient HTML5 parser accepting HTML and XML media types
///
/// Responses without a `Content-Type` are sniffed as HTML. Bodies are decoded
/// as UTF-8, replacing invalid sequences.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlDocumentParser;

impl HtmlDocumentParser {
    fn is_document_type(mime: &str) -> bool {
        matches!(
            mime,
            "text/html" | "application/xhtml+xml" | "text/xml" | "application/xml"
        ) || mime.ends_with("+xml")
    }
}

impl DocumentParser for HtmlDocumentParser {
    fn parse(&self, response: &RawResponse) -> Result<Html, ParseError> {
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Err(ParseError::EmptyBody);
        }
        if let Some(mime) = response.mime_type() {
            if !mime.is_empty() && !Self::is_document_type(&mime) {
                return Err(ParseError::NotADocument { content_type: mime });
            }
        }

        let text = String::from_utf8_lossy(&response.body);
        Ok(Html::parse_document(&text))
    }
}

/// A parsed document bound to the URL it was loaded from
pub struct Document {
    html: Html,
    url: Url,
    base_url: Url,
}

impl Document {
    /// Attach base-URL context to a parsed tree
    ///
    /// The base URL is the first `<base href>` resolved against `url`, or
    /// `url` itself.
    pub fn wrap(html: Html, url: Url) -> Self {
        let base_url = first_base_href(&html)
            .and_then(|href| url.join(&href).ok())
            .unwrap_or_else(|| url.clone());
        Self {
            html,
            url,
            base_url,
        }
    }

    /// The URL the document was loaded from
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The URL relative references resolve against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying tree
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Resolve a (possibly relative) reference against the base URL
    pub fn resolve(&self, reference: &str) -> Option<Url> {
        self.base_url.join(reference.trim()).ok()
    }

    /// Elements matching a CSS selector, in document order
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError`] if `css` is not a valid selector.
    pub fn select(&self, css: &str) -> Result<Vec<ElementRef<'_>>, SelectorError> {
        let selector = parse_selector(css)?;
        Ok(self.html.select(&selector).collect())
    }

    /// Whitespace-normalized text of every element matching `css`
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError`] if `css` is not a valid selector.
    pub fn select_text(&self, css: &str) -> Result<Vec<String>, SelectorError> {
        Ok(self
            .select(css)?
            .into_iter()
            .map(|element| normalize_whitespace(element.text()))
            .collect())
    }

    /// Values of `attr` on every element matching `css` that carries it
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError`] if `css` is not a valid selector.
    pub fn select_attr(&self, css: &str, attr: &str) -> Result<Vec<String>, SelectorError> {
        Ok(self
            .select(css)?
            .into_iter()
            .filter_map(|element| element.value().attr(attr).map(str::to_string))
            .collect())
    }

    /// The document title, whitespace-normalized
    pub fn title(&self) -> Option<String> {
        self.select_text("title")
            .ok()?
            .into_iter()
            .find(|title| !title.is_empty())
    }

    /// Absolute targets of every `<a href>`, in document order
    ///
    /// References that do not resolve (e.g. `javascript:` garbage) are skipped.
    pub fn links(&self) -> Vec<Url> {
        self.select_attr("a[href]", "href")
            .unwrap_or_default()
            .iter()
            .filter_map(|href| self.resolve(href))
            .collect()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("url", &self.url.as_str())
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

fn parse_selector(css: &str) -> Result<Selector, SelectorError> {
    Selector::parse(css).map_err(|e| SelectorError {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

fn first_base_href(html: &Html) -> Option<String> {
    let selector = Selector::parse("base[href]").ok()?;
    html.select(&selector)
        .next()
        .and_then(|base| base.value().attr("href"))
        .map(str::to_string)
}

fn normalize_whitespace<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
