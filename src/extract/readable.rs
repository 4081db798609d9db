//! Readability-based extractor.

use std::io::Cursor;

use scraper::{Html, Selector};
use url::Url;

use super::{normalize_whitespace, ArticleExtractor, ExtractedArticle, EXCERPT_LENGTH};
use crate::{CourierError, Result};

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| CourierError::Extract(format!("bad selector {css}: {e}")))
}

/// Extractor built on the readability algorithm.
///
/// Title and text come from readability; the excerpt and language come from
/// the document head.
pub struct ReadabilityExtractor {
    description: Selector,
    og_description: Selector,
    html_lang: Selector,
    meta_http_equiv: Selector,
}

impl ReadabilityExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            description: selector(r#"meta[name="description"]"#)?,
            og_description: selector(r#"meta[property="og:description"]"#)?,
            html_lang: selector("html[lang]")?,
            meta_http_equiv: selector("meta[http-equiv]")?,
        })
    }

    fn excerpt(&self, document: &Html, text: &str) -> String {
        let from_meta = [&self.description, &self.og_description]
            .into_iter()
            .filter_map(|sel| document.select(sel).next())
            .filter_map(|el| el.value().attr("content"))
            .map(normalize_whitespace)
            .find(|s| !s.is_empty());

        from_meta.unwrap_or_else(|| {
            normalize_whitespace(text)
                .chars()
                .take(EXCERPT_LENGTH)
                .collect()
        })
    }

    fn language(&self, document: &Html) -> String {
        if let Some(lang) = document
            .select(&self.html_lang)
            .next()
            .and_then(|el| el.value().attr("lang"))
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return lang.to_string();
        }

        document
            .select(&self.meta_http_equiv)
            .filter(|el| {
                el.value()
                    .attr("http-equiv")
                    .is_some_and(|v| v.eq_ignore_ascii_case("content-language"))
            })
            .filter_map(|el| el.value().attr("content"))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

impl ArticleExtractor for ReadabilityExtractor {
    fn extract(&self, html: &str, base_url: &Url) -> Result<ExtractedArticle> {
        let mut reader = Cursor::new(html.as_bytes());
        let product = readability::extractor::extract(&mut reader, base_url)
            .map_err(|e| CourierError::Extract(format!("readability failed: {}", e)))?;

        let text = product.text.trim().to_string();
        if text.is_empty() {
            return Err(CourierError::Extract(format!(
                "no readable text at {}",
                base_url
            )));
        }

        let document = Html::parse_document(html);
        Ok(ExtractedArticle {
            title: product.title.trim().to_string(),
            excerpt: self.excerpt(&document, &text),
            language: self.language(&document),
            text,
        })
    }
}
