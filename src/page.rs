use std::path::{Path, PathBuf};

use scraper::{ElementRef, Html, Node, Selector};

use crate::{client::WikiClient, types::HarvestError};

/// Turns a normalized HTML document into a PDF at `dest`. Relative resources
/// resolve against `base_url`.
pub trait PdfRenderer {
    fn render(&mut self, html: &str, base_url: &str, dest: &Path) -> Result<(), HarvestError>;
}

/// Parses `html` and serializes the tree back out, with a `<base>` element
/// pointing at `base_url` first in `<head>`.
pub fn normalize_html(html: &str, base_url: &str) -> String {
    let mut document = Html::parse_document(html);

    let head = first_match(&document, "head").map(|h| h.id());
    let fragment = Html::parse_fragment(&format!(r#"<base href="{}">"#, escape_attr(base_url)));
    let base = first_match(&fragment, "base").map(|b| Node::Element(b.value().clone()));

    match (head, base) {
        (Some(id), Some(base)) => {
            if let Some(mut head) = document.tree.get_mut(id) {
                head.prepend(base);
            }
        }
        _ => warn!("could not add a base element for {}", base_url),
    }

    document.root_element().html()
}

fn first_match<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub struct PageFetcher<'a, R: PdfRenderer> {
    client: &'a WikiClient,
    renderer: &'a mut R,
    output_dir: PathBuf,
}

pub struct FetchedPage {
    pub html: String,
    pub pdf: Option<PathBuf>,
}

impl<'a, R: PdfRenderer> PageFetcher<'a, R> {
    pub fn new(client: &'a WikiClient, renderer: &'a mut R, output_dir: &Path) -> Self {
        PageFetcher {
            client,
            renderer,
            output_dir: output_dir.to_path_buf(),
        }
    }

    pub fn pdf_path(&self, title: &str) -> PathBuf {
        self.output_dir.join(format!("{}.pdf", title))
    }

    /// Downloads `url` and renders it to `<output_dir>/<title>.pdf`. Returns
    /// `None` when the page could not be fetched; a failed render still
    /// returns the raw HTML.
    pub fn fetch_and_render(&mut self, url: &str, title: &str) -> Option<FetchedPage> {
        let html = match self.fetch(url) {
            Ok(h) => h,
            Err(HarvestError::Status { status, .. }) => {
                warn!("[HTTP {}] failed to load page {}", status.as_u16(), url);
                return None;
            }
            Err(e) => {
                warn!("connection error while downloading {}: {}", url, e);
                return None;
            }
        };

        let dest = self.pdf_path(title);
        let pretty = normalize_html(&html, url);
        let pdf = match self.renderer.render(&pretty, url, &dest) {
            Ok(_) => {
                info!("PDF saved: {:?}", dest);
                Some(dest)
            }
            Err(e) => {
                error!("PDF conversion error for {}: {}", url, e);
                None
            }
        };

        Some(FetchedPage { html, pdf })
    }

    fn fetch(&self, url: &str) -> Result<String, HarvestError> {
        let res = self.client.get(url)?;
        res.text().map_err(|source| HarvestError::Transport {
            url: url.into(),
            source,
        })
    }
}
