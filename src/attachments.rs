use std::{fs, path::Path};

use reqwest::Url;
use scraper::{Html, Selector};

use crate::{
    client::WikiClient,
    types::{Attachment, HarvestError},
    utils::{filename_from_url, resolve_url, ATTACHMENT_MARKER},
};

/// Attachment download links on a page, in document order.
pub fn extract_attachments(html: &str, base_url: &Url) -> Vec<Attachment> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(e) => {
            error!("error parsing HTML for attachments: {:?}", e);
            return vec![];
        }
    };

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.contains(ATTACHMENT_MARKER))
        .filter_map(|href| {
            let url = match resolve_url(base_url, href) {
                Some(u) => u,
                None => {
                    warn!("could not resolve attachment link {}", href);
                    return None;
                }
            };
            match filename_from_url(&url) {
                Some(filename) => Some(Attachment {
                    url: url.to_string(),
                    filename,
                }),
                None => {
                    warn!("attachment link {} has no file name", href);
                    None
                }
            }
        })
        .collect()
}

pub struct AttachmentDownloader<'a> {
    client: &'a WikiClient,
}

impl<'a> AttachmentDownloader<'a> {
    pub fn new(client: &'a WikiClient) -> Self {
        AttachmentDownloader { client }
    }

    /// Saves every attachment into `dir`, overwriting files with the same
    /// name. Returns how many were written.
    pub fn download(&self, attachments: &[Attachment], dir: &Path) -> usize {
        if let Err(e) = fs::create_dir_all(dir) {
            error!("could not create attachment directory {:?}: {}", dir, e);
            return 0;
        }

        let mut saved = 0;
        for attachment in attachments {
            match self.download_one(attachment, dir) {
                Ok(_) => saved += 1,
                Err(HarvestError::Status { status, url }) => {
                    warn!("[HTTP {}] failed to download attachment {}", status.as_u16(), url);
                }
                Err(e @ HarvestError::Io { .. }) => {
                    error!("failed to save attachment '{}': {}", attachment.filename, e);
                }
                Err(e) => {
                    warn!(
                        "connection error while downloading attachment {}: {}",
                        attachment.url, e
                    );
                }
            }
        }
        saved
    }

    fn download_one(&self, attachment: &Attachment, dir: &Path) -> Result<(), HarvestError> {
        let res = self.client.get(&attachment.url)?;
        let bytes = res.bytes().map_err(|source| HarvestError::Transport {
            url: attachment.url.clone(),
            source,
        })?;

        let save_path = dir.join(&attachment.filename);
        fs::write(&save_path, &bytes).map_err(|source| HarvestError::Io {
            path: save_path.clone(),
            source,
        })?;
        info!("attachment saved: {:?}", save_path);
        Ok(())
    }
}
