use std::{
    collections::HashSet,
    fs,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Context;

use crate::{
    attachments::{extract_attachments, AttachmentDownloader},
    client::WikiClient,
    config::HarvesterOptions,
    page::{PageFetcher, PdfRenderer},
    search::SearchClient,
    types::{HarvestError, RunSummary, SearchResult},
    utils::sanitize_title,
    wordlist::load_wordlist,
};

/// Runs the whole sweep: every word is searched, every page found is
/// rendered once and its attachments are downloaded.
pub struct Harvester<R: PdfRenderer> {
    options: HarvesterOptions,
    client: WikiClient,
    renderer: R,
    seen: HashSet<String>,
    should_terminate: Arc<AtomicBool>,
}

impl<R: PdfRenderer> Harvester<R> {
    pub fn new(
        options: HarvesterOptions,
        renderer: R,
        should_terminate: Arc<AtomicBool>,
    ) -> anyhow::Result<Self> {
        options.validate()?;
        let client = WikiClient::new(&options).context("could not build http client")?;
        Ok(Harvester {
            options,
            client,
            renderer,
            seen: HashSet::new(),
            should_terminate,
        })
    }

    pub fn seen(&self) -> &HashSet<String> {
        &self.seen
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    fn terminated(&self) -> bool {
        self.should_terminate.load(Ordering::Relaxed)
    }

    fn searcher(&self) -> SearchClient<'_> {
        SearchClient::new(
            &self.client,
            self.options.limit,
            Duration::from_millis(self.options.page_delay_ms),
            self.should_terminate.clone(),
        )
    }

    pub fn run(&mut self) -> Result<RunSummary, HarvestError> {
        info!("loading wordlist...");
        let words = load_wordlist(&self.options.wordlist_path);
        if words.is_empty() {
            error!("wordlist is empty or failed to load. Exiting.");
            return Err(HarvestError::EmptyWordlist {
                path: self.options.wordlist_path.clone(),
            });
        }

        let output_dir = self.options.output_dir.clone();
        fs::create_dir_all(&output_dir).map_err(|source| HarvestError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let mut summary = RunSummary::default();

        'words: for word in &words {
            if self.terminated() {
                warn!("termination requested, stopping before '{}'", word);
                break;
            }
            info!("searching for word: '{}'", word);
            summary.words_searched += 1;

            let found = self.searcher().search(word);
            summary.pages_found += found.len();

            for result in found {
                if self.terminated() {
                    warn!("termination requested, stopping");
                    break 'words;
                }
                if !self.seen.insert(result.url.clone()) {
                    continue;
                }
                self.process_page(&result, &mut summary);
            }
        }

        info!("finished. All PDFs and attachments are in {:?}", output_dir);
        debug!("{:#?}", summary);
        Ok(summary)
    }

    fn process_page(&mut self, result: &SearchResult, summary: &mut RunSummary) {
        summary.pages_processed += 1;

        let page = PageFetcher::new(&self.client, &mut self.renderer, &self.options.output_dir)
            .fetch_and_render(&result.url, &result.title);
        let page = match page {
            Some(p) => p,
            None => {
                summary.pages_failed += 1;
                return;
            }
        };
        if page.pdf.is_some() {
            summary.pdfs_written += 1;
        }

        let attachments = extract_attachments(&page.html, self.client.base_url());
        if attachments.is_empty() {
            info!("no attachments found on page '{}'", result.title);
            return;
        }

        let attach_dir = self.options.attachments_dir(&sanitize_title(&result.title));
        info!(
            "found {} attachments on page '{}'. Downloading to {:?}",
            attachments.len(),
            result.title,
            attach_dir
        );
        summary.attachments_saved +=
            AttachmentDownloader::new(&self.client).download(&attachments, &attach_dir);
    }
}
