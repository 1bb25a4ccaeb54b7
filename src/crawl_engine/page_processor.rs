//! The per-URL processing pipeline.
//!
//! Each popped frontier entry runs the same atomic sequence: mark visited,
//! consult robots, fetch, gate on status / content type / content length,
//! persist, then discover and enqueue outbound links. Every outcome is
//! observable through events; no error escapes the per-URL boundary.

use scraper::Html;
use url::Url;

use super::engine::CrawlEngine;
use crate::content_extractor;
use crate::content_saver;
use crate::crawl_events::types::ProgressData;
use crate::crawl_events::{CrawlEvent, SkipReason};
use crate::crawl_state::FrontierEntry;
use crate::fetcher::Fetcher;
use crate::utils::url_norm;

impl CrawlEngine {
    /// Process one URL to completion. Recoverable failures are counted and
    /// reported via events; this function never errors.
    pub(super) async fn process_url(&self, fetcher: &dyn Fetcher, entry: &FrontierEntry) {
        let Ok(url) = Url::parse(&entry.url) else {
            log::debug!("dropping unparsable frontier entry: {}", entry.url);
            return;
        };

        // Mark visited and count processed under the state lock. A concurrent
        // worker may have won the race; if so this entry is done.
        {
            let mut state = self.state_lock();
            if !state.mark_visited(&entry.url) {
                log::debug!("already visited by a concurrent worker: {}", entry.url);
                return;
            }
        }
        self.metrics().record_processed();

        if !self.config().ignore_robots
            && !self.robots().allowed(&url, &self.config().user_agent).await
        {
            self.metrics().record_robots_blocked();
            self.emit(CrawlEvent::url_skipped(
                entry.url.clone(),
                SkipReason::RobotsBlocked,
            ));
            self.emit_progress(Some(entry.url.clone()));
            return;
        }

        log::info!("crawling [depth {}]: {}", entry.depth, entry.url);

        let response = match fetcher.fetch(&url, &self.config().user_agent).await {
            Ok(response) => response,
            Err(e) => {
                self.metrics().record_error();
                self.emit(CrawlEvent::log("warn", format!("fetch failed for {}: {e:#}", entry.url)));
                self.emit(CrawlEvent::error(Some(entry.url.clone()), format!("{e:#}")));
                self.emit_progress(Some(entry.url.clone()));
                return;
            }
        };

        if !response.is_success() {
            log::debug!("non-success status {} for {}", response.status, entry.url);
            self.emit(CrawlEvent::log(
                "debug",
                format!("status {} for {}", response.status, entry.url),
            ));
            self.emit(CrawlEvent::url_skipped(
                entry.url.clone(),
                SkipReason::HttpStatus,
            ));
            self.emit_progress(Some(entry.url.clone()));
            return;
        }

        if let Some(content_type) = response.content_type()
            && self.filter().content_type_excluded(content_type)
        {
            self.metrics().record_skipped();
            self.emit(CrawlEvent::url_skipped(
                entry.url.clone(),
                SkipReason::ContentTypeExcluded,
            ));
            self.emit_progress(Some(entry.url.clone()));
            return;
        }

        if !content_extractor::has_sufficient_content(
            &response.body,
            self.config().min_content_length,
        ) {
            self.metrics().record_content_filtered();
            self.emit(CrawlEvent::url_skipped(
                entry.url.clone(),
                SkipReason::ContentFiltered,
            ));
            self.emit_progress(Some(entry.url.clone()));
            return;
        }

        let extracted = if self.config().disable_content_extraction {
            None
        } else {
            match content_extractor::extract_main_content(&response.body) {
                Ok(content) => Some(content),
                Err(e) => {
                    self.emit(CrawlEvent::log(
                        "warn",
                        format!("content extraction failed for {}: {e:#}", entry.url),
                    ));
                    None
                }
            }
        };

        match content_saver::save_page(
            &self.config().output_dir,
            &url,
            &response.body,
            extracted.as_deref(),
        )
        .await
        {
            Ok(saved) => {
                self.metrics().record_saved(saved.size);
                self.emit(CrawlEvent::url_saved(
                    entry.url.clone(),
                    saved.html_path,
                    saved.size,
                    entry.depth,
                ));
            }
            Err(e) => {
                self.metrics().record_error();
                self.emit(CrawlEvent::log("warn", format!("save failed for {}: {e:#}", entry.url)));
                self.emit(CrawlEvent::error(Some(entry.url.clone()), format!("{e:#}")));
                self.emit_progress(Some(entry.url.clone()));
                return;
            }
        }

        // Cancelled workers finish their fetch but never enqueue discoveries.
        if !self.cancel_token().is_cancelled() {
            self.enqueue_discovered_links(&url, &response.body, entry.depth);
        }

        self.emit_progress(Some(entry.url.clone()));
    }

    /// Extract outbound links in selector-document order, resolve, filter,
    /// and push the admissible ones at `parent_depth + 1`.
    fn enqueue_discovered_links(&self, base: &Url, body: &str, parent_depth: u32) {
        let document = Html::parse_document(body);
        let mut candidates: Vec<Url> = Vec::new();

        for selector in self.link_selectors() {
            for element in document.select(selector) {
                let Some(href) = element.value().attr("href") else {
                    continue;
                };
                match url_norm::resolve_and_normalize(
                    base,
                    href,
                    self.config().normalize_urls,
                    self.config().lowercase_paths,
                ) {
                    Ok(resolved) => candidates.push(resolved),
                    Err(e) => {
                        log::debug!("unresolvable link '{href}' on {base}: {e}");
                    }
                }
            }
        }

        let mut added = 0usize;
        {
            let mut state = self.state_lock();
            for candidate in candidates {
                if !self.filter().admits(&candidate) {
                    self.metrics().record_skipped();
                    continue;
                }
                if state.enqueue(candidate.into(), parent_depth + 1) {
                    added += 1;
                }
            }
            self.metrics().set_queue_size(state.frontier_len() as u64);
        }

        if added > 0 {
            log::debug!("discovered {added} new URLs on {base}");
        }
    }

    /// Emit a progress event reflecting the current counters.
    pub(super) fn emit_progress(&self, url: Option<String>) {
        let snapshot = self.metrics().snapshot();
        self.emit(CrawlEvent::progress(ProgressData {
            processed: snapshot.urls_processed,
            saved: snapshot.urls_saved,
            skipped: snapshot.urls_skipped,
            errors: snapshot.urls_errored,
            queue_size: snapshot.queue_size,
            url,
        }));
    }
}
