//! Discovery session: the deduplicated image URL set and the CSS cache for
//! one crawl.

use crate::extraction::{CssCache, PageImages};
use std::collections::BTreeSet;

pub struct DiscoverySession {
    images: BTreeSet<String>,
    css: CssCache,
}

impl DiscoverySession {
    pub fn new(css: CssCache) -> Self {
        Self {
            images: BTreeSet::new(),
            css,
        }
    }

    /// Merge candidates into the set. Returns how many were new.
    pub fn absorb<I>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        urls.into_iter()
            .filter(|url| self.images.insert(url.clone()))
            .count()
    }

    /// Merge one page's results and record the new-URL count in its stats.
    pub fn absorb_page(&mut self, page: &mut PageImages) -> usize {
        let new_urls = self.absorb(std::mem::take(&mut page.urls));
        page.stats.new_urls = new_urls;
        new_urls
    }

    pub fn css_mut(&mut self) -> &mut CssCache {
        &mut self.css
    }

    pub fn css(&self) -> &CssCache {
        &self.css
    }

    /// Every URL found so far, sorted.
    pub fn images(&self) -> &BTreeSet<String> {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// End the session, keeping only the URL set.
    pub fn into_images(self) -> BTreeSet<String> {
        self.images
    }
}
