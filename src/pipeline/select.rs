//! Page sampling: pick which pages of a multi-page document to render.
//!
//! Sending every page of a 200-page contract to a VLM costs two orders of
//! magnitude more than sampling the beginning, middle, and end — and those
//! three pages carry almost all of the filing signal (letterhead, subject,
//! dates, signatures). The selection is deterministic so repeated runs over
//! the same document produce identical API requests.

/// An ordered, deduplicated set of page indices chosen from a document.
///
/// Indices are 0-based, strictly within `[0, page_count)`, and ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    indices: Vec<usize>,
}

impl PageSelection {
    /// Sample up to `max_pages` pages from a `page_count`-page document.
    ///
    /// Documents with `page_count <= max_pages` are taken whole. Larger
    /// documents are sampled at the edges and centre: `max_pages >= 3` yields
    /// `{0, (page_count - 1) / 2, page_count - 1}`, collapsed when indices
    /// coincide.
    pub fn sample(page_count: usize, max_pages: usize) -> Self {
        let mut indices: Vec<usize> = if page_count == 0 || max_pages == 0 {
            vec![]
        } else if page_count <= max_pages {
            (0..page_count).collect()
        } else if max_pages == 1 {
            vec![0]
        } else if max_pages == 2 {
            vec![0, page_count - 1]
        } else {
            vec![0, (page_count - 1) / 2, page_count - 1]
        };
        indices.dedup();
        Self { indices }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl IntoIterator for PageSelection {
    type Item = usize;
    type IntoIter = std::vec::IntoIter<usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.indices.into_iter()
    }
}
