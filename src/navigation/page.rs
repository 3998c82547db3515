use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crate::error::{AutomationError, AutomationResult};
use crate::match_image::VisualElement;

/// Index of a page inside its `PageGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId(usize);

impl PageId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A known screen of the game.
#[derive(Debug, Clone)]
pub struct Page {
    name: String,
    check: Option<Arc<VisualElement>>,
    links: BTreeMap<PageId, Arc<VisualElement>>,
}

impl Page {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element that identifies the page; pages without one are never recognized.
    pub fn check(&self) -> Option<&Arc<VisualElement>> {
        self.check.as_ref()
    }

    /// Element to click on this page to reach each neighbour.
    pub fn links(&self) -> &BTreeMap<PageId, Arc<VisualElement>> {
        &self.links
    }
}

/// Directed graph of pages; an edge is a click that leads from one page to another.
#[derive(Debug, Clone, Default)]
pub struct PageGraph {
    pages: Vec<Page>,
}

impl PageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(
        &mut self,
        name: impl Into<String>,
        check: Option<&Arc<VisualElement>>,
    ) -> PageId {
        self.pages.push(Page {
            name: name.into(),
            check: check.map(Arc::clone),
            links: BTreeMap::new(),
        });
        PageId(self.pages.len() - 1)
    }

    /// Clicking `button` on `from` leads to `to`.
    pub fn link(
        &mut self,
        from: PageId,
        button: &Arc<VisualElement>,
        to: PageId,
    ) -> AutomationResult<()> {
        if to.0 >= self.pages.len() {
            return Err(AutomationError::configuration(format!("Link to unknown page #{}", to.0)));
        }
        let page = self.pages.get_mut(from.0).ok_or_else(|| {
            AutomationError::configuration(format!("Link from unknown page #{}", from.0))
        })?;
        page.links.insert(to, Arc::clone(button));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.get(id.0)
    }

    pub fn name(&self, id: PageId) -> &str {
        self.pages.get(id.0).map(|p| p.name.as_str()).unwrap_or("unknown")
    }

    pub fn find(&self, name: &str) -> Option<PageId> {
        self.pages.iter().position(|p| p.name == name).map(PageId)
    }

    /// Pages in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = (PageId, &Page)> {
        self.pages.iter().enumerate().map(|(i, p)| (PageId(i), p))
    }

    pub fn check_elements(&self) -> Vec<&VisualElement> {
        self.pages.iter().filter_map(|p| p.check.as_deref()).collect()
    }

    /// Shortest click route from every page to `destination`.
    ///
    /// Searches breadth-first from the destination over reversed links, so each
    /// page learns the neighbour one step closer. Ties go to the page added first.
    pub fn connect(&self, destination: PageId) -> Route {
        let mut next_hop = vec![None; self.pages.len()];
        let mut visited = vec![false; self.pages.len()];
        let mut queue = VecDeque::new();
        if let Some(seen) = visited.get_mut(destination.0) {
            *seen = true;
            queue.push_back(destination);
        }
        while let Some(target) = queue.pop_front() {
            for (id, page) in self.iter() {
                if visited[id.0] || !page.links.contains_key(&target) {
                    continue;
                }
                visited[id.0] = true;
                next_hop[id.0] = Some(target);
                queue.push_back(id);
            }
        }
        Route { destination, next_hop }
    }
}

/// Routing table toward one destination, valid for a single navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    destination: PageId,
    next_hop: Vec<Option<PageId>>,
}

impl Route {
    pub fn destination(&self) -> PageId {
        self.destination
    }

    /// Neighbour to click toward from `page`; `None` at the destination or when unreachable.
    pub fn next_hop(&self, page: PageId) -> Option<PageId> {
        self.next_hop.get(page.0).copied().flatten()
    }

    pub fn reaches(&self, page: PageId) -> bool {
        page == self.destination || self.next_hop(page).is_some()
    }

    /// Pages visited from `start` to the destination, both included.
    pub fn path(&self, start: PageId) -> Option<Vec<PageId>> {
        let mut path = vec![start];
        let mut current = start;
        while current != self.destination {
            current = self.next_hop(current)?;
            path.push(current);
            if path.len() > self.next_hop.len() {
                return None;
            }
        }
        Some(path)
    }
}
