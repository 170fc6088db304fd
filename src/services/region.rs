use crate::models::{Point, SearchArea, SearchRegion};

/// Drags that do not exceed this many pixels in both axes are treated as cancelled.
pub const DEFAULT_MIN_SELECTION_SIZE: u32 = 10;

/// Where the selector is in the drag-to-select gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    /// No region: the loop searches the full screen.
    Inactive,

    /// A selection gesture is in progress.
    Selecting {
        anchor: Option<Point>,
        current: Option<Point>,
        prior: Option<SearchRegion>,
    },

    /// A committed region.
    Active(SearchRegion),
}

/// Result of releasing the pointer during a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    Committed(SearchRegion),

    /// The drag was too small (or never started); the prior state was restored.
    Cancelled,

    /// The selector was not selecting, the release was ignored.
    Ignored,
}

/// Turns a drag gesture into a [`SearchRegion`].
///
/// ```text
/// Inactive --begin--> Selecting --release--> Active
///    ^                    |                    |
///    +------cancel--------+                    |
///    +---------------------reset---------------+
/// ```
#[derive(Debug, Clone)]
pub struct RegionSelector {
    state: SelectorState,
    min_size: u32,
}

impl RegionSelector {
    pub fn new() -> Self {
        Self::with_min_size(DEFAULT_MIN_SELECTION_SIZE)
    }

    pub fn with_min_size(min_size: u32) -> Self {
        Self {
            state: SelectorState::Inactive,
            min_size,
        }
    }

    pub fn state(&self) -> SelectorState {
        self.state
    }

    pub fn min_size(&self) -> u32 {
        self.min_size
    }

    /// The committed region, if any.
    pub fn active_region(&self) -> Option<SearchRegion> {
        match self.state {
            SelectorState::Active(region) => Some(region),
            _ => None,
        }
    }

    /// The area the loop should search. A selection in progress keeps the prior region.
    pub fn search_area(&self) -> SearchArea {
        match self.state {
            SelectorState::Active(region) => SearchArea::Region(region),
            SelectorState::Selecting {
                prior: Some(region),
                ..
            } => SearchArea::Region(region),
            _ => SearchArea::FullScreen,
        }
    }

    /// Enter selection mode, remembering the current region for cancellation.
    pub fn begin_selection(&mut self) {
        let prior = match self.state {
            SelectorState::Active(region) => Some(region),
            SelectorState::Selecting { prior, .. } => prior,
            SelectorState::Inactive => None,
        };
        self.state = SelectorState::Selecting {
            anchor: None,
            current: None,
            prior,
        };
        tracing::debug!("Region selection started");
    }

    /// Record the drag start point.
    pub fn pointer_down(&mut self, point: Point) {
        if let SelectorState::Selecting {
            anchor, current, ..
        } = &mut self.state
        {
            *anchor = Some(point);
            *current = Some(point);
        }
    }

    /// Update the drag and return the preview rectangle, if it has any area.
    pub fn pointer_move(&mut self, point: Point) -> Option<SearchRegion> {
        match &mut self.state {
            SelectorState::Selecting {
                anchor: Some(anchor),
                current,
                ..
            } => {
                *current = Some(point);
                SearchRegion::from_corners(*anchor, point)
            }
            _ => None,
        }
    }

    /// The rectangle being drawn, if a drag is in progress.
    pub fn preview(&self) -> Option<SearchRegion> {
        match self.state {
            SelectorState::Selecting {
                anchor: Some(anchor),
                current: Some(current),
                ..
            } => SearchRegion::from_corners(anchor, current),
            _ => None,
        }
    }

    /// Finish the drag at `point`.
    ///
    /// Commits the normalized rectangle when it exceeds the minimum size in
    /// both axes; otherwise the selection is cancelled and the previous state
    /// comes back.
    pub fn pointer_up(&mut self, point: Point) -> SelectionOutcome {
        let SelectorState::Selecting { anchor, prior, .. } = self.state else {
            return SelectionOutcome::Ignored;
        };

        let committed = anchor
            .and_then(|anchor| SearchRegion::from_corners(anchor, point))
            .filter(|region| region.width() > self.min_size && region.height() > self.min_size);

        match committed {
            Some(region) => {
                self.state = SelectorState::Active(region);
                tracing::info!("Search region selected: {}", region);
                SelectionOutcome::Committed(region)
            }
            None => {
                self.restore(prior);
                tracing::info!(
                    "Selection smaller than {}px discarded, keeping {}",
                    self.min_size,
                    self.search_area()
                );
                SelectionOutcome::Cancelled
            }
        }
    }

    /// Abort a selection in progress, restoring the previous state.
    pub fn cancel_selection(&mut self) {
        if let SelectorState::Selecting { prior, .. } = self.state {
            self.restore(prior);
        }
    }

    /// Drop any region and go back to full-screen search.
    pub fn reset(&mut self) {
        self.state = SelectorState::Inactive;
        tracing::info!("Search region reset to full screen");
    }

    fn restore(&mut self, prior: Option<SearchRegion>) {
        self.state = match prior {
            Some(region) => SelectorState::Active(region),
            None => SelectorState::Inactive,
        };
    }
}

impl Default for RegionSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn drag(selector: &mut RegionSelector, from: Point, to: Point) -> SelectionOutcome {
        selector.begin_selection();
        selector.pointer_down(from);
        selector.pointer_move(to);
        selector.pointer_up(to)
    }

    #[test]
    fn test_initial_state_is_full_screen() {
        let selector = RegionSelector::new();
        assert_eq!(selector.state(), SelectorState::Inactive);
        assert_eq!(selector.search_area(), SearchArea::FullScreen);
    }

    #[test]
    fn test_commit_normalizes_reverse_drag() {
        let mut selector = RegionSelector::new();

        let outcome = drag(&mut selector, Point::new(400, 300), Point::new(100, 50));

        let expected = SearchRegion::new(100, 50, 300, 250).unwrap();
        assert_eq!(outcome, SelectionOutcome::Committed(expected));
        assert_eq!(selector.active_region(), Some(expected));
        assert_eq!(selector.search_area(), SearchArea::Region(expected));
    }

    #[test]
    fn test_preview_follows_pointer() {
        let mut selector = RegionSelector::new();
        selector.begin_selection();
        selector.pointer_down(Point::new(10, 10));

        let preview = selector.pointer_move(Point::new(60, 30)).unwrap();
        assert_eq!(preview, SearchRegion::new(10, 10, 50, 20).unwrap());
        assert_eq!(selector.preview(), Some(preview));

        let preview = selector.pointer_move(Point::new(0, 0)).unwrap();
        assert_eq!(preview, SearchRegion::new(0, 0, 10, 10).unwrap());
    }

    #[test]
    fn test_tiny_drag_reverts_to_inactive() {
        let mut selector = RegionSelector::new();

        let outcome = drag(&mut selector, Point::new(100, 100), Point::new(105, 104));

        assert_eq!(outcome, SelectionOutcome::Cancelled);
        assert_eq!(selector.state(), SelectorState::Inactive);
    }

    #[test]
    fn test_thin_drag_reverts_to_prior_region() {
        let mut selector = RegionSelector::new();
        drag(&mut selector, Point::new(0, 0), Point::new(200, 200));
        let prior = selector.active_region().unwrap();

        // Wide enough horizontally but too short vertically
        let outcome = drag(&mut selector, Point::new(0, 0), Point::new(300, 10));

        assert_eq!(outcome, SelectionOutcome::Cancelled);
        assert_eq!(selector.active_region(), Some(prior));
    }

    #[test]
    fn test_release_without_press_is_cancelled() {
        let mut selector = RegionSelector::new();
        selector.begin_selection();

        assert_eq!(selector.pointer_up(Point::new(50, 50)), SelectionOutcome::Cancelled);
        assert_eq!(selector.state(), SelectorState::Inactive);
    }

    #[test]
    fn test_release_outside_selection_is_ignored() {
        let mut selector = RegionSelector::new();
        assert_eq!(selector.pointer_up(Point::new(50, 50)), SelectionOutcome::Ignored);
        assert!(selector.pointer_move(Point::new(10, 10)).is_none());
    }

    #[test]
    fn test_selection_keeps_prior_area_until_commit() {
        let mut selector = RegionSelector::new();
        drag(&mut selector, Point::new(0, 0), Point::new(200, 200));
        let prior = selector.active_region().unwrap();

        selector.begin_selection();
        selector.pointer_down(Point::new(500, 500));
        assert_eq!(selector.search_area(), SearchArea::Region(prior));

        selector.cancel_selection();
        assert_eq!(selector.active_region(), Some(prior));
    }

    #[test]
    fn test_reset_discards_region() {
        let mut selector = RegionSelector::new();
        drag(&mut selector, Point::new(0, 0), Point::new(200, 200));

        selector.reset();

        assert_eq!(selector.state(), SelectorState::Inactive);
        assert_eq!(selector.search_area(), SearchArea::FullScreen);
    }

    #[test]
    fn test_custom_min_size() {
        let mut selector = RegionSelector::with_min_size(2);
        let outcome = drag(&mut selector, Point::new(0, 0), Point::new(3, 3));
        assert!(matches!(outcome, SelectionOutcome::Committed(_)));
    }

    proptest! {
        #[test]
        fn prop_committed_region_is_normalized(
            x1 in -2000i32..4000, y1 in -2000i32..4000,
            x2 in -2000i32..4000, y2 in -2000i32..4000,
        ) {
            let min = DEFAULT_MIN_SELECTION_SIZE;
            prop_assume!(x1.abs_diff(x2) > min && y1.abs_diff(y2) > min);

            let mut selector = RegionSelector::new();
            let outcome = drag(&mut selector, Point::new(x1, y1), Point::new(x2, y2));

            let SelectionOutcome::Committed(region) = outcome else {
                return Err(TestCaseError::fail("drag above minimum size was not committed"));
            };
            prop_assert_eq!(region.origin(), Point::new(x1.min(x2), y1.min(y2)));
            prop_assert_eq!(region.width(), x1.abs_diff(x2));
            prop_assert_eq!(region.height(), y1.abs_diff(y2));
        }
    }
}
