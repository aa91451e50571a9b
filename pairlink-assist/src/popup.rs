//! Popup placement and the suggestion selection state.
//!
//! Screen coordinates are in pixels with the origin at the top-left of the
//! viewport. The caret's pixel position is derived from its line/column and a
//! fixed monospace grid, then clamped so the whole popup stays on-screen.

/// A point in viewport pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Where the editing surface sits and how far it is scrolled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceGeometry {
    /// Surface left edge in viewport pixels
    pub left: f64,
    /// Surface top edge in viewport pixels
    pub top: f64,
    pub scroll_left: f64,
    pub scroll_top: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
}

impl Default for SurfaceGeometry {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            scroll_left: 0.0,
            scroll_top: 0.0,
            viewport_width: 1280.0,
            viewport_height: 800.0,
        }
    }
}

/// Fixed grid and popup dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopupMetrics {
    pub line_height: f64,
    pub char_width: f64,
    pub popup_width: f64,
    /// Height of one suggestion row
    pub row_height: f64,
    /// Padding plus the key-hint footer
    pub chrome_height: f64,
}

impl Default for PopupMetrics {
    fn default() -> Self {
        Self {
            line_height: 22.0,
            char_width: 8.5,
            popup_width: 250.0,
            row_height: 40.0,
            chrome_height: 20.0,
        }
    }
}

impl PopupMetrics {
    /// Total popup height for `rows` suggestions.
    pub fn popup_height(&self, rows: usize) -> f64 {
        rows as f64 * self.row_height + self.chrome_height
    }
}

/// Zero-based (line, column) of a character offset.
///
/// Offsets past the end are clamped to the end of `code`.
pub fn caret_line_column(code: &str, cursor: usize) -> (usize, usize) {
    let mut line = 0;
    let mut column = 0;
    for ch in code.chars().take(cursor) {
        if ch == '\n' {
            line += 1;
            column = 0;
        } else {
            column += 1;
        }
    }
    (line, column)
}

/// Top-left corner of a popup holding `rows` suggestions for the caret at
/// `cursor`.
pub fn place_popup(
    code: &str,
    cursor: usize,
    rows: usize,
    geometry: &SurfaceGeometry,
    metrics: &PopupMetrics,
) -> Point {
    let (line, column) = caret_line_column(code, cursor);

    let caret_x = geometry.left + column as f64 * metrics.char_width;
    let caret_y = geometry.top + line as f64 * metrics.line_height + metrics.line_height;
    let raw_x = (caret_x - geometry.scroll_left).max(0.0);
    let raw_y = (caret_y - geometry.scroll_top).max(0.0);

    Point {
        x: raw_x.min(geometry.viewport_width - metrics.popup_width),
        y: raw_y.min(geometry.viewport_height - metrics.popup_height(rows)),
    }
}

/// Where a click landed relative to the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupHit {
    Outside,
    Row(usize),
    /// Inside the box but not on a row (padding or footer)
    Chrome,
}

/// Visible suggestion list and its selection.
///
/// `selected_index` is always a valid index while `visible` is set, and
/// `visible` is never set with an empty list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutocompleteState {
    visible: bool,
    suggestions: Vec<String>,
    position: Point,
    selected_index: usize,
}

impl AutocompleteState {
    pub fn hidden() -> Self {
        Self::default()
    }

    /// Show `suggestions` at `position` with the first one selected.
    ///
    /// An empty list hides instead.
    pub fn show(&mut self, suggestions: Vec<String>, position: Point) {
        if suggestions.is_empty() {
            self.hide();
            return;
        }
        self.visible = true;
        self.suggestions = suggestions;
        self.position = position;
        self.selected_index = 0;
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.suggestions.clear();
        self.selected_index = 0;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn selected(&self) -> Option<&str> {
        if !self.visible {
            return None;
        }
        self.suggestions.get(self.selected_index).map(String::as_str)
    }

    /// Move the selection down one row; no-op on the last row.
    pub fn select_next(&mut self) {
        if self.selected_index + 1 < self.suggestions.len() {
            self.selected_index += 1;
        }
    }

    /// Move the selection up one row; no-op on the first row.
    pub fn select_previous(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(1);
    }

    pub fn hit_test(&self, x: f64, y: f64, metrics: &PopupMetrics) -> PopupHit {
        if !self.visible {
            return PopupHit::Outside;
        }
        let Point { x: left, y: top } = self.position;
        let rows = self.suggestions.len();
        let inside_x = x >= left && x < left + metrics.popup_width;
        let inside_y = y >= top && y < top + metrics.popup_height(rows);
        if !(inside_x && inside_y) {
            return PopupHit::Outside;
        }

        let row = ((y - top) / metrics.row_height) as usize;
        if row < rows {
            PopupHit::Row(row)
        } else {
            PopupHit::Chrome
        }
    }
}
