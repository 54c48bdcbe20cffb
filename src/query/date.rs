//! Publication date filtering

/// Year used for the missing lower bound of an open range
pub const OPEN_START_YEAR: u32 = 1800;
/// Year used for the missing upper bound of an open range ("present" in PubMed syntax)
pub const OPEN_END_YEAR: u32 = 3000;

/// Publication year range, at least one bound present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start_year: Option<u32>,
    end_year: Option<u32>,
}

impl DateRange {
    /// Create a range from optional bounds; `None` when both are absent
    ///
    /// Bounds given in the wrong order are swapped.
    pub fn new(start_year: Option<u32>, end_year: Option<u32>) -> Option<Self> {
        match (start_year, end_year) {
            (None, None) => None,
            (Some(start), Some(end)) if start > end => Some(Self {
                start_year: Some(end),
                end_year: Some(start),
            }),
            (start_year, end_year) => Some(Self {
                start_year,
                end_year,
            }),
        }
    }

    /// Inclusive range between two years
    pub fn between(start_year: u32, end_year: u32) -> Self {
        Self {
            start_year: Some(start_year.min(end_year)),
            end_year: Some(start_year.max(end_year)),
        }
    }

    /// Everything published in or after `year`
    pub fn from_year(year: u32) -> Self {
        Self {
            start_year: Some(year),
            end_year: None,
        }
    }

    /// Everything published in or before `year`
    pub fn until(year: u32) -> Self {
        Self {
            start_year: None,
            end_year: Some(year),
        }
    }

    pub fn start_year(&self) -> Option<u32> {
        self.start_year
    }

    pub fn end_year(&self) -> Option<u32> {
        self.end_year
    }

    /// Render as a `[PDAT]` range clause
    pub fn to_filter(&self) -> String {
        let start = self.start_year.unwrap_or(OPEN_START_YEAR);
        let end = self.end_year.unwrap_or(OPEN_END_YEAR);
        format!("{}[PDAT]:{}[PDAT]", start, end)
    }
}
