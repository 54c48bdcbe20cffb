//! Boolean query composition for device × indicator searches
//!
//! A composed query always has the shape
//! `("d1" OR "d2" ...) AND ("i1" OR "i2" ...) [AND <filter>]`.
//! [`ComposedQuery`] keeps the term lists next to the rendered text so the
//! batch partitioner can work on the structured form directly.

pub mod batch;
pub mod date;

use std::fmt;
use std::ops::Range;

use crate::error::{Result, RetrievalError};

pub use batch::{BatchPartitioner, split_query, term_cost};
pub use date::DateRange;

const AND: &str = " AND ";
const OR: &str = " OR ";

/// Two OR-groups of terms joined by AND, with an optional trailing filter clause
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComposedQuery {
    devices: Vec<String>,
    indicators: Vec<String>,
    filter: Option<String>,
}

impl ComposedQuery {
    /// Create a query from two term groups
    ///
    /// # Example
    ///
    /// ```
    /// use pmc_retrieval::query::ComposedQuery;
    ///
    /// let query = ComposedQuery::new(["Hemoblast", "Gelfoam"], ["prostatectomy"]);
    /// assert_eq!(
    ///     query.to_string(),
    ///     r#"("Hemoblast" OR "Gelfoam") AND ("prostatectomy")"#
    /// );
    /// ```
    pub fn new<D, I, S, T>(devices: D, indicators: I) -> Self
    where
        D: IntoIterator<Item = S>,
        I: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            devices: devices.into_iter().map(Into::into).collect(),
            indicators: indicators.into_iter().map(Into::into).collect(),
            filter: None,
        }
    }

    /// Restrict the query to a publication date range
    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.filter = Some(range.to_filter());
        self
    }

    /// Attach an already rendered filter clause such as `2023[PDAT]`
    pub fn with_filter<S: Into<String>>(mut self, filter: S) -> Self {
        let filter = filter.into();
        self.filter = (!filter.trim().is_empty()).then_some(filter);
        self
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn indicators(&self) -> &[String] {
        &self.indicators
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Total number of terms across both groups
    pub fn term_count(&self) -> usize {
        self.devices.len() + self.indicators.len()
    }

    /// Render the query string sent to ESearch
    pub fn render(&self) -> String {
        let mut rendered = format!(
            "({}){}({})",
            or_group(&self.devices),
            AND,
            or_group(&self.indicators)
        );
        if let Some(filter) = &self.filter {
            rendered.push_str(AND);
            rendered.push_str(filter);
        }
        rendered
    }

    /// Sub-query over contiguous slices of both groups, keeping the filter
    pub(crate) fn slice(&self, devices: Range<usize>, indicators: Range<usize>) -> Self {
        Self {
            devices: self.devices[devices].to_vec(),
            indicators: self.indicators[indicators].to_vec(),
            filter: self.filter.clone(),
        }
    }

    /// Recover the term groups and filter from a rendered query
    ///
    /// Splits on `" AND "`: the first two parts are the OR-groups and anything
    /// after them is kept verbatim as the filter. Parentheses and quotes around
    /// terms are stripped.
    ///
    /// # Errors
    ///
    /// * `RetrievalError::MalformedQuery` - If the text has no top-level `AND`
    pub fn parse(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split(AND).collect();
        if parts.len() < 2 {
            return Err(RetrievalError::MalformedQuery(format!(
                "expected two AND-joined groups in {:?}",
                truncate(text, 80)
            )));
        }

        let filter = (parts.len() > 2).then(|| parts[2..].join(AND));

        Ok(Self {
            devices: parse_group(parts[0]),
            indicators: parse_group(parts[1]),
            filter,
        })
    }
}

impl fmt::Display for ComposedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Build `("a" OR "b") AND ("c" OR "d") [AND <date filter>]` from two term lists
///
/// Empty lists render as `()`; empty input is valid.
///
/// # Example
///
/// ```
/// use pmc_retrieval::query::{DateRange, compose};
///
/// assert_eq!(compose::<&str>(&[], &[], None), "() AND ()");
///
/// let range = DateRange::between(2023, 2025);
/// assert_eq!(
///     compose(&["Gelfoam"], &["nephrectomy"], Some(range)),
///     r#"("Gelfoam") AND ("nephrectomy") AND 2023[PDAT]:2025[PDAT]"#
/// );
/// ```
pub fn compose<S: AsRef<str>>(devices: &[S], indicators: &[S], date_range: Option<DateRange>) -> String {
    let query = ComposedQuery::new(
        devices.iter().map(|s| s.as_ref().to_string()),
        indicators.iter().map(|s| s.as_ref().to_string()),
    );
    match date_range {
        Some(range) => query.with_date_range(range).render(),
        None => query.render(),
    }
}

fn quote(term: &str) -> String {
    format!("\"{}\"", term)
}

fn or_group(terms: &[String]) -> String {
    terms
        .iter()
        .map(|term| quote(term))
        .collect::<Vec<_>>()
        .join(OR)
}

fn parse_group(part: &str) -> Vec<String> {
    part.trim_matches(|c: char| c == '(' || c == ')')
        .split(OR)
        .map(|term| {
            term.trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace())
                .trim_matches('"')
        })
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
