//! Multi-key report ordering.
//!
//! A [`SortOrder`] is a prioritized list of [`SortKey`]s. Each key is parsed
//! once from a dotted path (`location_description`, `properties.road.name`,
//! `-id` for descending) into a typed accessor, so comparing two reports
//! never walks strings at sort time.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use road_reports_report_models::Report;

/// Prefix marking a key as descending.
pub const DESCENDING_PREFIX: char = '-';

/// Path separator inside a key.
pub const PATH_SEPARATOR: char = '.';

/// Key used when no order is configured.
pub const DEFAULT_SORT_KEY: &str = "properties.location_description";

/// A comparable value extracted from a report.
///
/// Missing values sort before numbers, numbers before text. Two numbers
/// compare numerically, two texts lexically.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    /// The path does not resolve to a value.
    Missing,
    /// A numeric or boolean value.
    Number(f64),
    /// Any other value, rendered as text.
    Text(String),
}

impl SortValue {
    const fn rank(&self) -> u8 {
        match self {
            Self::Missing => 0,
            Self::Number(_) => 1,
            Self::Text(_) => 2,
        }
    }

    fn from_json(value: Option<&serde_json::Value>) -> Self {
        match value {
            None | Some(serde_json::Value::Null) => Self::Missing,
            Some(serde_json::Value::Number(n)) => n.as_f64().map_or(Self::Missing, Self::Number),
            Some(serde_json::Value::Bool(b)) => Self::Number(f64::from(u8::from(*b))),
            Some(serde_json::Value::String(s)) => Self::Text(s.clone()),
            Some(other) => Self::Text(other.to_string()),
        }
    }

    fn from_id(id: &str) -> Self {
        id.parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map_or_else(|| Self::Text(id.to_string()), Self::Number)
    }
}

impl Eq for SortValue {}

impl PartialOrd for SortValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Mixed kinds rank by kind (`Missing < Number < Text`) rather than being
/// compared as strings. Comparing a number with a text as strings while
/// two numbers compare numerically is not transitive (`9 < 10`,
/// `"10" < "5x"`, `"5x" < "9"`), and `sort_by` needs a total order.
impl Ord for SortValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Errors from parsing a sort key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SortKeyError {
    /// The key (or one of its path segments) is empty.
    #[error("Empty sort key")]
    Empty,

    /// The first path segment names no report field.
    #[error("Unknown sort field: {0}")]
    UnknownField(String),
}

type Accessor = Arc<dyn Fn(&Report) -> SortValue + Send + Sync>;

/// One sort key: an accessor plus a direction.
#[derive(Clone)]
pub struct SortKey {
    path: String,
    descending: bool,
    accessor: Accessor,
}

impl SortKey {
    /// Dotted path this key reads, without the direction prefix.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `true` for descending order.
    #[must_use]
    pub const fn is_descending(&self) -> bool {
        self.descending
    }

    /// The same key with the opposite direction.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            descending: !self.descending,
            ..self.clone()
        }
    }

    /// Extracts this key's value from `report`.
    #[must_use]
    pub fn value(&self, report: &Report) -> SortValue {
        (self.accessor)(report)
    }

    /// Compares two reports on this key, honouring direction.
    #[must_use]
    pub fn compare(&self, a: &Report, b: &Report) -> Ordering {
        let ordering = self.value(a).cmp(&self.value(b));
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

impl fmt::Debug for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortKey")
            .field("path", &self.path)
            .field("descending", &self.descending)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "{DESCENDING_PREFIX}")?;
        }
        f.write_str(&self.path)
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.descending == other.descending
    }
}

impl Eq for SortKey {}

impl FromStr for SortKey {
    type Err = SortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (descending, path) = s
            .strip_prefix(DESCENDING_PREFIX)
            .map_or((false, s), |rest| (true, rest));

        let segments: Vec<String> = path.split(PATH_SEPARATOR).map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(SortKeyError::Empty);
        }

        let accessor: Accessor = match segments.as_slice() {
            [field] => match field.as_str() {
                "id" => Arc::new(|r: &Report| SortValue::from_id(&r.id)),
                "category" => Arc::new(|r: &Report| SortValue::Text(r.category.to_string())),
                "location_description" | "locationDescription" => {
                    Arc::new(|r: &Report| SortValue::Text(r.location_description.clone()))
                }
                "archived" => {
                    Arc::new(|r: &Report| SortValue::Number(f64::from(u8::from(r.archived))))
                }
                "detail" | "detail_html" | "detailHtml" => Arc::new(|r: &Report| {
                    r.detail_html
                        .as_ref()
                        .map_or(SortValue::Missing, |d| SortValue::Text(d.clone()))
                }),
                "properties" => Arc::new(|_: &Report| SortValue::Missing),
                other => return Err(SortKeyError::UnknownField(other.to_string())),
            },
            [first, axis] if first == "coordinates" => match axis.as_str() {
                "lon" | "longitude" => {
                    Arc::new(|r: &Report| SortValue::Number(r.coordinates.longitude))
                }
                "lat" | "latitude" => {
                    Arc::new(|r: &Report| SortValue::Number(r.coordinates.latitude))
                }
                other => return Err(SortKeyError::UnknownField(format!("{first}.{other}"))),
            },
            [first, rest @ ..] if first == "properties" => {
                let rest = rest.to_vec();
                Arc::new(move |r: &Report| {
                    let value = rest.split_first().and_then(|(head, tail)| {
                        tail.iter()
                            .try_fold(r.properties.get(head)?, |value, segment| value.get(segment))
                    });
                    SortValue::from_json(value)
                })
            }
            [first, ..] => return Err(SortKeyError::UnknownField(first.clone())),
            [] => return Err(SortKeyError::Empty),
        };

        Ok(Self {
            path: path.to_string(),
            descending,
            accessor,
        })
    }
}

/// A prioritized list of sort keys, compared lexicographically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    keys: Vec<SortKey>,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::parse([DEFAULT_SORT_KEY]).unwrap_or_else(|_| unreachable!())
    }
}

impl SortOrder {
    /// Builds an order from already-parsed keys.
    #[must_use]
    pub const fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    /// Parses every key of `keys`.
    ///
    /// # Errors
    ///
    /// Returns the first [`SortKeyError`] encountered.
    pub fn parse<I, S>(keys: I) -> Result<Self, SortKeyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        keys.into_iter()
            .map(|key| key.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// The keys in priority order.
    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Compares two reports key by key until one differs.
    #[must_use]
    pub fn compare(&self, a: &Report, b: &Report) -> Ordering {
        self.keys
            .iter()
            .map(|key| key.compare(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Stable sort of `reports`.
    pub fn sort(&self, reports: &mut [Report]) {
        reports.sort_by(|a, b| self.compare(a, b));
    }

    /// Moves the key for `path` to the front. If it already leads, its
    /// direction flips instead.
    pub fn promote(&mut self, key: SortKey) {
        if let Some(first) = self.keys.first_mut() {
            if first.path == key.path {
                first.descending = !first.descending;
                return;
            }
        }
        self.keys.retain(|existing| existing.path != key.path);
        self.keys.insert(0, key);
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}
