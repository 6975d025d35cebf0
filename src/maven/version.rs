use std::cmp::Ordering;

/// Maven-compatible version ordering.
///
/// A version string is split into items at '.', '-' and at every transition between digits
///  and letters. Numeric items compare numerically, qualifiers by their well-known rank
///  (`alpha < beta < milestone < rc < snapshot < release < sp`), unknown qualifiers after all
///  known ones and lexically among each other. Missing trailing items compare like `0` or the
///  empty (release) qualifier, so `1.0 == 1.0.0 == 1-final`.
#[derive(Debug, Clone)]
pub struct ComparableVersion {
    items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    /// decimal digits without leading zeros; empty for zero
    Number(String),
    Qualifier(String),
}

impl ComparableVersion {
    pub fn new(version: &str) -> ComparableVersion {
        let mut items = Vec::new();
        let mut current = String::new();
        let mut current_is_digit = false;

        let flush = |current: &mut String, is_digit: bool, items: &mut Vec<Item>| {
            if current.is_empty() {
                return;
            }
            if is_digit {
                items.push(Item::Number(current.trim_start_matches('0').to_string()));
            }
            else {
                items.push(Item::Qualifier(normalize_qualifier(current)));
            }
            current.clear();
        };

        for c in version.trim().chars() {
            if c == '.' || c == '-' || c == '_' {
                flush(&mut current, current_is_digit, &mut items);
                continue;
            }
            let is_digit = c.is_ascii_digit();
            if !current.is_empty() && is_digit != current_is_digit {
                flush(&mut current, current_is_digit, &mut items);
            }
            current_is_digit = is_digit;
            current.push(c);
        }
        flush(&mut current, current_is_digit, &mut items);

        ComparableVersion { items }
    }
}

fn normalize_qualifier(q: &str) -> String {
    let q = q.to_ascii_lowercase();
    match q.as_str() {
        "a" => "alpha".to_string(),
        "b" => "beta".to_string(),
        "m" => "milestone".to_string(),
        "cr" => "rc".to_string(),
        "ga" | "final" | "release" => String::new(),
        _ => q,
    }
}

fn qualifier_rank(q: &str) -> usize {
    match q {
        "alpha" => 0,
        "beta" => 1,
        "milestone" => 2,
        "rc" => 3,
        "snapshot" => 4,
        "" => 5,
        "sp" => 6,
        _ => 7,
    }
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_qualifiers(a: &str, b: &str) -> Ordering {
    qualifier_rank(a).cmp(&qualifier_rank(b)).then_with(|| a.cmp(b))
}

fn compare_items(a: Option<&Item>, b: Option<&Item>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(Item::Number(n)), None) => compare_numbers(n, ""),
        (None, Some(Item::Number(n))) => compare_numbers("", n),
        (Some(Item::Qualifier(q)), None) => compare_qualifiers(q, ""),
        (None, Some(Item::Qualifier(q))) => compare_qualifiers("", q),
        (Some(Item::Number(x)), Some(Item::Number(y))) => compare_numbers(x, y),
        (Some(Item::Number(_)), Some(Item::Qualifier(_))) => Ordering::Greater,
        (Some(Item::Qualifier(_)), Some(Item::Number(_))) => Ordering::Less,
        (Some(Item::Qualifier(x)), Some(Item::Qualifier(y))) => compare_qualifiers(x, y),
    }
}

impl Ord for ComparableVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.items.len().max(other.items.len());
        for i in 0..len {
            let ordering = compare_items(self.items.get(i), other.items.get(i));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}
impl PartialOrd for ComparableVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for ComparableVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for ComparableVersion {}

pub fn compare_versions(a: &str, b: &str) -> Ordering {
    ComparableVersion::new(a).cmp(&ComparableVersion::new(b))
}

/// The greatest of the given versions according to Maven ordering
pub fn max_version<'a>(versions: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    versions.into_iter().max_by(|a, b| compare_versions(a, b))
}
