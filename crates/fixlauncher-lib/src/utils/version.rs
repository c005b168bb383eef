use std::cmp::Ordering;

/// Loose dotted version as found in maven coordinates and `java -version`
/// output ("9.7.1", "21.0.2", "0.16.9", "1.21.4-rc1").
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Version {
    base: Vec<Part>,
    tag: Option<Vec<Part>>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Part {
    Numeric(u64),
    Text(String),
}

impl Version {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (base, tag) = match raw.split_once('-') {
            Some((b, t)) => (b, Some(t)),
            None => (raw, None),
        };
        Version {
            base: split_parts(base),
            tag: tag.map(split_parts),
        }
    }

    /// First numeric component, if any.
    pub fn major(&self) -> Option<u64> {
        match self.base.first() {
            Some(Part::Numeric(n)) => Some(*n),
            _ => None,
        }
    }
}

fn split_parts(s: &str) -> Vec<Part> {
    let mut parts = Vec::new();
    for segment in s.split(['.', '_', '+']) {
        if segment.is_empty() {
            continue;
        }
        // "3rc" style segments become [3, "rc"]
        let digits: String = segment.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            parts.push(Part::Text(segment.to_lowercase()));
            continue;
        }
        parts.push(Part::Numeric(digits.parse().unwrap_or(0)));
        let rest = &segment[digits.len()..];
        if !rest.is_empty() {
            parts.push(Part::Text(rest.to_lowercase()));
        }
    }
    parts
}

fn compare_parts(a: &[Part], b: &[Part]) -> Ordering {
    for (ap, bp) in a.iter().zip(b.iter()) {
        match ap.cmp(bp) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    // Missing trailing components count as zero: 9.9 == 9.9.0
    let (longer, flip) = if a.len() >= b.len() { (a, false) } else { (b, true) };
    let tail = &longer[a.len().min(b.len())..];
    let ord = if tail.iter().all(|p| *p == Part::Numeric(0)) {
        Ordering::Equal
    } else {
        Ordering::Greater
    };
    if flip {
        ord.reverse()
    } else {
        ord
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match compare_parts(&self.base, &other.base) {
            Ordering::Equal => {}
            ord => return ord,
        }
        // A pre-release tag sorts before the bare version
        match (&self.tag, &other.tag) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => compare_parts(a, b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub fn compare_versions(a: &str, b: &str) -> Ordering {
    Version::parse(a).cmp(&Version::parse(b))
}

/// `version >= minimum`
pub fn version_at_least(version: &str, minimum: &str) -> bool {
    compare_versions(version, minimum) != Ordering::Less
}
