//! Inclusion/exclusion policy over metric family names

/// Decides which raw and derived families are emitted
///
/// Consulted once, when the generator list is filtered at startup.
pub trait FamilyFilter {
    fn is_included(&self, name: &str) -> bool;
    fn is_excluded(&self, name: &str) -> bool;
}

/// Error building a policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// Both an allowlist and a denylist were supplied
    ConflictingLists,
    /// A pattern was empty
    EmptyPattern,
}

impl std::fmt::Display for PolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyError::ConflictingLists => {
                write!(f, "allowlist and denylist are mutually exclusive")
            }
            PolicyError::EmptyPattern => write!(f, "empty metric name pattern"),
        }
    }
}

impl std::error::Error for PolicyError {}

/// A metric name pattern (glob-style, `*` and `?`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    pattern: Vec<char>,
    source: String,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self, PolicyError> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(PolicyError::EmptyPattern);
        }
        Ok(NamePattern {
            pattern: trimmed.chars().collect(),
            source: trimmed.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check if a metric name matches this pattern
    pub fn matches(&self, name: &str) -> bool {
        let text: Vec<char> = name.chars().collect();
        glob_match(&self.pattern, &text)
    }
}

fn glob_match(pattern: &[char], text: &[char]) -> bool {
    let mut p = 0;
    let mut t = 0;
    // Position of the last `*` and the text index it was tried against
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
                continue;
            }
            Some('?') => {
                p += 1;
                t += 1;
                continue;
            }
            Some(&c) if c == text[t] => {
                p += 1;
                t += 1;
                continue;
            }
            _ => {}
        }

        match backtrack {
            Some((star_p, star_t)) => {
                p = star_p + 1;
                t = star_t + 1;
                backtrack = Some((star_p, star_t + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Allowlist or denylist of family names
///
/// With a non-empty allowlist, a name is excluded unless an allow pattern
/// matches it. Otherwise a name is excluded only if a deny pattern matches.
/// The default (both lists empty) includes everything.
#[derive(Debug, Clone, Default)]
pub struct AllowDenyList {
    allow: Vec<NamePattern>,
    deny: Vec<NamePattern>,
}

impl AllowDenyList {
    pub fn new<A, D>(allow: A, deny: D) -> Result<Self, PolicyError>
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        let allow = allow
            .into_iter()
            .map(|p| NamePattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let deny = deny
            .into_iter()
            .map(|p| NamePattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        if !allow.is_empty() && !deny.is_empty() {
            return Err(PolicyError::ConflictingLists);
        }

        Ok(AllowDenyList { allow, deny })
    }

    /// Policy that includes every name
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn allowlist<I>(patterns: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self::new(patterns, std::iter::empty::<&str>())
    }

    pub fn denylist<I>(patterns: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self::new(std::iter::empty::<&str>(), patterns)
    }

    pub fn is_allowlist(&self) -> bool {
        !self.allow.is_empty()
    }

    pub fn patterns(&self) -> &[NamePattern] {
        if self.is_allowlist() {
            &self.allow
        } else {
            &self.deny
        }
    }
}

impl FamilyFilter for AllowDenyList {
    fn is_included(&self, name: &str) -> bool {
        !self.is_excluded(name)
    }

    fn is_excluded(&self, name: &str) -> bool {
        if self.is_allowlist() {
            !self.allow.iter().any(|p| p.matches(name))
        } else {
            self.deny.iter().any(|p| p.matches(name))
        }
    }
}

impl<F: FamilyFilter + ?Sized> FamilyFilter for &F {
    fn is_included(&self, name: &str) -> bool {
        (**self).is_included(name)
    }

    fn is_excluded(&self, name: &str) -> bool {
        (**self).is_excluded(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, name: &str) -> bool {
        NamePattern::new(pattern).unwrap().matches(name)
    }

    #[test]
    fn test_exact_and_star() {
        assert!(matches("kube_pod_info", "kube_pod_info"));
        assert!(!matches("kube_pod_info", "kube_pod_info_by_owner"));
        assert!(matches("kube_pod_*", "kube_pod_info"));
        assert!(matches("*_by_owner", "kube_pod_info_by_owner"));
        assert!(matches("kube_*_info", "kube_service_info"));
        assert!(!matches("kube_*_info", "kube_service_info_by_type"));
        assert!(matches("*", ""));
    }

    #[test]
    fn test_question_mark() {
        assert!(matches("kube_po?_info", "kube_pod_info"));
        assert!(!matches("kube_po?_info", "kube_po_info"));
    }

    #[test]
    fn test_backtracking() {
        assert!(matches("*_by_*", "kube_x_by_y_by_z"));
        assert!(matches("a*b*c", "aXbYbZc"));
        assert!(!matches("a*b*c", "aXbYbZ"));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert_eq!(NamePattern::new("  "), Err(PolicyError::EmptyPattern));
    }

    #[test]
    fn test_denylist() {
        let policy = AllowDenyList::denylist(["kube_service_info"]).unwrap();
        assert!(policy.is_excluded("kube_service_info"));
        assert!(policy.is_included("kube_service_info_by_type"));
    }

    #[test]
    fn test_allowlist() {
        let policy = AllowDenyList::allowlist(["kube_pod_*"]).unwrap();
        assert!(policy.is_included("kube_pod_info"));
        assert!(policy.is_excluded("kube_service_info"));
    }

    #[test]
    fn test_conflicting_lists() {
        let err = AllowDenyList::new(["a"], ["b"]).unwrap_err();
        assert_eq!(err, PolicyError::ConflictingLists);
    }

    #[test]
    fn test_allow_all() {
        let policy = AllowDenyList::allow_all();
        assert!(policy.is_included("anything"));
        assert!(!policy.is_excluded(""));
    }
}
