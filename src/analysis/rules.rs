//! Ordered first-match classification rules.

/// A labelled predicate.
pub struct Rule<S, L> {
    pub label: L,
    pub when: fn(&S) -> bool,
}

impl<S, L> Rule<S, L> {
    pub fn new(label: L, when: fn(&S) -> bool) -> Self {
        Self { label, when }
    }
}

/// Rules evaluated top to bottom; the first matching rule's label wins and
/// the fallback applies when none match.
pub struct RuleSet<S, L> {
    rules: Vec<Rule<S, L>>,
    fallback: L,
}

impl<S, L: Copy> RuleSet<S, L> {
    pub fn new(rules: Vec<Rule<S, L>>, fallback: L) -> Self {
        Self { rules, fallback }
    }

    pub fn classify(&self, signals: &S) -> L {
        self.rules
            .iter()
            .find(|rule| (rule.when)(signals))
            .map_or(self.fallback, |rule| rule.label)
    }

    /// Labels in evaluation order, followed by the fallback.
    pub fn labels(&self) -> Vec<L> {
        self.rules
            .iter()
            .map(|r| r.label)
            .chain(std::iter::once(self.fallback))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_wins() {
        let rules = RuleSet::new(
            vec![
                Rule::new("big", |x: &i32| *x > 100),
                Rule::new("positive", |x: &i32| *x > 0),
            ],
            "other",
        );
        assert_eq!(rules.classify(&500), "big");
        assert_eq!(rules.classify(&5), "positive");
        assert_eq!(rules.classify(&-5), "other");
        assert_eq!(rules.labels(), vec!["big", "positive", "other"]);
    }
}
