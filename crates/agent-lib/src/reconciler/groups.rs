//! Comparison groups evaluated on every reconciliation pass

use crate::routines::{categories, RoutineRegistry};

/// A routine category contributing to a group, with its tag in the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub category: String,
    pub tag: String,
}

/// Set of routine categories whose combined size must match the workload count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonGroup {
    /// Name used in configuration (`stats`, `logs`)
    pub name: String,
    /// Prefix of the metric fragment
    pub label: String,
    pub members: Vec<GroupMember>,
}

/// Counts gathered for one group during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCount {
    pub total: i64,
    pub fragment: String,
}

impl ComparisonGroup {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            members: Vec::new(),
        }
    }

    pub fn member(mut self, category: impl Into<String>, tag: impl Into<String>) -> Self {
        self.members.push(GroupMember {
            category: category.into(),
            tag: tag.into(),
        });
        self
    }

    /// Stats pollers: one per running workload
    pub fn stats() -> Self {
        Self::new("stats", "metricsGoRoutines").member(categories::STATS, "stats")
    }

    /// Log readers, skipped and wrong-type logs together: one per running workload
    pub fn logs() -> Self {
        Self::new("logs", "logsGoRoutine")
            .member(categories::LOG, "logs")
            .member(categories::LOG_SKIP, "skipped")
            .member(categories::LOG_WRONG_TYPE, "wrongType")
    }

    /// Default groups, in evaluation order
    pub fn defaults() -> Vec<Self> {
        vec![Self::stats(), Self::logs()]
    }

    /// Read member counts and build the message fragment
    pub async fn count(&self, registry: &RoutineRegistry) -> GroupCount {
        let mut counts = Vec::with_capacity(self.members.len());
        for member in &self.members {
            // Unknown categories count as zero workers.
            counts.push(registry.count(&member.category).await.max(0));
        }

        let total: i64 = counts.iter().sum();
        let fragment = if self.members.len() == 1 {
            format!("{}:{}", self.label, total)
        } else {
            let parts: Vec<String> = self
                .members
                .iter()
                .zip(&counts)
                .map(|(member, count)| format!("{} [{}]", count, member.tag))
                .collect();
            format!("{}:({})", self.label, parts.join(" + "))
        };

        GroupCount { total, fragment }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_member_fragment() {
        let registry = RoutineRegistry::default();
        registry.add_worker("stats", "a").await.unwrap();

        let count = ComparisonGroup::stats().count(&registry).await;
        assert_eq!(count.total, 1);
        assert_eq!(count.fragment, "metricsGoRoutines:1");
    }

    #[tokio::test]
    async fn test_multi_member_fragment_sums_counts() {
        let registry = RoutineRegistry::default();
        registry.add_worker("log", "a").await.unwrap();
        registry.add_worker("log", "b").await.unwrap();
        registry.add_worker("logWrongType", "c").await.unwrap();

        let count = ComparisonGroup::logs().count(&registry).await;
        assert_eq!(count.total, 3);
        assert_eq!(
            count.fragment,
            "logsGoRoutine:(2 [logs] + 0 [skipped] + 1 [wrongType])"
        );
    }

    #[tokio::test]
    async fn test_unregistered_member_counts_as_zero() {
        let registry = RoutineRegistry::new(["stats"]);
        let count = ComparisonGroup::logs().count(&registry).await;
        assert_eq!(count.total, 0);
    }
}
