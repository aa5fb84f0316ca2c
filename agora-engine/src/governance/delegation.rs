//! Conditional vote delegation.
//!
//! A delegator registers policies naming a delegate and a list of conditions
//! over the serialized proposal. The first active, unexpired policy whose
//! conditions all hold decides the delegate; later policies are not
//! consulted even if they are more specific.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use agora_core::{
    ConditionOperator, DelegationCondition, DelegationPolicy, KeyedStore, MemoryStore,
    OracleError, Proposal, Result, SecondaryIndex,
};

/// Delegate chosen for a proposal and the policy that chose it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationMatch {
    pub delegate: String,
    pub policy: DelegationPolicy,
}

/// Stores delegation policies and evaluates them against proposals.
pub struct DelegationManager {
    policies: Arc<dyn KeyedStore<DelegationPolicy>>,
    /// delegator -> policy ids in registration order
    by_delegator: SecondaryIndex,
    sequence: AtomicU64,
}

impl DelegationManager {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// Use an external policy store. Call [`rebuild_index`](Self::rebuild_index)
    /// if it already holds policies.
    pub fn with_store(policies: Arc<dyn KeyedStore<DelegationPolicy>>) -> Self {
        Self {
            policies,
            by_delegator: SecondaryIndex::new(),
            sequence: AtomicU64::new(0),
        }
    }

    pub async fn create_policy(
        &self,
        delegator: impl Into<String>,
        delegate: impl Into<String>,
        conditions: Vec<DelegationCondition>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<DelegationPolicy> {
        let delegator = delegator.into();
        let delegate = delegate.into();
        if delegator.is_empty() || delegate.is_empty() {
            return Err(OracleError::ValidationError(
                "delegator and delegate are required".to_string(),
            ));
        }
        if delegator == delegate {
            return Err(OracleError::ValidationError(format!(
                "{} cannot delegate to itself",
                delegator
            )));
        }
        if let Some(empty) = conditions.iter().find(|c| c.field.is_empty()) {
            return Err(OracleError::ValidationError(format!(
                "condition with operator {:?} has no field",
                empty.operator
            )));
        }

        let policy = DelegationPolicy {
            id: uuid::Uuid::new_v4().to_string(),
            delegator,
            delegate,
            conditions,
            expires_at,
            active: true,
            created_at: Utc::now(),
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
        };
        self.policies.put(&policy.id, policy.clone()).await?;
        self.by_delegator.insert(&policy.delegator, &policy.id);

        info!(
            policy_id = %policy.id,
            delegator = %policy.delegator,
            delegate = %policy.delegate,
            conditions = policy.conditions.len(),
            "Delegation policy created"
        );
        Ok(policy)
    }

    /// Deactivate a policy. It stays stored for audit.
    pub async fn revoke_policy(&self, policy_id: &str) -> Result<DelegationPolicy> {
        let mut policy = self
            .policies
            .get(policy_id)
            .await?
            .ok_or_else(|| OracleError::not_found("policy", policy_id))?;
        policy.active = false;
        self.policies.put(policy_id, policy.clone()).await?;

        info!(policy_id, delegator = %policy.delegator, "Delegation policy revoked");
        Ok(policy)
    }

    pub async fn get_policy(&self, policy_id: &str) -> Result<Option<DelegationPolicy>> {
        self.policies.get(policy_id).await
    }

    /// Active policies of a delegator in registration order.
    pub async fn policies_for_delegator(&self, delegator: &str) -> Result<Vec<DelegationPolicy>> {
        let mut policies = Vec::new();
        for id in self.by_delegator.get(delegator) {
            if let Some(policy) = self.policies.get(&id).await? {
                if policy.active {
                    policies.push(policy);
                }
            }
        }
        policies.sort_by_key(|p| p.sequence);
        Ok(policies)
    }

    /// Recreate the delegator index from the policy store.
    pub async fn rebuild_index(&self) -> Result<()> {
        let mut policies = self.policies.all().await?;
        policies.sort_by_key(|p| p.sequence);
        let next = policies.last().map(|p| p.sequence + 1).unwrap_or(0);
        self.sequence.fetch_max(next, Ordering::SeqCst);
        self.by_delegator
            .rebuild(policies.iter().map(|p| (p.delegator.as_str(), p.id.as_str())));
        debug!(policies = policies.len(), "Delegation index rebuilt");
        Ok(())
    }

    /// First matching policy of the delegator for this proposal.
    pub async fn should_auto_delegate(
        &self,
        delegator: &str,
        proposal: &Proposal,
    ) -> Result<Option<DelegationMatch>> {
        let now = Utc::now();
        let document = serde_json::to_value(proposal)?;

        for policy in self.policies_for_delegator(delegator).await? {
            if policy.expires_at.is_some_and(|at| at <= now) {
                continue;
            }
            if policy.conditions.iter().all(|c| evaluate(c, &document)) {
                debug!(
                    delegator,
                    delegate = %policy.delegate,
                    policy_id = %policy.id,
                    proposal_id = %proposal.id,
                    "Delegation policy matched"
                );
                return Ok(Some(DelegationMatch {
                    delegate: policy.delegate.clone(),
                    policy,
                }));
            }
        }
        Ok(None)
    }
}

impl Default for DelegationManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a dot path. Missing segments and null both resolve to `None`.
fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |value, segment| match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
        .filter(|value| !value.is_null())
}

fn same(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

fn numbers(field: &Value, operand: &Value) -> Option<(f64, f64)> {
    Some((field.as_f64()?, operand.as_f64()?))
}

/// Evaluate one condition against a serialized proposal.
pub fn evaluate(condition: &DelegationCondition, document: &Value) -> bool {
    let field = lookup(document, &condition.field);
    let operand = condition.value.as_ref();

    // Only an explicit absence check is satisfied by a missing field
    let Some(field) = field else {
        return condition.operator == ConditionOperator::Eq && operand.is_none();
    };

    match (condition.operator, operand) {
        (ConditionOperator::Eq, Some(operand)) => same(field, operand),
        (ConditionOperator::Eq, None) => false,
        (ConditionOperator::Ne, Some(operand)) => !same(field, operand),
        (ConditionOperator::Ne, None) => true,
        (ConditionOperator::Gt, Some(operand)) => numbers(field, operand).is_some_and(|(f, o)| f > o),
        (ConditionOperator::Lt, Some(operand)) => numbers(field, operand).is_some_and(|(f, o)| f < o),
        (ConditionOperator::Gte, Some(operand)) => numbers(field, operand).is_some_and(|(f, o)| f >= o),
        (ConditionOperator::Lte, Some(operand)) => numbers(field, operand).is_some_and(|(f, o)| f <= o),
        (ConditionOperator::In, Some(Value::Array(options))) => options.iter().any(|o| same(field, o)),
        (ConditionOperator::Contains, Some(operand)) => match (field, operand) {
            (Value::String(text), Value::String(needle)) => text.contains(needle.as_str()),
            (Value::Array(items), operand) => items.iter().any(|item| same(item, operand)),
            _ => false,
        },
        _ => false,
    }
}

/// Ready-made condition sets.
pub mod templates {
    use super::*;

    /// Delegate only low-priority issues.
    pub fn low_priority_only() -> Vec<DelegationCondition> {
        vec![DelegationCondition::new(
            "decisionPacket.issue.priority",
            ConditionOperator::Eq,
            "low",
        )]
    }

    /// Delegate issues in any of the given categories.
    pub fn category_based<I, S>(categories: I) -> Vec<DelegationCondition>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let categories: Vec<Value> = categories
            .into_iter()
            .map(|c| Value::String(c.into()))
            .collect();
        vec![DelegationCondition::new(
            "decisionPacket.issue.category",
            ConditionOperator::In,
            Value::Array(categories),
        )]
    }

    /// Delegate when every agent agreed with the majority.
    pub fn no_dissent() -> Vec<DelegationCondition> {
        vec![DelegationCondition::new(
            "decisionPacket.dissent",
            ConditionOperator::Eq,
            Value::Array(Vec::new()),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::Synthesizer;
    use agora_core::{DetectedIssue, IssuePriority, ProposalStatus};
    use serde_json::json;

    fn proposal(priority: IssuePriority, category: &str) -> Proposal {
        let issue = DetectedIssue::new("t", "d", category, priority, vec![], vec![]);
        let now = Utc::now();
        Proposal {
            id: uuid::Uuid::new_v4().to_string(),
            onchain_id: None,
            decision_packet: Synthesizer::default().synthesize(&issue, vec![]),
            proposer: "0xproposer".into(),
            status: ProposalStatus::Pending,
            voting_starts_at: now,
            voting_ends_at: now,
            quorum: 1,
            threshold: 50,
            created_at: now,
            executed_at: None,
        }
    }

    #[tokio::test]
    async fn test_priority_condition() {
        let manager = DelegationManager::new();
        manager
            .create_policy("alice", "bob", templates::low_priority_only(), None)
            .await
            .unwrap();

        let high = proposal(IssuePriority::High, "gas_usage");
        assert!(manager.should_auto_delegate("alice", &high).await.unwrap().is_none());

        let low = proposal(IssuePriority::Low, "anything_else");
        let matched = manager.should_auto_delegate("alice", &low).await.unwrap().unwrap();
        assert_eq!(matched.delegate, "bob");

        assert!(manager.should_auto_delegate("carol", &low).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let manager = DelegationManager::new();
        manager
            .create_policy("alice", "generalist", vec![], None)
            .await
            .unwrap();
        manager
            .create_policy("alice", "specialist", templates::category_based(["gas_usage"]), None)
            .await
            .unwrap();

        let p = proposal(IssuePriority::Low, "gas_usage");
        let matched = manager.should_auto_delegate("alice", &p).await.unwrap().unwrap();
        assert_eq!(matched.delegate, "generalist");
    }

    #[tokio::test]
    async fn test_revoked_and_expired_policies_skipped() {
        let manager = DelegationManager::new();
        let revoked = manager.create_policy("alice", "bob", vec![], None).await.unwrap();
        manager
            .create_policy("alice", "carol", vec![], Some(Utc::now() - chrono::Duration::hours(1)))
            .await
            .unwrap();
        manager.create_policy("alice", "dave", vec![], None).await.unwrap();

        let stored = manager.revoke_policy(&revoked.id).await.unwrap();
        assert!(!stored.active);
        assert!(manager.get_policy(&revoked.id).await.unwrap().is_some());

        let p = proposal(IssuePriority::Low, "x");
        let matched = manager.should_auto_delegate("alice", &p).await.unwrap().unwrap();
        assert_eq!(matched.delegate, "dave");

        let active = manager.policies_for_delegator("alice").await.unwrap();
        assert_eq!(active.len(), 2);

        assert!(matches!(
            manager.revoke_policy("missing").await.unwrap_err(),
            OracleError::NotFoundError { .. }
        ));
    }

    #[tokio::test]
    async fn test_validation() {
        let manager = DelegationManager::new();
        assert!(manager.create_policy("alice", "alice", vec![], None).await.is_err());
        assert!(manager.create_policy("", "bob", vec![], None).await.is_err());
        let blank = vec![DelegationCondition::new("", ConditionOperator::Eq, 1)];
        assert!(manager.create_policy("alice", "bob", blank, None).await.is_err());
    }

    #[tokio::test]
    async fn test_rebuild_index_from_store() {
        let store: Arc<dyn KeyedStore<DelegationPolicy>> = Arc::new(MemoryStore::new());
        let first = DelegationManager::with_store(store.clone());
        first.create_policy("alice", "bob", vec![], None).await.unwrap();
        first.create_policy("alice", "carol", vec![], None).await.unwrap();

        let second = DelegationManager::with_store(store);
        assert!(second.policies_for_delegator("alice").await.unwrap().is_empty());
        second.rebuild_index().await.unwrap();
        let policies = second.policies_for_delegator("alice").await.unwrap();
        assert_eq!(policies.len(), 2);
        assert_eq!(policies[0].delegate, "bob");

        let next = second.create_policy("alice", "dave", vec![], None).await.unwrap();
        assert_eq!(next.sequence, 2);
    }

    #[test]
    fn test_operators() {
        let doc = json!({
            "quorum": 3,
            "proposer": "0xproposer",
            "tags": ["fees", "gas"],
            "executedAt": null,
            "nested": {"ratio": 0.5}
        });
        let check = |field: &str, op, value: Value| {
            evaluate(&DelegationCondition::new(field, op, value), &doc)
        };

        assert!(check("quorum", ConditionOperator::Eq, json!(3.0)));
        assert!(check("quorum", ConditionOperator::Ne, json!(4)));
        assert!(check("quorum", ConditionOperator::Gt, json!(2)));
        assert!(check("quorum", ConditionOperator::Lte, json!(3)));
        assert!(!check("quorum", ConditionOperator::Lt, json!("9")));
        assert!(check("nested.ratio", ConditionOperator::Gte, json!(0.5)));
        assert!(check("proposer", ConditionOperator::In, json!(["0xproposer", "0xother"])));
        assert!(check("proposer", ConditionOperator::Contains, json!("prop")));
        assert!(check("tags", ConditionOperator::Contains, json!("gas")));
        assert!(check("tags.1", ConditionOperator::Eq, json!("gas")));

        // Missing and null fields satisfy only an explicit absence check
        assert!(!check("missing", ConditionOperator::Ne, json!(1)));
        assert!(!check("missing", ConditionOperator::Eq, json!(null)));
        assert!(evaluate(&DelegationCondition::absent("missing"), &doc));
        assert!(evaluate(&DelegationCondition::absent("executedAt"), &doc));
        assert!(!evaluate(&DelegationCondition::absent("quorum"), &doc));
    }

    #[test]
    fn test_no_dissent_template() {
        let p = proposal(IssuePriority::Low, "x");
        let doc = serde_json::to_value(&p).unwrap();
        assert!(templates::no_dissent().iter().all(|c| evaluate(c, &doc)));
    }
}
