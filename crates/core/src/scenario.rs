//! Scenario store.
//!
//! The orchestrator's view of scenario persistence: create, read, update,
//! delete and step mutation keyed by scenario id and step index. The
//! in-memory store is the only implementation here; durable storage plugs
//! in behind the same trait.

use async_trait::async_trait;
use mk_protocol::scenario_models::{Scenario, ScenarioError, Step};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Scenario {0} not found")]
    NotFound(Uuid),

    #[error("Scenario {0} already exists")]
    AlreadyExists(Uuid),

    #[error(transparent)]
    Step(#[from] ScenarioError),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ScenarioStore: Send + Sync {
    /// Create an empty scenario.
    async fn create(&self, name: &str) -> Scenario;

    /// Add an existing scenario, keeping its id.
    async fn import(&self, scenario: Scenario) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Scenario>;

    /// All scenarios, most recently used first.
    async fn list(&self) -> Vec<Scenario>;

    /// Replace a stored scenario wholesale.
    async fn update(&self, scenario: Scenario) -> StoreResult<()>;

    async fn delete(&self, id: Uuid) -> StoreResult<Scenario>;

    async fn insert_step(&self, id: Uuid, index: usize, step: Step) -> StoreResult<()>;

    async fn remove_step(&self, id: Uuid, index: usize) -> StoreResult<Step>;

    async fn swap_steps(&self, id: Uuid, a: usize, b: usize) -> StoreResult<()>;

    /// Append steps in order and return the updated scenario.
    async fn append_steps(&self, id: Uuid, steps: Vec<Step>) -> StoreResult<Scenario>;

    /// Record that the scenario was just played.
    async fn touch(&self, id: Uuid) -> StoreResult<()>;
}

/// Scenarios held in memory for the lifetime of the process.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    scenarios: Arc<Mutex<HashMap<Uuid, Scenario>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-filled with `scenarios`. Later duplicates replace earlier ones.
    pub fn with_scenarios(scenarios: impl IntoIterator<Item = Scenario>) -> Self {
        let map = scenarios.into_iter().map(|s| (s.id, s)).collect();
        Self {
            scenarios: Arc::new(Mutex::new(map)),
        }
    }

    async fn with_mut<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Scenario) -> StoreResult<T> + Send,
    ) -> StoreResult<T> {
        let mut scenarios = self.scenarios.lock().await;
        let scenario = scenarios.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        f(scenario)
    }
}

#[async_trait]
impl ScenarioStore for InMemoryStore {
    async fn create(&self, name: &str) -> Scenario {
        let scenario = Scenario::new(name);
        self.scenarios
            .lock()
            .await
            .insert(scenario.id, scenario.clone());
        scenario
    }

    async fn import(&self, scenario: Scenario) -> StoreResult<()> {
        let mut scenarios = self.scenarios.lock().await;
        if scenarios.contains_key(&scenario.id) {
            return Err(StoreError::AlreadyExists(scenario.id));
        }
        scenarios.insert(scenario.id, scenario);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Scenario> {
        self.scenarios
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self) -> Vec<Scenario> {
        let mut all: Vec<_> = self.scenarios.lock().await.values().cloned().collect();
        all.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at).then(a.name.cmp(&b.name)));
        all
    }

    async fn update(&self, scenario: Scenario) -> StoreResult<()> {
        self.with_mut(scenario.id, move |stored| {
            *stored = scenario;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<Scenario> {
        self.scenarios
            .lock()
            .await
            .remove(&id)
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert_step(&self, id: Uuid, index: usize, step: Step) -> StoreResult<()> {
        self.with_mut(id, move |s| Ok(s.insert_step(index, step)?))
            .await
    }

    async fn remove_step(&self, id: Uuid, index: usize) -> StoreResult<Step> {
        self.with_mut(id, |s| Ok(s.remove_step(index)?)).await
    }

    async fn swap_steps(&self, id: Uuid, a: usize, b: usize) -> StoreResult<()> {
        self.with_mut(id, |s| Ok(s.swap_steps(a, b)?)).await
    }

    async fn append_steps(&self, id: Uuid, steps: Vec<Step>) -> StoreResult<Scenario> {
        self.with_mut(id, move |s| {
            s.steps.extend(steps);
            Ok(s.clone())
        })
        .await
    }

    async fn touch(&self, id: Uuid) -> StoreResult<()> {
        self.with_mut(id, |s| {
            s.touch();
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mk_protocol::geometry::Point;
    use mk_protocol::scenario_models::MouseButton;
    use std::collections::BTreeSet;

    fn click(x: i32) -> Step {
        Step::Click {
            position: Point::new(x, 0),
            button: MouseButton::Left,
        }
    }

    #[tokio::test]
    async fn test_step_mutations_through_store() {
        let store = InMemoryStore::new();
        let scenario = store.create("edit").await;
        store
            .append_steps(scenario.id, vec![click(1), click(2)])
            .await
            .unwrap();

        let keypress = Step::Keypress {
            key: "enter".to_string(),
            modifiers: BTreeSet::new(),
        };
        store
            .insert_step(scenario.id, 0, keypress.clone())
            .await
            .unwrap();
        assert_eq!(
            store.get(scenario.id).await.unwrap().steps,
            vec![keypress.clone(), click(1), click(2)]
        );

        store.swap_steps(scenario.id, 0, 2).await.unwrap();
        assert_eq!(
            store.get(scenario.id).await.unwrap().steps,
            vec![click(2), click(1), keypress]
        );

        assert_eq!(store.remove_step(scenario.id, 1).await.unwrap(), click(1));
        assert_eq!(
            store.swap_steps(scenario.id, 0, 5).await,
            Err(StoreError::Step(ScenarioError::IndexOutOfRange { index: 5, len: 2 }))
        );
    }

    #[tokio::test]
    async fn test_missing_scenario() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.get(id).await, Err(StoreError::NotFound(id)));
        assert_eq!(store.touch(id).await, Err(StoreError::NotFound(id)));
    }

    #[tokio::test]
    async fn test_import_keeps_id_and_rejects_duplicates() {
        let store = InMemoryStore::new();
        let scenario = Scenario::new("imported");
        store.import(scenario.clone()).await.unwrap();
        assert_eq!(store.get(scenario.id).await.unwrap(), scenario);
        assert_eq!(
            store.import(scenario.clone()).await,
            Err(StoreError::AlreadyExists(scenario.id))
        );
    }

    #[tokio::test]
    async fn test_delete_and_touch() {
        let store = InMemoryStore::new();
        let scenario = store.create("old").await;
        let before = scenario.last_used_at;

        store.touch(scenario.id).await.unwrap();
        assert!(store.get(scenario.id).await.unwrap().last_used_at >= before);

        store.delete(scenario.id).await.unwrap();
        assert!(store.list().await.is_empty());
    }
}
