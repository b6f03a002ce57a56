//! services/api/src/adapters/memory_store.rs
//!
//! Process-local activity store used when no database is configured.
//! Records live until the process exits.

use activity_planner_core::{
    ActivityRepository, GeneratedActivity, GenerationRequest, PortError, PortResult, Provider,
    StoredActivity,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryActivityStore {
    activities: RwLock<HashMap<Uuid, StoredActivity>>,
}

impl InMemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityRepository for InMemoryActivityStore {
    async fn create_activity(
        &self,
        provider: Provider,
        request: &GenerationRequest,
        activity: GeneratedActivity,
    ) -> PortResult<StoredActivity> {
        let stored = StoredActivity {
            id: Uuid::new_v4(),
            provider,
            request: request.clone(),
            generated_activity: activity,
            created_at: Utc::now(),
        };
        self.activities
            .write()
            .await
            .insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_activity(&self, id: Uuid) -> PortResult<StoredActivity> {
        self.activities
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Activity {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_planner_core::{Evaluation, ProcedurePhase, SessionType};

    fn request() -> GenerationRequest {
        GenerationRequest {
            patient_age: 30,
            patient_description: "Adult with aphasia".to_string(),
            specific_objective: "Name 10 objects".to_string(),
            duration: 30,
            session_type: SessionType::Individual,
            is_pediatric: false,
            custom_context: None,
            pdf_contents: None,
        }
    }

    fn activity(title: &str) -> GeneratedActivity {
        GeneratedActivity {
            title: title.to_string(),
            smart_objective: "Name 8 of 10 pictures".to_string(),
            description: String::new(),
            materials: vec!["Picture cards".to_string()],
            procedure: vec![ProcedurePhase {
                name: "Naming".to_string(),
                time: 30,
                description: "Picture naming".to_string(),
            }],
            evaluation: Evaluation::default(),
            adaptations: vec![],
            theoretical_foundation: String::new(),
        }
    }

    #[tokio::test]
    async fn created_activity_can_be_read_back() {
        let store = InMemoryActivityStore::new();
        let created = store
            .create_activity(Provider::Gemini, &request(), activity("Naming game"))
            .await
            .unwrap();

        let fetched = store.get_activity(created.id).await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.provider, Provider::Gemini);
        assert_eq!(fetched.request, request());
        assert_eq!(fetched.generated_activity.title, "Naming game");
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let store = InMemoryActivityStore::new();
        let a = store
            .create_activity(Provider::Groq, &request(), activity("A"))
            .await
            .unwrap();
        let b = store
            .create_activity(Provider::Groq, &request(), activity("B"))
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.get_activity(b.id).await.unwrap().generated_activity.title, "B");
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = InMemoryActivityStore::new();
        let err = store.get_activity(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }
}
