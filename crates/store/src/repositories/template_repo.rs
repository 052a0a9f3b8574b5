//! Repository for workflow templates.

use chrono::Utc;

use homelab_core::error::{CoreError, CoreResult};
use homelab_core::template::{sorted_by_order, validate_steps, validate_template_name};
use homelab_core::types::DbId;

use crate::models::template::{CreateTemplate, UpdateTemplate, WorkflowTemplate};
use crate::{clamp_limit, clamp_offset, Store};

/// Provides CRUD operations for workflow templates.
///
/// All writes validate first, so the store never holds a template with an
/// invalid step graph.
pub struct TemplateRepo;

impl TemplateRepo {
    /// Validate and insert a new template, returning the created record.
    pub async fn create(store: &Store, input: CreateTemplate) -> CoreResult<WorkflowTemplate> {
        validate_template_name(&input.name)?;
        validate_steps(&input.steps)?;

        let now = Utc::now();
        let template = WorkflowTemplate {
            id: store.next_template_id(),
            name: input.name.trim().to_string(),
            description: input.description,
            steps: sorted_by_order(input.steps),
            created_at: now,
            updated_at: now,
        };

        let mut templates = store.templates().write().await;
        templates.insert(template.id, template.clone());
        Ok(template)
    }

    /// Find a template by its primary key.
    pub async fn find_by_id(store: &Store, id: DbId) -> Option<WorkflowTemplate> {
        store.templates().read().await.get(&id).cloned()
    }

    /// List templates ordered by id ascending (insertion order).
    pub async fn list(
        store: &Store,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Vec<WorkflowTemplate> {
        let limit = clamp_limit(limit) as usize;
        let offset = clamp_offset(offset) as usize;
        store
            .templates()
            .read()
            .await
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Validate and replace a template's content, returning the updated
    /// record. The step list is replaced wholesale.
    pub async fn update(
        store: &Store,
        id: DbId,
        input: UpdateTemplate,
    ) -> CoreResult<WorkflowTemplate> {
        validate_template_name(&input.name)?;
        validate_steps(&input.steps)?;

        let mut templates = store.templates().write().await;
        let template = templates.get_mut(&id).ok_or(CoreError::NotFound {
            entity: "Template",
            id,
        })?;

        template.name = input.name.trim().to_string();
        template.description = input.description;
        template.steps = sorted_by_order(input.steps);
        template.updated_at = Utc::now();
        Ok(template.clone())
    }

    /// Delete a template by id. Returns `true` if a record was deleted.
    ///
    /// The caller is responsible for the referenced-by-active-instances
    /// check; instances keep their own step snapshot, so historical
    /// references survive deletion.
    pub async fn delete(store: &Store, id: DbId) -> bool {
        store.templates().write().await.remove(&id).is_some()
    }

    /// Count stored templates.
    pub async fn count(store: &Store) -> i64 {
        store.templates().read().await.len() as i64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use homelab_core::template::{WorkflowStep, DEFAULT_EXECUTOR_TYPE};

    fn step(order: u32, action: &str) -> WorkflowStep {
        WorkflowStep {
            order,
            action_name: action.to_string(),
            executor_type: DEFAULT_EXECUTOR_TYPE.to_string(),
            depends_on: vec![],
            rollback_action: None,
            extra_vars: None,
        }
    }

    fn create_input(name: &str) -> CreateTemplate {
        CreateTemplate {
            name: name.to_string(),
            description: None,
            steps: vec![step(0, "install")],
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_timestamps() {
        let store = Store::new();
        let template = TemplateRepo::create(&store, create_input("deploy"))
            .await
            .expect("create");
        assert_eq!(template.id, 1);
        assert_eq!(template.name, "deploy");
        assert_eq!(template.created_at, template.updated_at);
    }

    #[tokio::test]
    async fn create_rejects_invalid_step_graph() {
        let store = Store::new();
        let mut input = create_input("deploy");
        input.steps[0].depends_on = vec![0];
        let err = TemplateRepo::create(&store, input).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(TemplateRepo::count(&store).await, 0);
    }

    #[tokio::test]
    async fn create_sorts_steps_by_order() {
        let store = Store::new();
        let input = CreateTemplate {
            name: "deploy".to_string(),
            description: None,
            steps: vec![step(2, "restart"), step(0, "install"), step(1, "configure")],
        };
        let template = TemplateRepo::create(&store, input).await.expect("create");
        let orders: Vec<u32> = template.steps.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn update_replaces_steps_wholesale() {
        let store = Store::new();
        let template = TemplateRepo::create(&store, create_input("deploy"))
            .await
            .expect("create");

        let updated = TemplateRepo::update(
            &store,
            template.id,
            UpdateTemplate {
                name: "deploy-v2".to_string(),
                description: Some("new".to_string()),
                steps: vec![step(0, "install"), step(1, "configure")],
            },
        )
        .await
        .expect("update");

        assert_eq!(updated.name, "deploy-v2");
        assert_eq!(updated.steps.len(), 2);
        assert!(updated.updated_at >= updated.created_at);
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let store = Store::new();
        let err = TemplateRepo::update(
            &store,
            42,
            UpdateTemplate {
                name: "x".to_string(),
                description: None,
                steps: vec![step(0, "install")],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_is_insertion_ordered_and_paginated() {
        let store = Store::new();
        for i in 0..5 {
            TemplateRepo::create(&store, create_input(&format!("t-{i}")))
                .await
                .expect("create");
        }

        let page = TemplateRepo::list(&store, Some(2), Some(2)).await;
        let names: Vec<&str> = page.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["t-2", "t-3"]);
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let store = Store::new();
        let template = TemplateRepo::create(&store, create_input("deploy"))
            .await
            .expect("create");
        assert!(TemplateRepo::delete(&store, template.id).await);
        assert!(!TemplateRepo::delete(&store, template.id).await);
        assert!(TemplateRepo::find_by_id(&store, template.id).await.is_none());
    }
}
