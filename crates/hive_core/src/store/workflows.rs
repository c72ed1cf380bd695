//! Collaborative workflow progression.

use chrono::Utc;
use tracing::{debug, info};

use super::HiveStore;
use crate::error::{HiveError, HiveResult};
use crate::types::{CollaborativeWorkflow, StepStatus, WorkflowId, WorkflowStatus};

impl HiveStore {
    /// Start a workflow for a session with one pending step per agent.
    ///
    /// A workflow already attached to the session is replaced.
    pub fn start_workflow<I, S>(
        &mut self,
        session_id: &str,
        name: impl Into<String>,
        agents: I,
    ) -> HiveResult<WorkflowId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.sessions.contains(session_id) {
            return Err(HiveError::SessionNotFound(session_id.to_string()));
        }
        let workflow = CollaborativeWorkflow::new(name, agents);
        let first_agent = workflow
            .first_agent()
            .map(str::to_string)
            .ok_or(HiveError::EmptyWorkflow)?;
        let workflow_id = workflow.id.clone();

        let previous = self
            .sessions
            .update_one(session_id, |s| {
                s.active_agent = Some(first_agent.clone());
                s.updated_at = Utc::now();
                s.workflow_id.replace(workflow_id.clone())
            })
            .flatten();
        if let Some(previous) = previous {
            self.workflows.remove_one(&previous);
        }

        info!(
            session = %session_id,
            workflow = %workflow_id,
            steps = workflow.steps.len(),
            "Started workflow"
        );
        self.workflows.add_one(workflow);
        Ok(workflow_id)
    }

    /// Move one step to `status` and return the recomputed workflow status.
    ///
    /// Completing a step hands the session over to the next step's agent.
    pub fn update_workflow_step(
        &mut self,
        workflow_id: &str,
        index: usize,
        status: StepStatus,
        output: Option<String>,
    ) -> HiveResult<WorkflowStatus> {
        let (aggregate, next_agent) = {
            let workflow = self
                .workflows
                .get(workflow_id)
                .ok_or_else(|| HiveError::WorkflowNotFound(workflow_id.to_string()))?;
            if index >= workflow.steps.len() {
                return Err(HiveError::StepOutOfRange {
                    workflow: workflow_id.to_string(),
                    index,
                    len: workflow.steps.len(),
                });
            }
            let next = match status {
                StepStatus::Completed => workflow.agent_after(index).map(str::to_string),
                _ => None,
            };
            let mut updated = workflow.clone();
            let step = &mut updated.steps[index];
            step.status = status;
            if output.is_some() {
                step.output = output;
            }
            updated.recompute_status();
            updated.updated_at = Utc::now();
            let aggregate = updated.status;
            self.workflows.upsert_one(updated);
            (aggregate, next)
        };

        if let Some(agent) = next_agent {
            let owners: Vec<String> = self
                .sessions
                .iter()
                .filter(|s| s.workflow_id.as_deref() == Some(workflow_id))
                .map(|s| s.id.clone())
                .collect();
            for id in owners {
                self.sessions
                    .update_one(&id, |s| s.active_agent = Some(agent.clone()));
            }
            debug!(workflow = %workflow_id, next = %agent, "Advanced workflow to next agent");
        }

        Ok(aggregate)
    }

    /// Detach and drop the session's workflow.
    pub fn cancel_workflow(&mut self, session_id: &str) -> HiveResult<Option<CollaborativeWorkflow>> {
        let detached = self
            .sessions
            .update_one(session_id, |s| s.workflow_id.take())
            .ok_or_else(|| HiveError::SessionNotFound(session_id.to_string()))?;
        let removed = detached.and_then(|id| self.workflows.remove_one(&id));
        if let Some(workflow) = &removed {
            info!(session = %session_id, workflow = %workflow.id, "Cancelled workflow");
        }
        Ok(removed)
    }

    pub fn workflow_for_session(&self, session_id: &str) -> Option<&CollaborativeWorkflow> {
        self.sessions
            .get(session_id)?
            .workflow_id
            .as_deref()
            .and_then(|id| self.workflows.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_hands_off_between_agents() {
        let mut store = HiveStore::new();
        let session = store.create_local_session(None);
        let wf = store.start_workflow(&session, "Contract review", ["A", "B"]).unwrap();

        let workflow = store.workflow(&wf).unwrap();
        assert_eq!(workflow.steps.len(), 2);
        assert!(workflow.steps.iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(store.session(&session).unwrap().active_agent.as_deref(), Some("A"));

        let status = store
            .update_workflow_step(&wf, 0, StepStatus::Completed, Some("clauses extracted".into()))
            .unwrap();
        assert_eq!(store.session(&session).unwrap().active_agent.as_deref(), Some("B"));
        assert_eq!(status, WorkflowStatus::Pending);
        assert_eq!(
            store.workflow(&wf).unwrap().steps[0].output.as_deref(),
            Some("clauses extracted")
        );

        let status = store
            .update_workflow_step(&wf, 1, StepStatus::Completed, None)
            .unwrap();
        assert_eq!(status, WorkflowStatus::Completed);
        assert_eq!(store.workflow(&wf).unwrap().status, WorkflowStatus::Completed);
    }

    #[test]
    fn test_step_error_marks_workflow_error() {
        let mut store = HiveStore::new();
        let session = store.create_local_session(None);
        let wf = store.start_workflow(&session, "Triage", ["A", "B"]).unwrap();

        let status = store
            .update_workflow_step(&wf, 0, StepStatus::Processing, None)
            .unwrap();
        assert_eq!(status, WorkflowStatus::Processing);

        let status = store.update_workflow_step(&wf, 0, StepStatus::Error, None).unwrap();
        assert_eq!(status, WorkflowStatus::Error);
        assert_eq!(store.session(&session).unwrap().active_agent.as_deref(), Some("A"));
    }

    #[test]
    fn test_invalid_workflow_requests() {
        let mut store = HiveStore::new();
        let session = store.create_local_session(None);
        assert!(matches!(
            store.start_workflow(&session, "empty", Vec::<String>::new()),
            Err(HiveError::EmptyWorkflow)
        ));
        assert!(store.start_workflow("missing", "x", ["A"]).is_err());

        let wf = store.start_workflow(&session, "one", ["A"]).unwrap();
        assert!(matches!(
            store.update_workflow_step(&wf, 3, StepStatus::Completed, None),
            Err(HiveError::StepOutOfRange { index: 3, len: 1, .. })
        ));
        assert!(store
            .update_workflow_step("missing", 0, StepStatus::Completed, None)
            .is_err());
    }

    #[test]
    fn test_cancel_and_replace_workflow() {
        let mut store = HiveStore::new();
        let session = store.create_local_session(None);
        let first = store.start_workflow(&session, "first", ["A"]).unwrap();
        let second = store.start_workflow(&session, "second", ["B"]).unwrap();
        assert!(store.workflow(&first).is_none());
        assert_eq!(store.workflow_for_session(&session).unwrap().id, second);

        let cancelled = store.cancel_workflow(&session).unwrap();
        assert_eq!(cancelled.unwrap().id, second);
        assert!(store.workflow_for_session(&session).is_none());
        assert!(store.cancel_workflow(&session).unwrap().is_none());
    }
}
