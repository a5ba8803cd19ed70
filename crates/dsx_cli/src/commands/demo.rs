//! Demo command implementations.
//!
//! Both demos run against an in-process emulator, through a client that
//! carries the recording interceptor.

use dsx_core::{
    proto_to_key, set_base_version, with_recorder, ClientConfig, CoreError, DatastoreClient,
    Entity, ExtensionClient, Key, Mutation, RecordingInterceptor, RequestScope,
};
use dsx_emulator::{Emulator, EmulatorConfig};
use dsx_protocol::MutationResult;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors specific to the demos.
#[derive(Debug, Error)]
pub enum DemoError {
    /// An entity the demo just wrote could not be read back.
    #[error("entity {0} not found")]
    NotFound(Key),

    /// A task without a group reference.
    #[error("task {0} has no group")]
    MissingGroup(Key),

    /// The store returned no mutation result.
    #[error("commit returned no results")]
    NoResult,
}

/// Native and extension client over a fresh emulator.
struct DemoEnv {
    emulator: Arc<Emulator>,
    client: DatastoreClient,
    extension: ExtensionClient,
}

impl DemoEnv {
    fn new() -> Result<Self, CoreError> {
        let config = ClientConfig::from_env().unwrap_or_else(|| ClientConfig::new("demo"));
        let emulator = Arc::new(Emulator::new(
            EmulatorConfig::default().with_project(config.project_id.clone()),
        ));
        let client = DatastoreClient::builder(config)
            .with_service(Arc::clone(&emulator))
            .with_interceptor(RecordingInterceptor::new())
            .build()?;
        let extension = ExtensionClient::from_client(&client)?;
        Ok(Self {
            emulator,
            client,
            extension,
        })
    }

    fn get(&self, scope: &RequestScope, key: &Key) -> Result<Entity, Box<dyn std::error::Error>> {
        self.client
            .get(scope, key)?
            .ok_or_else(|| DemoError::NotFound(key.clone()).into())
    }
}

/// Outcome of the parent-child demo.
#[derive(Debug, Serialize)]
pub struct ParentChildResult {
    /// Group key.
    pub group: String,
    /// Task key.
    pub task: String,
    /// Group version the lock expected.
    pub locked_version: i64,
    /// Whether the commit applied.
    pub committed: bool,
    /// Conflict flag of each mutation, locks first.
    pub conflicts: Vec<bool>,
    /// Task name after the commit.
    pub task_name: String,
}

/// Runs the parent-child demo.
///
/// Creates a group and a task, reads both with a recorder, optionally
/// renames the group behind the recorder's back, then renames the task
/// while locking the group.
pub fn parent_child(conflict: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let env = DemoEnv::new()?;
    let plain = RequestScope::new();

    let group_key = env.client.put(
        &plain,
        Entity::new(Key::incomplete_key("TaskGroup", None)).with("name", "docs"),
    )?;
    info!(group = %group_key, "group created");
    let task_key = env.client.put(
        &plain,
        Entity::new(Key::incomplete_key("Task", None))
            .with("name", "write docs")
            .with("group", env.client.key_to_proto(&group_key)),
    )?;
    info!(task = %task_key, "task created");

    let (scope, recorder) = with_recorder(&plain);
    let task = env.get(&scope, &task_key)?;
    let group_ref = task
        .key_property("group")?
        .ok_or_else(|| DemoError::MissingGroup(task_key.clone()))?;
    let group = env.get(&scope, &group_ref)?;
    let locked_version = recorder
        .get(&group_ref)
        .map(|o| o.version)
        .unwrap_or_default();

    if conflict {
        env.client
            .put(&plain, group.with("name", "renamed elsewhere"))?;
        info!(group = %group_ref, "group modified after read");
    }

    let update = Mutation::update(task.with("name", "review docs"));
    let outcome = env
        .extension
        .mutate_with_locks(&scope, vec![update], std::slice::from_ref(&group_ref));
    let (committed, results) = match outcome {
        Ok(response) => (true, response.mutation_results),
        Err(CoreError::Conflict { response }) => (false, response.mutation_results),
        Err(e) => return Err(e.into()),
    };

    let task_name = env
        .get(&plain, &task_key)?
        .text("name")
        .unwrap_or_default()
        .to_string();
    let result = ParentChildResult {
        group: group_ref.to_string(),
        task: task_key.to_string(),
        locked_version,
        committed,
        conflicts: results.iter().map(|r| r.conflict_detected).collect(),
        task_name,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_parent_child(&result, env.emulator.current_version()),
    }
    Ok(())
}

fn print_parent_child(result: &ParentChildResult, store_version: i64) {
    println!("Group: {}", result.group);
    println!("Task:  {}", result.task);
    println!("Lock expected group version {}", result.locked_version);
    if result.committed {
        println!("Committed: task renamed to {:?}", result.task_name);
    } else {
        println!("Conflict: group changed after it was read; nothing applied");
        println!("Task name is still {:?}", result.task_name);
    }
    for (i, conflict) in result.conflicts.iter().enumerate() {
        let role = if i == 0 { "lock" } else { "update" };
        println!("  {:<6} conflict={}", role, conflict);
    }
    println!("Store version: {}", store_version);
}

/// A task as seen by an external caller, with its version metadata.
#[derive(Debug, Serialize)]
pub struct TaskView {
    /// Encoded key.
    pub key: String,
    /// Task name.
    pub name: String,
    /// Entity version.
    pub version: i64,
    /// Creation time in microseconds.
    pub create_time: Option<i64>,
    /// Last update time in microseconds.
    pub update_time: Option<i64>,
}

/// Result of a conditional update or delete.
#[derive(Debug, Serialize)]
pub struct UpdateView {
    /// Base version sent with the mutation.
    pub base_version: i64,
    /// Whether the mutation applied.
    pub committed: bool,
    /// Version after the mutation, or the current version on conflict.
    pub version: i64,
}

/// Outcome of the external-version demo.
#[derive(Debug, Serialize)]
pub struct ExternalVersionResult {
    /// Task as created.
    pub created: TaskView,
    /// Task as read back through its encoded key.
    pub read: TaskView,
    /// Conditional update.
    pub update: UpdateView,
    /// Conditional delete.
    pub delete: UpdateView,
    /// Whether the task still exists.
    pub exists: bool,
}

fn first_result(results: &[MutationResult]) -> Result<&MutationResult, DemoError> {
    results.first().ok_or(DemoError::NoResult)
}

/// Commits one mutation carrying `base_version` and reports the outcome.
fn conditional(
    env: &DemoEnv,
    scope: &RequestScope,
    mut mutation: Mutation,
    base_version: i64,
) -> Result<UpdateView, Box<dyn std::error::Error>> {
    set_base_version(&mut mutation, base_version);
    let (committed, response) = match env.extension.mutate(scope, vec![mutation]) {
        Ok(response) => (true, response),
        Err(CoreError::Conflict { response }) => (false, *response),
        Err(e) => return Err(e.into()),
    };
    Ok(UpdateView {
        base_version,
        committed,
        version: first_result(&response.mutation_results)?.version,
    })
}

/// Runs the external-version demo.
///
/// Creates a task and hands its encoded key to an external caller. The caller
/// decodes the key, reads the task exposing its version and timestamps from
/// the recorder, then updates and deletes it with the version it last saw
/// (or an older one) as the base version. Prints JSON.
pub fn external_version(stale: bool) -> Result<(), Box<dyn std::error::Error>> {
    let result = external_version_flow(stale)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn external_version_flow(stale: bool) -> Result<ExternalVersionResult, Box<dyn std::error::Error>> {
    let env = DemoEnv::new()?;
    let (scope, recorder) = with_recorder(&RequestScope::new());

    let insert = Mutation::insert(Entity::new(Key::incomplete_key("Task", None)).with("name", "draft"));
    let response = env.extension.mutate(&scope, vec![insert])?;
    let inserted = first_result(&response.mutation_results)?;
    let created_key = match &inserted.key {
        Some(key) => proto_to_key(key)?,
        None => return Err(DemoError::NoResult.into()),
    };
    let created = TaskView {
        key: created_key.encode(),
        name: "draft".to_string(),
        version: inserted.version,
        create_time: inserted.create_time,
        update_time: inserted.update_time,
    };

    let key = Key::decode(&created.key)?;
    let task = env.get(&scope, &key)?;
    let observed = recorder
        .get(&key)
        .ok_or_else(|| DemoError::NotFound(key.clone()))?;
    let read = TaskView {
        key: key.encode(),
        name: task.text("name").unwrap_or_default().to_string(),
        version: observed.version,
        create_time: observed.create_time,
        update_time: observed.update_time,
    };

    let base_version = if stale {
        observed.version - 1
    } else {
        observed.version
    };
    let update = conditional(&env, &scope, Mutation::update(task.with("name", "final")), base_version)?;
    let delete_base = if update.committed {
        update.version
    } else {
        base_version
    };
    let delete = conditional(&env, &scope, Mutation::delete(key.clone()), delete_base)?;
    let exists = env.client.get(&RequestScope::new(), &key)?.is_some();

    Ok(ExternalVersionResult {
        created,
        read,
        update,
        delete,
        exists,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_child_runs() {
        assert!(parent_child(false, "json").is_ok());
        assert!(parent_child(true, "text").is_ok());
    }

    #[test]
    fn external_version_runs() {
        assert!(external_version(false).is_ok());
    }

    #[test]
    fn current_version_updates_and_deletes() {
        let result = external_version_flow(false).unwrap();
        assert_eq!(result.read.key, result.created.key);
        assert_eq!(result.read.version, result.created.version);
        assert!(result.update.committed);
        assert!(result.update.version > result.read.version);
        assert_eq!(result.delete.base_version, result.update.version);
        assert!(result.delete.committed);
        assert!(!result.exists);
    }

    #[test]
    fn stale_version_changes_nothing() {
        let result = external_version_flow(true).unwrap();
        assert!(!result.update.committed);
        assert_eq!(result.update.version, result.read.version);
        assert!(!result.delete.committed);
        assert!(result.exists);
    }

    #[test]
    fn demo_env_is_empty() {
        let env = DemoEnv::new().unwrap();
        assert_eq!(env.emulator.entity_count(), 0);
    }
}
