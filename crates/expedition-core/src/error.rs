//! Error types for task selection and mission dispatch.

use crate::mission::MissionId;
use crate::tasks::TaskKind;
use hecs::Entity;

/// Errors raised while selecting or constructing a task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskError {
    /// Every candidate task kind scored zero for this actor
    NoEligibleTask { actor: Entity },
    /// A task factory could not build its task
    Construction { kind: TaskKind, reason: String },
    /// An entity lacks a component the task needs
    MissingComponent {
        entity: Entity,
        component: &'static str,
    },
}

impl TaskError {
    pub fn construction(kind: TaskKind, reason: impl Into<String>) -> Self {
        TaskError::Construction {
            kind,
            reason: reason.into(),
        }
    }

    pub fn missing<T>(entity: Entity) -> Self {
        TaskError::MissingComponent {
            entity,
            component: short_type_name::<T>(),
        }
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskError::NoEligibleTask { actor } => {
                write!(f, "No eligible task for actor {:?}", actor)
            }
            TaskError::Construction { kind, reason } => {
                write!(f, "Could not construct {} task: {}", kind.name(), reason)
            }
            TaskError::MissingComponent { entity, component } => {
                write!(f, "Entity {:?} has no {} component", entity, component)
            }
        }
    }
}

impl std::error::Error for TaskError {}

/// Errors raised while running a mission for an actor
#[derive(Debug, Clone, PartialEq)]
pub enum MissionError {
    /// The actor is not on the mission's roster
    NotMember { mission: MissionId, actor: Entity },
    UnknownMission(MissionId),
    Task(TaskError),
}

impl From<TaskError> for MissionError {
    fn from(e: TaskError) -> Self {
        MissionError::Task(e)
    }
}

impl std::fmt::Display for MissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissionError::NotMember { mission, actor } => {
                write!(f, "Actor {:?} is not on mission {}", actor, mission)
            }
            MissionError::UnknownMission(id) => write!(f, "Unknown mission {}", id),
            MissionError::Task(e) => write!(f, "Task error: {}", e),
        }
    }
}

impl std::error::Error for MissionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MissionError::Task(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Vehicle;

    #[test]
    fn test_missing_component_names_type() {
        let mut world = hecs::World::new();
        let e = world.spawn(());
        let err = TaskError::missing::<Vehicle>(e);
        assert_eq!(
            err,
            TaskError::MissingComponent {
                entity: e,
                component: "Vehicle"
            }
        );
        assert!(err.to_string().contains("Vehicle"));
    }

    #[test]
    fn test_mission_error_wraps_task_error() {
        let err: MissionError = TaskError::construction(TaskKind::Relax, "no room").into();
        assert!(matches!(err, MissionError::Task(TaskError::Construction { .. })));
        assert!(err.to_string().contains("no room"));
    }
}
