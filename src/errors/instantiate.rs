use crate::any::ServiceId;

#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error("Type {type_info} must expose exactly one constructor to be built by the container, found {count}")]
    MultipleOrNoPublicConstructors { type_info: ServiceId, count: usize },
    #[error("Constructor of {type_info} expects {expected} arguments, got {actual}")]
    ArgumentCount {
        type_info: ServiceId,
        expected: usize,
        actual: usize,
    },
    #[error("Constructor argument {position} of {type_info} expects {expected}, got {actual}")]
    IncorrectArgument {
        type_info: ServiceId,
        position: usize,
        expected: ServiceId,
        actual: ServiceId,
    },
    #[error("Type {type_info} has no injectable property `{slot}`")]
    UnknownProperty { type_info: ServiceId, slot: &'static str },
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
