use crate::any::ServiceId;

#[derive(thiserror::Error, Debug)]
pub enum RegisterErrorKind {
    #[error("Type {type_info} must expose exactly one constructor to be built by the container, found {count}")]
    MultipleOrNoPublicConstructors { type_info: ServiceId, count: usize },
    #[error("Service {0} already registered. Pass an override policy to replace or keep the existing registration")]
    DuplicateRegistration(ServiceId),
    #[error("Container already disposed")]
    AlreadyDisposed,
}
