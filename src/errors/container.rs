#[derive(thiserror::Error, Debug)]
pub enum ScopeErrorKind {
    #[error("Child container can't be created from a disposed container")]
    AlreadyDisposed,
}

#[derive(thiserror::Error, Debug)]
pub enum DisposeErrorKind {
    #[error("Container already disposed")]
    AlreadyDisposed,
}
