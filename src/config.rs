/// Config for a container
/// ## Fields
/// - `compile_activators`:
///   If `true`, resolution goes through memoized activation procedures
///   with the dependency procedures already wired in.
///   If `false`, every resolution walks the dependency graph again.
///
///   This does **not** affect lifecycles: singletons are built once either way.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub compile_activators: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { compile_activators: true }
    }
}
