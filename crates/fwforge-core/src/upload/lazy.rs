use std::cell::OnceCell;

/// A value computed at most once, immediately before its first consumer
/// needs it.
#[derive(Debug)]
pub struct LazyValue<T> {
    cell: OnceCell<T>,
}

impl<T> LazyValue<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Already-known value; the resolver will never run.
    pub fn ready(value: T) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(value);
        Self { cell }
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get_or_try_resolve<E, F>(&self, resolve: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let value = resolve()?;
        Ok(self.cell.get_or_init(|| value))
    }
}

impl<T> Default for LazyValue<T> {
    fn default() -> Self {
        Self::new()
    }
}
