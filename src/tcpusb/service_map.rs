use crate::error::{AdbError, Result};
use std::collections::HashMap;

/// Something the map can shut down when the whole connection ends.
pub trait Closeable {
    fn end(&self);
}

/// Open services of one bridged connection, keyed by local id.
#[derive(Debug)]
pub struct ServiceMap<S> {
    services: HashMap<u32, S>,
}

impl<S: Closeable> ServiceMap<S> {
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    pub fn insert(&mut self, id: u32, service: S) -> Result<()> {
        if self.services.contains_key(&id) {
            return Err(AdbError::DuplicateService(id));
        }
        self.services.insert(id, service);
        Ok(())
    }

    pub fn get(&self, id: u32) -> Option<&S> {
        self.services.get(&id)
    }

    pub fn remove(&mut self, id: u32) -> Option<S> {
        self.services.remove(&id)
    }

    pub fn count(&self) -> usize {
        self.services.len()
    }

    /// End and forget every service.
    pub fn end(&mut self) {
        for (_, service) in self.services.drain() {
            service.end();
        }
    }
}

impl<S: Closeable> Default for ServiceMap<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counted(Rc<Cell<u32>>);

    impl Closeable for Counted {
        fn end(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let ended = Rc::new(Cell::new(0));
        let mut map = ServiceMap::new();
        map.insert(1, Counted(ended.clone())).unwrap();
        let err = map.insert(1, Counted(ended.clone())).unwrap_err();
        assert_eq!(err.to_string(), "Remote ID 1 is already being used");
        assert_eq!(map.count(), 1);
    }

    #[test]
    fn test_remove_and_get() {
        let ended = Rc::new(Cell::new(0));
        let mut map = ServiceMap::new();
        map.insert(7, Counted(ended.clone())).unwrap();
        assert!(map.get(7).is_some());
        assert!(map.remove(7).is_some());
        assert!(map.remove(7).is_none());
        assert!(map.get(7).is_none());
        assert_eq!(map.count(), 0);
    }

    #[test]
    fn test_end_ends_all() {
        let ended = Rc::new(Cell::new(0));
        let mut map = ServiceMap::new();
        map.insert(1, Counted(ended.clone())).unwrap();
        map.insert(2, Counted(ended.clone())).unwrap();
        map.end();
        assert_eq!(ended.get(), 2);
        assert_eq!(map.count(), 0);
    }
}
