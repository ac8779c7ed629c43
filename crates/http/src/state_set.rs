use hashbrown::HashMap;
use std::{
    any::{Any, TypeId},
    fmt::{self, Debug, Formatter},
};

/// A typemap for per-request state.
///
/// Middlewares and handlers use this to pass typed values along the
/// pipeline (route captures, resolved identities, markers) without the
/// core knowing about them.
#[derive(Default)]
pub struct StateSet(HashMap<TypeId, Box<dyn Any + Send + Sync>>);

impl StateSet {
    /// construct an empty state set
    pub fn new() -> Self {
        Self::default()
    }

    /// borrow a `T` if one has been stored
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.0.get(&TypeId::of::<T>()).and_then(|v| v.downcast_ref())
    }

    /// mutably borrow a `T` if one has been stored
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.0
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    /// store a `T`, returning the previous one if present
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.0
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|previous| previous.downcast().ok())
            .map(|boxed| *boxed)
    }

    /// remove and return a `T`
    pub fn take<T: 'static>(&mut self) -> Option<T> {
        self.0
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast().ok())
            .map(|boxed| *boxed)
    }

    /// is a `T` present?
    pub fn contains<T: 'static>(&self) -> bool {
        self.0.contains_key(&TypeId::of::<T>())
    }

    /// store a `T` only if absent, then borrow it mutably
    pub fn get_or_insert_with<T: Send + Sync + 'static>(
        &mut self,
        default: impl FnOnce() -> T,
    ) -> &mut T {
        self.0
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(default()))
            .downcast_mut()
            .unwrap_or_else(|| unreachable!("typemap entry for TypeId is always a T"))
    }
}

impl Debug for StateSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StateSet").field(&self.0.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        #[derive(Debug, PartialEq)]
        struct Marker(u8);

        let mut state = StateSet::new();
        assert!(state.get::<Marker>().is_none());
        state.insert(Marker(1));
        assert_eq!(state.get::<Marker>(), Some(&Marker(1)));
        assert_eq!(state.insert(Marker(2)), Some(Marker(1)));
        assert_eq!(state.take::<Marker>(), Some(Marker(2)));
        assert!(!state.contains::<Marker>());
    }
}
