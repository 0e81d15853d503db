//! Ownership-tagged handles to native objects.
//!
//! A [`Handle`] always observes its target through a `Weak` reference and may
//! additionally hold an owning `Arc`. Weak handles observe objects owned elsewhere
//! (an entity owned by the field) and report [`DomainError::ExpiredHandle`] once the
//! target is gone. Owning handles keep the target alive for as long as any owning
//! holder exists.
//!
//! Every accessor checks liveness before touching the target and uses `try_lock`,
//! so re-entrant access from the same call reports [`DomainError::HandleBusy`]
//! instead of deadlocking.

use super::error::DomainError;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError, Weak};

/// A native object shared between the engine and scripts.
pub type Shared<T> = Arc<Mutex<T>>;

/// Move a native object into shared storage.
pub fn share<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// A native type that can be reached from script through a [`Handle`].
pub trait NativeType: Send + 'static {
    /// Script-visible type name, used in diagnostics.
    const TYPE_NAME: &'static str;
}

/// Whether a handle keeps its target alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The handle is one of the owners of the target.
    Shared,
    /// The handle observes a target owned elsewhere.
    Weak,
}

/// Script-safe reference to a native object.
pub struct Handle<T: NativeType> {
    target: Weak<Mutex<T>>,
    owner: Option<Shared<T>>,
}

impl<T: NativeType> Handle<T> {
    /// Observe an object owned elsewhere.
    pub fn wrap(target: &Shared<T>) -> Self {
        Self {
            target: Arc::downgrade(target),
            owner: None,
        }
    }

    /// Create a new object owned by the returned handle.
    pub fn owning(value: T) -> Self {
        let shared = share(value);
        Self {
            target: Arc::downgrade(&shared),
            owner: Some(shared),
        }
    }

    /// Promote this handle to an owning one.
    ///
    /// Fails when the target is already gone.
    pub fn own(&mut self) -> Result<(), DomainError> {
        if self.owner.is_none() {
            self.owner = Some(self.unwrap()?);
        }
        Ok(())
    }

    /// Give up ownership, leaving a weak observer behind.
    pub fn release(&mut self) {
        self.owner = None;
    }

    /// A weak copy of this handle that does not extend the target's lifetime.
    pub fn downgrade(&self) -> Self {
        Self {
            target: self.target.clone(),
            owner: None,
        }
    }

    pub fn ownership(&self) -> Ownership {
        if self.owner.is_some() {
            Ownership::Shared
        } else {
            Ownership::Weak
        }
    }

    pub fn is_expired(&self) -> bool {
        self.target.strong_count() == 0
    }

    pub fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    /// Resolve the handle to its target.
    pub fn unwrap(&self) -> Result<Shared<T>, DomainError> {
        self.target
            .upgrade()
            .ok_or(DomainError::ExpiredHandle {
                type_name: T::TYPE_NAME,
            })
    }

    /// Run `f` with shared access to the target.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, DomainError> {
        let target = self.unwrap()?;
        let guard = lock(&target)?;
        Ok(f(&guard))
    }

    /// Run `f` with exclusive access to the target.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, DomainError> {
        let target = self.unwrap()?;
        let mut guard = lock(&target)?;
        Ok(f(&mut guard))
    }

    /// Whether both handles point at the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.target, &other.target)
    }

    /// Whether this handle points at `target`.
    pub fn points_to(&self, target: &Shared<T>) -> bool {
        std::ptr::eq(self.target.as_ptr(), Arc::as_ptr(target))
    }
}

fn lock<T: NativeType>(target: &Shared<T>) -> Result<MutexGuard<'_, T>, DomainError> {
    match target.try_lock() {
        Ok(guard) => Ok(guard),
        // A panic inside an earlier binding call does not invalidate plain data.
        Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => Err(DomainError::HandleBusy {
            type_name: T::TYPE_NAME,
        }),
    }
}

impl<T: NativeType> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            owner: self.owner.clone(),
        }
    }
}

impl<T: NativeType> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("type", &T::TYPE_NAME)
            .field("ownership", &self.ownership())
            .field("expired", &self.is_expired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Gadget {
        value: i32,
    }

    impl NativeType for Gadget {
        const TYPE_NAME: &'static str = "Gadget";
    }

    #[test]
    fn test_weak_handle_expires_with_owner() {
        let owner = share(Gadget { value: 7 });
        let handle = Handle::wrap(&owner);
        assert_eq!(handle.ownership(), Ownership::Weak);
        assert_eq!(handle.with(|p| p.value).unwrap(), 7);

        drop(owner);
        assert!(handle.is_expired());
        assert_eq!(
            handle.with(|p| p.value).unwrap_err(),
            DomainError::ExpiredHandle { type_name: "Gadget" }
        );
    }

    #[test]
    fn test_owning_handle_keeps_target_alive() {
        let handle = Handle::owning(Gadget { value: 1 });
        let observer = handle.downgrade();
        assert_eq!(handle.ownership(), Ownership::Shared);
        assert_eq!(observer.ownership(), Ownership::Weak);

        observer.with_mut(|p| p.value = 5).unwrap();
        assert_eq!(handle.with(|p| p.value).unwrap(), 5);

        drop(handle);
        assert!(observer.is_expired());
    }

    #[test]
    fn test_own_promotes_weak_handle() {
        let owner = share(Gadget { value: 3 });
        let mut handle = Handle::wrap(&owner);
        handle.own().unwrap();
        drop(owner);

        assert!(!handle.is_expired());
        assert_eq!(handle.with(|p| p.value).unwrap(), 3);

        handle.release();
        assert!(handle.is_expired());
    }

    #[test]
    fn test_own_fails_on_expired_target() {
        let owner = share(Gadget { value: 3 });
        let mut handle = Handle::wrap(&owner);
        drop(owner);
        assert!(handle.own().unwrap_err().is_expired());
    }

    #[test]
    fn test_reentrant_access_reports_busy() {
        let handle = Handle::owning(Gadget { value: 0 });
        let inner = handle.clone();
        let result = handle.with_mut(|_| inner.with(|p| p.value)).unwrap();
        assert_eq!(
            result.unwrap_err(),
            DomainError::HandleBusy { type_name: "Gadget" }
        );
    }

    #[test]
    fn test_ptr_eq_and_points_to() {
        let owner = share(Gadget { value: 0 });
        let a = Handle::wrap(&owner);
        let b = Handle::wrap(&owner);
        let other = Handle::owning(Gadget { value: 0 });
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&other));
        assert!(a.points_to(&owner));
    }

    #[test]
    fn test_thousands_of_expired_handles_never_dereference() {
        let mut handles = Vec::with_capacity(5000);
        for value in 0..5000 {
            let owner = share(Gadget { value });
            handles.push(Handle::wrap(&owner));
            // owner dropped at the end of every iteration
        }

        let failures = handles
            .iter()
            .map(|h| h.with_mut(|p| p.value += 1))
            .filter(|r| matches!(r, Err(DomainError::ExpiredHandle { .. })))
            .count();
        assert_eq!(failures, 5000);
    }
}
