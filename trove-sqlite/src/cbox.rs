use std::ops::{Deref, DerefMut};

pub(crate) trait NullCheck {
    fn is_null(&self) -> bool;
}

impl<T> NullCheck for *const T {
    fn is_null(&self) -> bool {
        (*self as *const T).is_null()
    }
}

impl<T> NullCheck for *mut T {
    fn is_null(&self) -> bool {
        (*self as *const T).is_null()
    }
}

/// Owning wrapper of a sqlite handle, released with `dealloc` unless null.
#[derive(Debug)]
pub(crate) struct CBox<T: NullCheck> {
    pub(crate) ptr: T,
    dealloc: fn(T),
}

impl<T: NullCheck> CBox<T> {
    pub fn new(ptr: T, dealloc: fn(T)) -> Self {
        Self { ptr, dealloc }
    }
}

impl<T: NullCheck> Drop for CBox<T> {
    fn drop(&mut self) {
        if !self.is_null() {
            unsafe {
                (self.dealloc)(std::ptr::read(&self.ptr as *const T));
            }
        }
    }
}

impl<T: NullCheck> Deref for CBox<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.ptr
    }
}

impl<T: NullCheck> DerefMut for CBox<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ptr
    }
}

#[cfg(test)]
mod tests {
    use super::CBox;
    use std::{
        ptr,
        sync::atomic::{AtomicUsize, Ordering},
    };

    static RELEASED: AtomicUsize = AtomicUsize::new(0);

    #[test]
    fn null_is_not_released() {
        let before = RELEASED.load(Ordering::SeqCst);
        {
            let _value: CBox<*mut u8> = CBox::new(ptr::null_mut(), |_| {
                RELEASED.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(RELEASED.load(Ordering::SeqCst), before);
        let mut byte = 0u8;
        {
            let _value: CBox<*mut u8> = CBox::new(&mut byte, |_| {
                RELEASED.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(RELEASED.load(Ordering::SeqCst), before + 1);
    }
}
