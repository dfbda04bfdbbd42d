//! The Trace trait must be implemented by every type that can be GC managed.


use crate::heap::TraceStack;


/// Trace trait. Every type that can be managed by the GC must implement this trait.
/// This trait is unsafe in that incorrectly implementing it can cause Undefined Behavior.
pub unsafe trait Trace {
    /// If the type can contain GC managed pointers, this must return true
    fn traversible(&self) -> bool {
        false
    }

    /// If the type can contain GC managed pointers, this must visit each pointer.
    ///
    /// With the parallel heap this is called from collector worker threads while the mutator
    /// is stopped, so it must only read.
    unsafe fn trace(&self, _stack: &mut TraceStack) {}
}


unsafe impl Trace for usize {}
unsafe impl Trace for isize {}
unsafe impl Trace for i8 {}
unsafe impl Trace for u8 {}
unsafe impl Trace for i16 {}
unsafe impl Trace for u16 {}
unsafe impl Trace for i32 {}
unsafe impl Trace for u32 {}
unsafe impl Trace for i64 {}
unsafe impl Trace for u64 {}
unsafe impl Trace for f32 {}
unsafe impl Trace for f64 {}
unsafe impl Trace for &'static str {}
unsafe impl Trace for String {}


unsafe impl<T: Trace> Trace for Vec<T> {
    fn traversible(&self) -> bool {
        self.iter().any(|item| item.traversible())
    }

    unsafe fn trace(&self, stack: &mut TraceStack) {
        for item in self.iter() {
            item.trace(stack);
        }
    }
}
