//! Dense matrices whose every element is a separate GC-managed object.
//!
//! The layout exists to put pressure on the collector, not to be fast: an n×n matrix is n² + 1
//! heap objects, and every operation allocates a complete new matrix for its result.


use rand::Rng;

use crate::appthread::{Gc, GcRoot};
use crate::error::{Error, Result};
use crate::heap::TraceStack;
use crate::trace::Trace;


/// A rows × cols grid of individually boxed `f64`s.
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<Vec<Gc<f64>>>,
}


unsafe impl Trace for Matrix {
    fn traversible(&self) -> bool {
        self.rows > 0 && self.cols > 0
    }

    unsafe fn trace(&self, stack: &mut TraceStack) {
        self.data.trace(stack);
    }
}


impl Matrix {
    /// A matrix of independently allocated random values in [0, 1).
    pub fn random<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> GcRoot<Matrix> {
        Matrix::from_fn(rows, cols, |_, _| rng.gen::<f64>())
    }

    /// A matrix whose element at (i, j) is `f(i, j)`.
    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> GcRoot<Matrix>
        where F: FnMut(usize, usize) -> f64
    {
        let data = (0..rows)
            .map(|i| (0..cols).map(|j| Gc::new(f(i, j))).collect())
            .collect();

        // the elements are unrooted until this root exists; nothing collects before it does
        GcRoot::new(Matrix { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// The element at row `i`, column `j`. Panics if out of bounds.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        *self.data[i][j]
    }

    /// Standard triple loop product. `self.cols()` must equal `other.rows()`.
    pub fn multiply(&self, other: &Matrix) -> Result<GcRoot<Matrix>> {
        if self.cols != other.rows {
            return Err(self.incompatible("multiplication", other));
        }

        Ok(Matrix::from_fn(self.rows, other.cols, |i, j| {
            let mut sum = 0.0;
            for k in 0..self.cols {
                sum += self.get(i, k) * other.get(k, j);
            }
            sum
        }))
    }

    /// Elementwise sum. Both matrices must have the same dimensions.
    pub fn add(&self, other: &Matrix) -> Result<GcRoot<Matrix>> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(self.incompatible("addition", other));
        }

        Ok(Matrix::from_fn(self.rows, self.cols, |i, j| self.get(i, j) + other.get(i, j)))
    }

    pub fn transpose(&self) -> GcRoot<Matrix> {
        Matrix::from_fn(self.cols, self.rows, |i, j| self.get(j, i))
    }

    pub fn scalar_multiply(&self, scalar: f64) -> GcRoot<Matrix> {
        Matrix::from_fn(self.rows, self.cols, |i, j| self.get(i, j) * scalar)
    }

    fn incompatible(&self, op: &'static str, other: &Matrix) -> Error {
        Error::IncompatibleDimensions {
            op,
            lhs: (self.rows, self.cols),
            rhs: (other.rows, other.cols),
        }
    }
}
