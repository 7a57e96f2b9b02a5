//! `array->array` stages, reinterpreting the elements of a chunk.
//!
//! [`transpose`] reorders elements by memory layout. [`delta`] is a filter over elements of its own `dtype`.

pub mod delta;
pub mod transpose;
