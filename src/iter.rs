//! Iterator extension methods.

use std::iter::Zip;

/// A variant of [`Iterator::zip`] that panics if the iterators have different lengths.
///
/// [`Iterator::zip`] silently stops when either iterator runs dry, which hides bugs when the two
/// sides are expected to line up exactly (copying network outputs into preallocated landmark
/// storage, for example). Use this function whenever equal lengths are an invariant.
#[track_caller]
pub fn zip_exact<A, B>(a: A, b: B) -> Zip<A::IntoIter, B::IntoIter>
where
    A: IntoIterator,
    B: IntoIterator,
    A::IntoIter: ExactSizeIterator,
    B::IntoIter: ExactSizeIterator,
{
    let a = a.into_iter();
    let b = b.into_iter();
    assert_eq!(
        a.len(),
        b.len(),
        "`zip_exact` called on iterators with different lengths"
    );

    a.zip(b)
}
