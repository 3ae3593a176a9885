use alloc::vec::Vec;

use crate::result::Error;

/// How many times a variable-length request is filled before giving up on
/// an object whose element counts keep growing.
pub(crate) const MAX_FETCH_ATTEMPTS: usize = 8;

/// Allocates a vector of exactly `len` default-initialized elements,
/// reporting allocation failure as [`Error::SystemMem`].
pub(crate) fn vec_with_len<T: Default + Clone>(len: usize) -> Result<Vec<T>, Error> {
    let mut ret = Vec::new();
    ret.try_reserve_exact(len)?;
    ret.resize(len, T::default());
    Ok(ret)
}

/// Runs the kernel's "query size, allocate, query again" protocol for a
/// request that returns up to two variable-length arrays.
///
/// `request` is called first with empty buffers and must return the element
/// counts the kernel reported for each array. The buffers passed to later
/// calls are sized exactly to those counts.
pub(crate) fn query_variable_length<A, B, F>(mut request: F) -> Result<(Vec<A>, Vec<B>), Error>
where
    A: Default + Clone,
    B: Default + Clone,
    F: FnMut(&mut [A], &mut [B]) -> Result<(usize, usize), Error>,
{
    let counts = request(&mut [], &mut [])?;
    fill_variable_length(counts, request)
}

/// The second half of [`query_variable_length`], for callers that already
/// learned the element counts from an earlier request.
///
/// If the kernel reports more elements than were allocated, the object
/// changed between the two requests and so the buffers are reallocated and
/// the request repeated, up to [`MAX_FETCH_ATTEMPTS`] times, after which
/// the result is [`Error::RemoteFailure`]. Failed requests are never
/// repeated.
pub(crate) fn fill_variable_length<A, B, F>(
    counts: (usize, usize),
    mut request: F,
) -> Result<(Vec<A>, Vec<B>), Error>
where
    A: Default + Clone,
    B: Default + Clone,
    F: FnMut(&mut [A], &mut [B]) -> Result<(usize, usize), Error>,
{
    let (mut count_a, mut count_b) = counts;
    for _ in 0..MAX_FETCH_ATTEMPTS {
        if count_a == 0 && count_b == 0 {
            return Ok((Vec::new(), Vec::new()));
        }

        let mut a = vec_with_len::<A>(count_a)?;
        let mut b = vec_with_len::<B>(count_b)?;
        let (new_a, new_b) = request(&mut a, &mut b)?;
        if new_a > count_a || new_b > count_b {
            log::trace!(
                "element counts grew from ({count_a}, {count_b}) to ({new_a}, {new_b}); fetching again"
            );
            count_a = new_a;
            count_b = new_b;
            continue;
        }

        a.truncate(new_a);
        b.truncate(new_b);
        return Ok((a, b));
    }
    log::warn!("element counts still growing after {MAX_FETCH_ATTEMPTS} requests");
    Err(Error::RemoteFailure)
}
