//! Scalar Harvey butterflies with lazy reduction.
//!
//! Forward intermediates live in [0, 4q), inverse intermediates in [0, 2q);
//! both bounds are debug_asserted at every butterfly. See Algorithms 3 and 4
//! of https://arxiv.org/pdf/1205.2926.pdf.

use itertools::izip;

use crate::modulus::ReduceOnce;
use crate::ntheory::multiply_mod_lazy;
use crate::ntt::NttTables;

/// Natural order in, bit-reversed order out. Inputs below 4q are accepted;
/// outputs are below q, or below 4q when LAZY skips the final pass.
pub(crate) fn forward_transform<const LAZY: bool>(tables: &NttTables, elements: &mut [u64]) {
    let q = tables.modulus;
    let two_q = q << 1;
    let four_q = q << 2;
    let n = tables.degree;

    let mut t = n >> 1;
    let mut m = 1;
    while m < n {
        let mut j1 = 0;
        for i in 0..m {
            let w = tables.root_powers[m + i];
            let (xs, ys) = elements[j1..j1 + 2 * t].split_at_mut(t);
            for (x, y) in izip!(xs.iter_mut(), ys.iter_mut()) {
                debug_assert!(*x < four_q && *y < four_q);
                // X', Y' = X + WY, X - WY (mod q), all lazy
                let tx = (*x).reduce_once(two_q);
                let wy = multiply_mod_lazy::<64>(*y, w, q);
                *x = tx + wy;
                *y = tx + two_q - wy;
                debug_assert!(*x < four_q && *y < four_q);
            }
            j1 += 2 * t;
        }
        t >>= 1;
        m <<= 1;
    }

    if !LAZY {
        for x in elements.iter_mut() {
            x.reduce_once_assign(two_q);
            x.reduce_once_assign(q);
            debug_assert!(*x < q);
        }
    }
}

/// Bit-reversed order in (elements below q), natural order out, below q.
/// The final stage carries the n^-1 and n^-1 psi^-1 scaling.
pub(crate) fn inverse_transform(tables: &NttTables, elements: &mut [u64]) {
    let q = tables.modulus;
    let two_q = q << 1;
    let n = tables.degree;

    let mut t = 1;
    let mut m = n >> 1;
    let mut root_index = 1;
    while m > 1 {
        let mut j1 = 0;
        for _ in 0..m {
            let w = tables.inv_root_powers[root_index];
            root_index += 1;
            let (xs, ys) = elements[j1..j1 + 2 * t].split_at_mut(t);
            for (x, y) in izip!(xs.iter_mut(), ys.iter_mut()) {
                debug_assert!(*x < two_q && *y < two_q);
                // X', Y' = X + Y (mod q), W(X - Y) (mod q), all lazy
                let tx = *x + *y;
                let ty = *x + two_q - *y;
                *x = tx.reduce_once(two_q);
                *y = multiply_mod_lazy::<64>(ty, w, q);
                debug_assert!(*x < two_q && *y < two_q);
            }
            j1 += 2 * t;
        }
        t <<= 1;
        m >>= 1;
    }

    // Final stage fused with the scaling and the [0, 2q) -> [0, q) fold.
    let inv_n = tables.inv_degree;
    let inv_n_w = tables.inv_degree_w;
    let (xs, ys) = elements.split_at_mut(n >> 1);
    for (x, y) in izip!(xs.iter_mut(), ys.iter_mut()) {
        debug_assert!(*x < two_q && *y < two_q);
        let tx = (*x + *y).reduce_once(two_q);
        let ty = *x + two_q - *y;
        *x = multiply_mod_lazy::<64>(tx, inv_n, q).reduce_once(q);
        *y = multiply_mod_lazy::<64>(ty, inv_n_w, q).reduce_once(q);
        debug_assert!(*x < q && *y < q);
    }
}
