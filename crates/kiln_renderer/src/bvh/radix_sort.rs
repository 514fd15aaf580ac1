//! Parallel LSD radix sort of primitive indices by float keys.
//!
//! Each pass counts digits per chunk, turns the counts into output offsets
//! with a bucket-major, chunk-minor prefix sum, and scatters every chunk into
//! its own disjoint output segments. The sort is stable, so the result is
//! identical for any chunk count.

use rayon::prelude::*;

const BITS_PER_PASS: u32 = 10;
const BUCKETS: usize = 1 << BITS_PER_PASS;
const MASK: u32 = (1 << BITS_PER_PASS) - 1;
const KEY_BITS: u32 = u32::BITS;

/// Below this many keys the sort runs as a single chunk.
const PARALLEL_THRESHOLD: usize = 1024;

/// Map a float onto a `u32` whose unsigned order matches the float order.
/// `+0.0` and `-0.0` produce the same key.
#[inline]
pub fn make_key(x: f32) -> u32 {
    let bits = x.to_bits();
    if bits & 0x8000_0000 != 0 {
        bits.wrapping_neg()
    } else {
        bits ^ 0x8000_0000
    }
}

#[inline]
fn digit(key: u32, shift: u32) -> usize {
    ((key >> shift) & MASK) as usize
}

/// Sort `values` by `keys`, keeping equal keys in their input order.
pub fn sort_by_key(keys: &mut Vec<u32>, values: &mut Vec<u32>) {
    debug_assert_eq!(keys.len(), values.len());
    let len = keys.len();
    if len < 2 {
        return;
    }

    let chunk_len = if len < PARALLEL_THRESHOLD {
        len
    } else {
        len.div_ceil(rayon::current_num_threads().max(1))
    };

    let mut keys_tmp = vec![0u32; len];
    let mut values_tmp = vec![0u32; len];

    let mut shift = 0;
    while shift < KEY_BITS {
        scatter_pass(keys, values, &mut keys_tmp, &mut values_tmp, chunk_len, shift);
        std::mem::swap(keys, &mut keys_tmp);
        std::mem::swap(values, &mut values_tmp);
        shift += BITS_PER_PASS;
    }
}

fn scatter_pass(
    keys: &[u32],
    values: &[u32],
    keys_out: &mut [u32],
    values_out: &mut [u32],
    chunk_len: usize,
    shift: u32,
) {
    // Digit histogram of every chunk
    let counts: Vec<Vec<usize>> = keys
        .par_chunks(chunk_len)
        .map(|chunk| {
            let mut histogram = vec![0usize; BUCKETS];
            for &key in chunk {
                histogram[digit(key, shift)] += 1;
            }
            histogram
        })
        .collect();

    // Carve the output into one segment per (bucket, chunk), bucket-major
    let mut segments: Vec<Vec<(&mut [u32], &mut [u32])>> =
        (0..counts.len()).map(|_| Vec::with_capacity(BUCKETS)).collect();
    let mut keys_rest = keys_out;
    let mut values_rest = values_out;
    for bucket in 0..BUCKETS {
        for (chunk, histogram) in counts.iter().enumerate() {
            let n = histogram[bucket];
            let (key_seg, key_tail) = std::mem::take(&mut keys_rest).split_at_mut(n);
            let (value_seg, value_tail) = std::mem::take(&mut values_rest).split_at_mut(n);
            keys_rest = key_tail;
            values_rest = value_tail;
            segments[chunk].push((key_seg, value_seg));
        }
    }

    keys.par_chunks(chunk_len)
        .zip(values.par_chunks(chunk_len))
        .zip(segments.into_par_iter())
        .for_each(|((chunk_keys, chunk_values), mut out)| {
            let mut cursor = vec![0usize; BUCKETS];
            for (&key, &value) in chunk_keys.iter().zip(chunk_values) {
                let bucket = digit(key, shift);
                let (key_seg, value_seg) = &mut out[bucket];
                key_seg[cursor[bucket]] = key;
                value_seg[cursor[bucket]] = value;
                cursor[bucket] += 1;
            }
        });
}
