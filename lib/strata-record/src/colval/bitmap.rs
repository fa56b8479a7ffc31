//! Validity bitmap helpers.
//!
//! Bits are packed LSB-first: bit position `p` lives in byte `p / 8`, under mask `1 << (p % 8)`.

const BIT_MASK: [u8; 8] = [1, 2, 4, 8, 16, 32, 64, 128];

/// Returns the number of bytes needed to hold `bits` bits.
#[inline]
pub(crate) const fn bytes_for(bits: usize) -> usize {
    (bits + 7) >> 3
}

#[inline]
pub(crate) fn is_set(bitmap: &[u8], pos: usize) -> bool {
    bitmap[pos >> 3] & BIT_MASK[pos & 7] != 0
}

/// Sets or clears the bit at `pos`, growing the bitmap if it does not yet reach `pos`.
#[inline]
pub(crate) fn put(bitmap: &mut Vec<u8>, pos: usize, present: bool) {
    let byte = pos >> 3;
    if byte >= bitmap.len() {
        bitmap.resize(byte + 1, 0);
    }

    if present {
        bitmap[byte] |= BIT_MASK[pos & 7];
    } else {
        bitmap[byte] &= !BIT_MASK[pos & 7];
    }
}

/// Returns the number of set bits in `[start, end)`.
pub(crate) fn count_set(bitmap: &[u8], start: usize, end: usize) -> usize {
    let mut count = 0;
    let mut pos = start;

    while pos < end && pos & 7 != 0 {
        count += usize::from(is_set(bitmap, pos));
        pos += 1;
    }
    while pos + 8 <= end {
        count += bitmap[pos >> 3].count_ones() as usize;
        pos += 8;
    }
    while pos < end {
        count += usize::from(is_set(bitmap, pos));
        pos += 1;
    }

    count
}

/// Appends the bits `[src_start, src_end)` of `src` to `dst`, starting at bit position `dst_pos`.
///
/// `dst` must not hold any bits at or beyond `dst_pos` other than zeroes. On return, `dst` is exactly long enough to
/// hold `dst_pos + (src_end - src_start)` bits, and any bits past that are zero.
pub(crate) fn append(dst: &mut Vec<u8>, dst_pos: usize, src: &[u8], src_start: usize, src_end: usize) {
    if src_end <= src_start {
        return;
    }

    // When both sides start on a byte boundary, whole bytes can be copied as-is. Only the trailing partial byte needs
    // its unused high bits masked off.
    if dst_pos & 7 == 0 && src_start & 7 == 0 {
        dst.truncate(dst_pos >> 3);
        dst.extend_from_slice(&src[src_start >> 3..bytes_for(src_end)]);

        let tail_bits = src_end & 7;
        if tail_bits != 0 {
            if let Some(last) = dst.last_mut() {
                *last &= (1u8 << tail_bits) - 1;
            }
        }
        return;
    }

    let rows = src_end - src_start;
    let needed = bytes_for(dst_pos + rows);
    if needed > dst.len() {
        dst.resize(needed, 0);
    }

    for (i, src_pos) in (src_start..src_end).enumerate() {
        let pos = dst_pos + i;
        if is_set(src, src_pos) {
            dst[pos >> 3] |= BIT_MASK[pos & 7];
        } else {
            dst[pos >> 3] &= !BIT_MASK[pos & 7];
        }
    }
}
