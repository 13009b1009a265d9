//! Z-order primitives over a back-to-front sequence.
//!
//! Index 0 is the back (bottom) of the stack, the last index is the front
//! (top). Each helper leaves the relative order of all other elements intact
//! and does nothing for an out-of-range index.

/// Swap with the next element toward the front. No-op at the front.
pub fn move_one_to_end<T>(items: &mut [T], index: usize) {
    if index + 1 < items.len() {
        items.swap(index, index + 1);
    }
}

/// Swap with the previous element toward the back. No-op at the back.
pub fn move_one_to_start<T>(items: &mut [T], index: usize) {
    if index > 0 && index < items.len() {
        items.swap(index, index - 1);
    }
}

/// Relocate to the very front.
pub fn move_to_end<T>(items: &mut [T], index: usize) {
    if index < items.len() {
        items[index..].rotate_left(1);
    }
}

/// Relocate to the very back.
pub fn move_to_start<T>(items: &mut [T], index: usize) {
    if index < items.len() {
        items[..=index].rotate_right(1);
    }
}
