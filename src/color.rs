/// Deterministic color assignment for auto-groups
use crate::tab_data::GroupColor;

/// Pick a stable palette color for a group name.
///
/// The hash is the classic `hash = code + ((hash << 5) - hash)` rolling hash
/// over UTF-16 code units in wrapping 32-bit signed arithmetic. The exact
/// formula matters: group colors must come out identical across reinstalls
/// (and match what the popup's JS computes for the same name).
pub fn color_for_name(name: &str) -> GroupColor {
    let mut hash: i32 = 0;
    for code in name.encode_utf16() {
        hash = (hash << 5).wrapping_sub(hash).wrapping_add(i32::from(code));
    }

    let index = hash.unsigned_abs() as usize % GroupColor::PALETTE.len();
    GroupColor::PALETTE[index]
}
