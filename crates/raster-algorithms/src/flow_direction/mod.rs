//! Flow directions and the direct-neighbour operations defined on them.
//!
//! A flow direction names the single neighbour receiving a cell's outflow,
//! using keypad codes with rows increasing southward:
//!
//! ```text
//!   7 8 9      NW  N  NE
//!   4 5 6  =>   W sink E
//!   1 2 3      SW  S  SE
//! ```
//!
//! Any other value is a no-data direction. A direction pointing outside
//! the array behaves as a sink.

pub mod d8;
pub mod inflow_count;
pub mod neighbours;

pub use d8::d8_flow_direction;
pub use inflow_count::inflow_count;
pub use neighbours::{downstream, upstream};

use partitioned_array::{Element, Offset, Shape};

pub const SOUTH_WEST: u8 = 1;
pub const SOUTH: u8 = 2;
pub const SOUTH_EAST: u8 = 3;
pub const WEST: u8 = 4;
pub const SINK: u8 = 5;
pub const EAST: u8 = 6;
pub const NORTH_WEST: u8 = 7;
pub const NORTH: u8 = 8;
pub const NORTH_EAST: u8 = 9;

/// Non-sink directions in code order with their (row, col) offsets.
pub(crate) const NEIGHBOURS: [(u8, isize, isize); 8] = [
    (SOUTH_WEST, 1, -1),
    (SOUTH, 1, 0),
    (SOUTH_EAST, 1, 1),
    (WEST, 0, -1),
    (EAST, 0, 1),
    (NORTH_WEST, -1, -1),
    (NORTH, -1, 0),
    (NORTH_EAST, -1, 1),
];

/// Whether `code` is one of the nine valid directions.
#[inline]
pub fn is_valid_direction(code: u8) -> bool {
    (SOUTH_WEST..=NORTH_EAST).contains(&code)
}

/// Offset to the downstream neighbour, `None` for sinks and invalid codes.
#[inline]
pub fn downstream_offset(code: u8) -> Option<(isize, isize)> {
    NEIGHBOURS
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(_, dr, dc)| (*dr, *dc))
}

/// Global index of the cell receiving the outflow of `idx`.
///
/// Returns `None` for sinks, invalid codes and directions leaving the
/// array.
pub fn downstream_cell(direction: u8, idx: Offset<2>, shape: Shape<2>) -> Option<Offset<2>> {
    let (dr, dc) = downstream_offset(direction)?;
    let row = idx[0].checked_add_signed(dr)?;
    let col = idx[1].checked_add_signed(dc)?;
    (row < shape[0] && col < shape[1]).then_some([row, col])
}

/// Direction code stored in an element, `None` if it is not valid.
#[inline]
pub(crate) fn direction_code<FD: Element>(value: FD) -> Option<u8> {
    value.to_u8().filter(|code| is_valid_direction(*code))
}

/// Whether a cell at offset (`dr`, `dc`) from another cell drains into it.
#[inline]
pub(crate) fn drains_into(code: u8, dr: isize, dc: isize) -> bool {
    downstream_offset(code) == Some((-dr, -dc))
}
