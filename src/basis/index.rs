use crate::error::ShapesetError;
use std::fmt;

/// Largest edge order that fits the packed constrained encoding
pub const MAX_CONSTRAINED_ORDER: usize = 15;

/// Largest part that fits the packed constrained encoding
pub const MAX_CONSTRAINED_PART: usize = ((i32::MAX as usize) >> 7) - 1;

/// A constrained (hanging-node) edge function: the part `part` of a parent edge's order-`order` function
///
/// `part` addresses a sub-interval in the binary subdivision of the parent edge: `0` and `1` are the two
/// halves, `2..6` the quarters, and so on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConstrainedEdge {
    part: usize,
    order: usize,
    edge: usize,
    ori: u8,
}

impl ConstrainedEdge {
    pub fn new(part: usize, order: usize, edge: usize, ori: u8) -> Result<Self, ShapesetError> {
        if order > MAX_CONSTRAINED_ORDER {
            return Err(ShapesetError::OrderOutOfRange {
                order,
                min: 0,
                max: MAX_CONSTRAINED_ORDER,
            });
        }
        if edge > 3 {
            return Err(ShapesetError::InvalidEdge(edge));
        }
        if ori > 1 {
            return Err(ShapesetError::InvalidOrientation(ori));
        }
        if part > MAX_CONSTRAINED_PART {
            return Err(ShapesetError::PartOutOfRange(part));
        }
        Ok(Self {
            part,
            order,
            edge,
            ori,
        })
    }

    pub fn part(&self) -> usize {
        self.part
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn edge(&self) -> usize {
        self.edge
    }

    pub fn ori(&self) -> u8 {
        self.ori
    }
}

/// Index of a shape function: either a regular function of the family or a constrained edge function
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeIndex {
    Regular(u32),
    Constrained(ConstrainedEdge),
}

impl ShapeIndex {
    /// Packed signed representation: regular indices are non-negative; constrained ones are
    /// `-1 - ((part << 7) + (order << 3) + (edge << 1) + ori)`
    ///
    /// Regular indices above `i32::MAX` have no raw form.
    pub fn to_raw(&self) -> Result<i32, ShapesetError> {
        match self {
            Self::Regular(index) => i32::try_from(*index).map_err(|_| ShapesetError::RawIndexOverflow(*index)),
            Self::Constrained(c) => Ok(-1 - (((c.part << 7) + (c.order << 3) + (c.edge << 1) + c.ori as usize) as i32)),
        }
    }

    pub fn from_raw(raw: i32) -> Self {
        if raw >= 0 {
            Self::Regular(raw as u32)
        } else {
            let packed = (-1 - raw) as usize;
            Self::Constrained(ConstrainedEdge {
                part: packed >> 7,
                order: (packed >> 3) & 0xf,
                edge: (packed >> 1) & 0x3,
                ori: (packed & 0x1) as u8,
            })
        }
    }

    pub fn is_constrained(&self) -> bool {
        matches!(self, Self::Constrained(_))
    }
}

impl From<ConstrainedEdge> for ShapeIndex {
    fn from(c: ConstrainedEdge) -> Self {
        Self::Constrained(c)
    }
}

impl fmt::Display for ShapeIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Regular(index) => write!(f, "Shape Fn {}", index),
            Self::Constrained(c) => write!(
                f,
                "Constrained Shape Fn (part: {}, order: {}, edge: {}, ori: {})",
                c.part, c.order, c.edge, c.ori
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_encoding_bijection() {
        for part in [0, 1, 5, 1000, MAX_CONSTRAINED_PART] {
            for order in [0, 7, MAX_CONSTRAINED_ORDER] {
                for edge in 0..4 {
                    for ori in 0..2 {
                        let index = ShapeIndex::from(ConstrainedEdge::new(part, order, edge, ori).unwrap());
                        let raw = index.to_raw().unwrap();
                        assert!(raw < 0);
                        assert_eq!(ShapeIndex::from_raw(raw), index);
                    }
                }
            }
        }

        for regular in [0, 1, 52, i32::MAX as u32] {
            let raw = ShapeIndex::Regular(regular).to_raw().unwrap();
            assert!(raw >= 0);
            assert_eq!(ShapeIndex::from_raw(raw), ShapeIndex::Regular(regular));
        }
    }

    #[test]
    fn packed_layout() {
        let c = ConstrainedEdge::new(1, 2, 3, 1).unwrap();
        assert_eq!(ShapeIndex::from(c).to_raw().unwrap(), -1 - (128 + 16 + 6 + 1));
        assert_eq!(ShapeIndex::from_raw(-1), ShapeIndex::from(ConstrainedEdge::new(0, 0, 0, 0).unwrap()));
    }

    #[test]
    fn oversized_regular_indices() {
        for regular in [i32::MAX as u32 + 1, 3_000_000_000, u32::MAX] {
            assert!(matches!(
                ShapeIndex::Regular(regular).to_raw(),
                Err(ShapesetError::RawIndexOverflow(i)) if i == regular
            ));
        }
    }

    #[test]
    fn invalid_constrained_edges() {
        assert!(matches!(
            ConstrainedEdge::new(0, 16, 0, 0),
            Err(ShapesetError::OrderOutOfRange { order: 16, .. })
        ));
        assert!(matches!(ConstrainedEdge::new(0, 3, 4, 0), Err(ShapesetError::InvalidEdge(4))));
        assert!(matches!(ConstrainedEdge::new(0, 3, 1, 2), Err(ShapesetError::InvalidOrientation(2))));
        assert!(matches!(
            ConstrainedEdge::new(MAX_CONSTRAINED_PART + 1, 3, 1, 0),
            Err(ShapesetError::PartOutOfRange(_))
        ));
    }
}
