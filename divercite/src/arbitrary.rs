use quickcheck::{Arbitrary, Gen};

use crate::{GridCell, PieceColor, PieceKind, ScreenPoint, Shape, Side, GRID_SIZE};

impl Arbitrary for ScreenPoint {
    fn arbitrary(g: &mut Gen) -> Self {
        // Covers an 800x800 canvas with some room around it. Always finite.
        let coordinate = |g: &mut Gen| (u16::arbitrary(g) % 1000) as f64 - 100.0;
        let fraction = |g: &mut Gen| (u8::arbitrary(g) as f64) / 256.0;
        ScreenPoint {
            x: coordinate(g) + fraction(g),
            y: coordinate(g) + fraction(g),
        }
    }
}

impl Arbitrary for GridCell {
    fn arbitrary(g: &mut Gen) -> Self {
        GridCell {
            row: u8::arbitrary(g) % GRID_SIZE as u8,
            col: u8::arbitrary(g) % GRID_SIZE as u8,
        }
    }
}

impl Arbitrary for PieceColor {
    fn arbitrary(g: &mut Gen) -> Self {
        *g.choose(&PieceColor::ALL).unwrap()
    }
}

impl Arbitrary for Side {
    fn arbitrary(g: &mut Gen) -> Self {
        *g.choose(&Side::ALL).unwrap()
    }
}

impl Arbitrary for PieceKind {
    fn arbitrary(g: &mut Gen) -> Self {
        let shape = *g.choose(&[Shape::Connector, Shape::Ring]).unwrap();
        PieceKind::new(PieceColor::arbitrary(g), shape)
    }
}
