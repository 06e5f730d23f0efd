use core::fmt;

/// A four-character chunk identifier such as `DXBC`, `FX10` or `RDEF`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Container magic.
    pub const DXBC: FourCC = FourCC(*b"DXBC");
    /// Compiled `fx_4_x` effect body.
    pub const FX10: FourCC = FourCC(*b"FX10");
    /// Resource definitions.
    pub const RDEF: FourCC = FourCC(*b"RDEF");
    /// Input signature.
    pub const ISGN: FourCC = FourCC(*b"ISGN");
    /// Output signature.
    pub const OSGN: FourCC = FourCC(*b"OSGN");
    /// SM4 shader token stream.
    pub const SHDR: FourCC = FourCC(*b"SHDR");

    /// Reads a FourCC from the first four bytes of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let head = bytes.get(..4)?;
        Some(Self([head[0], head[1], head[2], head[3]]))
    }

    /// Returns the identifier as a little-endian `u32`.
    pub const fn as_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let printable = self
            .0
            .iter()
            .copied()
            .all(|b| b.is_ascii_graphic() || b == b' ');
        if printable {
            // Checked above: every byte is printable ASCII.
            let s = core::str::from_utf8(&self.0).unwrap_or("????");
            write!(f, "{s}")
        } else {
            write!(
                f,
                "0x{:02x}{:02x}{:02x}{:02x}",
                self.0[0], self.0[1], self.0[2], self.0[3]
            )
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
