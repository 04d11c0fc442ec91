/// Incremental DJB2-xor hasher over UTF-16 code units.
///
/// Each step computes `h = (h * 33) ^ unit` with 32-bit wraparound, starting
/// from the classic seed 5381. Hashing UTF-16 units rather than bytes keeps
/// the output identical to fingerprints computed by script hosts, which index
/// strings by code unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Djb2Hasher {
    state: u32,
}

impl Djb2Hasher {
    /// The DJB2 seed value.
    pub const SEED: u32 = 5381;

    /// Create a hasher at the seed state.
    pub const fn new() -> Self {
        Self { state: Self::SEED }
    }

    /// Feed one UTF-16 code unit.
    pub fn write_unit(&mut self, unit: u16) {
        self.state = self.state.wrapping_mul(33) ^ u32::from(unit);
    }

    /// Feed every UTF-16 code unit of `s`.
    pub fn write_str(&mut self, s: &str) {
        for unit in s.encode_utf16() {
            self.write_unit(unit);
        }
    }

    /// The current hash value.
    pub fn finish(&self) -> u32 {
        self.state
    }

    /// One-shot hash of a string.
    pub fn hash_str(s: &str) -> u32 {
        let mut hasher = Self::new();
        hasher.write_str(s);
        hasher.finish()
    }
}

impl Default for Djb2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Render an unsigned value in lowercase base 36 (`0-9a-z`).
pub fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::with_capacity(7);
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    // Only ASCII digits were pushed.
    out.into_iter().map(char::from).collect()
}
