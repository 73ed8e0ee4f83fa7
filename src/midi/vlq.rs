// Variable-length quantity codec used for MIDI delta-times
//
// Each output byte carries 7 data bits, most significant group first. Every
// byte except the last has the continuation bit (0x80) set. Inputs are
// unsigned so negative values cannot reach the encoder; values above
// `VLQ_MAX` do not fit in four bytes and are clamped.

/// Largest value representable in a four byte quantity.
pub const VLQ_MAX: u32 = 0x0FFF_FFFF;

/// Maximum encoded length in bytes.
pub const VLQ_MAX_BYTES: usize = 4;

const CONTINUATION: u8 = 0x80;
const DATA_MASK: u32 = 0x7F;

/// Encode `value` as a 1-4 byte variable-length quantity.
pub fn encode(value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(VLQ_MAX_BYTES);
    write(&mut out, value);
    out
}

/// Append the encoding of `value` to `out`.
pub fn write(out: &mut Vec<u8>, value: u32) {
    if value > VLQ_MAX {
        log::warn!(
            "[Vlq] Value {} exceeds four byte quantity, clamping to {}",
            value,
            VLQ_MAX
        );
    }
    let value = value.min(VLQ_MAX);

    let mut groups = [0u8; VLQ_MAX_BYTES];
    let mut count = 0;
    let mut rest = value;
    loop {
        groups[count] = (rest & DATA_MASK) as u8;
        count += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }

    // groups[0] is the lowest-order group and is emitted last
    for idx in (0..count).rev() {
        let byte = if idx == 0 {
            groups[idx]
        } else {
            groups[idx] | CONTINUATION
        };
        out.push(byte);
    }
}

/// Decode a quantity from the start of `bytes`.
///
/// Returns the value and the number of bytes consumed, or `None` when the
/// input ends before a terminating byte or runs past four bytes.
pub fn decode(bytes: &[u8]) -> Option<(u32, usize)> {
    let mut value: u32 = 0;
    for (idx, byte) in bytes.iter().take(VLQ_MAX_BYTES).enumerate() {
        value = (value << 7) | (*byte as u32 & DATA_MASK);
        if byte & CONTINUATION == 0 {
            return Some((value, idx + 1));
        }
    }
    None
}
