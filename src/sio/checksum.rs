/// SIO frame checksum
///
/// An 8-bit sum with end-around carry: every overflow out of bit 7 is added
/// back into the low byte.

/// Compute the checksum of a frame
pub fn checksum(data: &[u8]) -> u8 {
    let mut sum: usize = data.iter().map(|&b| b as usize).sum();
    while sum > 0xFF {
        sum = (sum & 0xFF) + (sum >> 8);
    }
    sum as u8
}

/// Check a frame whose last byte is the checksum of the rest
pub fn verify(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((&sum, payload)) => checksum(payload) == sum,
        None => false,
    }
}
