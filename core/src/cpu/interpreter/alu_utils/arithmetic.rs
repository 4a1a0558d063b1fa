/// 32-bit add with carry-in, returning (sum, carry-out, overflow).
///
/// Every arithmetic data-processing operation reduces to this: SUB is
/// `a + !b + 1`, SBC is `a + !b + C`, and the reverse forms swap the
/// operands.
#[inline]
pub fn add_with_carry(a: u32, b: u32, carry_in: bool) -> (u32, bool, bool) {
    let sum = a as u64 + b as u64 + carry_in as u64;
    let result = sum as u32;
    let carry = sum >> 32 != 0;
    let overflow = !(a ^ b) & (a ^ result) & 1 << 31 != 0;
    (result, carry, overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference computation over a widened type, as the architecture defines
    // the flags.
    fn reference(a: u32, b: u32, carry_in: bool) -> (u32, bool, bool) {
        let wide = a as u64 + b as u64 + carry_in as u64;
        let result = wide as u32;
        let signed = a as i32 as i64 + b as i32 as i64 + carry_in as i64;
        (result, wide >= 1 << 32, signed != result as i32 as i64)
    }

    #[test]
    fn matches_wide_reference() {
        let interesting = [
            0,
            1,
            2,
            0x7FFF_FFFE,
            0x7FFF_FFFF,
            0x8000_0000,
            0x8000_0001,
            0xFFFF_FFFE,
            0xFFFF_FFFF,
            0x1234_5678,
            0xDEAD_BEEF,
        ];
        for &a in &interesting {
            for &b in &interesting {
                for carry_in in [false, true] {
                    assert_eq!(
                        add_with_carry(a, b, carry_in),
                        reference(a, b, carry_in),
                        "a={a:#X} b={b:#X} c={carry_in}"
                    );
                }
            }
        }
    }

    #[test]
    fn wrap_to_zero_sets_carry_not_overflow() {
        assert_eq!(add_with_carry(0xFFFF_FFFF, 1, false), (0, true, false));
        assert_eq!(add_with_carry(0xFFFF_FFFF, 0, true), (0, true, false));
    }

    #[test]
    fn subtraction_borrow_clears_carry() {
        // 2 - 3 as a + !b + 1
        assert_eq!(add_with_carry(2, !3, true), (0xFFFF_FFFF, false, false));
        // 3 - 2 has no borrow
        assert_eq!(add_with_carry(3, !2, true), (1, true, false));
    }

    #[test]
    fn signed_overflow_on_same_sign_operands() {
        assert_eq!(
            add_with_carry(0x7FFF_FFFF, 1, false),
            (0x8000_0000, false, true)
        );
        assert_eq!(
            add_with_carry(0x8000_0000, 0x8000_0000, false),
            (0, true, true)
        );
    }
}
