use core::convert::TryFrom;

/// ARMv6 privilege modes, as encoded in CPSR bits 0-4.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    User = 0x10,
    Fiq = 0x11,
    Irq = 0x12,
    Supervisor = 0x13,
    Abort = 0x17,
    Undefined = 0x1B,
    System = 0x1F,
}

impl Mode {
    #[inline]
    pub const fn is_privileged(self) -> bool {
        !matches!(self, Mode::User)
    }

    /// Whether the mode has its own SPSR and banked R13/R14.
    #[inline]
    pub const fn is_exception(self) -> bool {
        !matches!(self, Mode::User | Mode::System)
    }

    #[inline]
    pub const fn try_from_raw(value: u8) -> Option<Self> {
        Some(match value & 0x1F {
            0x10 => Mode::User,
            0x11 => Mode::Fiq,
            0x12 => Mode::Irq,
            0x13 => Mode::Supervisor,
            0x17 => Mode::Abort,
            0x1B => Mode::Undefined,
            0x1F => Mode::System,
            _ => return None,
        })
    }
}

impl TryFrom<u8> for Mode {
    type Error = ();

    #[inline]
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from_raw(value).ok_or(())
    }
}

impl From<Mode> for u8 {
    #[inline]
    fn from(mode: Mode) -> Self {
        mode as u8
    }
}

// Defined CPSR bits on ARMv6K: NZCVQ (31-27), J (24), GE (19-16), E (9),
// A (8), I (7), F (6), T (5), M (4-0).
#[inline]
const fn apply_psr_mask(value: u32) -> u32 {
    value & 0xF90F_03FF
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Cpsr(u32): Debug {
        pub raw: u32 [read_only] @ ..,
        pub mode_raw: u8 @ 0..=4,
        pub thumb_state: bool @ 5,
        pub fiqs_disabled: bool @ 6,
        pub irqs_disabled: bool @ 7,
        pub aborts_disabled: bool @ 8,
        pub big_endian: bool @ 9,
        pub ge: u8 @ 16..=19,
        pub jazelle_state: bool @ 24,
        pub sticky_overflow: bool @ 27,
        pub overflow: bool @ 28,
        pub carry: bool @ 29,
        pub zero: bool @ 30,
        pub negative: bool @ 31,
    }
}

impl Cpsr {
    #[track_caller]
    #[inline]
    pub fn from_raw(value: u32) -> Self {
        assert!(
            Mode::try_from_raw(value as u8).is_some(),
            "Invalid mode specified"
        );
        Cpsr(apply_psr_mask(value))
    }

    #[inline]
    pub fn try_from_raw(value: u32) -> Option<Self> {
        Mode::try_from_raw(value as u8)?;
        Some(Cpsr(apply_psr_mask(value)))
    }

    #[inline]
    pub fn try_from_spsr(value: Spsr) -> Option<Self> {
        Mode::try_from_raw(value.0 as u8)?;
        Some(Cpsr(apply_psr_mask(value.0)))
    }

    /// The mode field decoded; construction guarantees validity.
    #[inline]
    pub fn mode(self) -> Mode {
        match Mode::try_from_raw(self.mode_raw()) {
            Some(mode) => mode,
            None => unreachable!(),
        }
    }

    #[inline]
    pub fn with_mode(self, mode: Mode) -> Self {
        Cpsr((self.0 & !0x1F) | mode as u32)
    }
}

impl TryFrom<Spsr> for Cpsr {
    type Error = ();

    #[inline]
    fn try_from(value: Spsr) -> Result<Self, Self::Error> {
        Self::try_from_spsr(value).ok_or(())
    }
}

proc_bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Spsr(u32): Debug {
        pub raw: u32 [read_only] @ ..,
        pub mode_raw: u8 @ 0..=4,
        pub thumb_state: bool @ 5,
        pub fiqs_disabled: bool @ 6,
        pub irqs_disabled: bool @ 7,
        pub aborts_disabled: bool @ 8,
        pub big_endian: bool @ 9,
        pub ge: u8 @ 16..=19,
        pub sticky_overflow: bool @ 27,
        pub overflow: bool @ 28,
        pub carry: bool @ 29,
        pub zero: bool @ 30,
        pub negative: bool @ 31,
    }
}

impl Spsr {
    #[inline]
    pub fn from_raw(value: u32) -> Self {
        Spsr(apply_psr_mask(value))
    }
}

impl From<Cpsr> for Spsr {
    #[inline]
    fn from(other: Cpsr) -> Self {
        Spsr(other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_decoding() {
        assert_eq!(Mode::try_from_raw(0x13), Some(Mode::Supervisor));
        assert_eq!(Mode::try_from_raw(0x1F), Some(Mode::System));
        assert_eq!(Mode::try_from_raw(0x16), None);
        assert!(Mode::Supervisor.is_privileged());
        assert!(Mode::Supervisor.is_exception());
        assert!(!Mode::System.is_exception());
        assert!(!Mode::User.is_privileged());
    }

    #[test]
    fn reserved_bits_read_as_zero() {
        let cpsr = Cpsr::from_raw(0xFFFF_FFF3 | 0x1F);
        assert_eq!(cpsr.raw() & !0xF90F_03FF, 0);
    }

    #[test]
    fn spsr_round_trip() {
        let cpsr = Cpsr::from_raw(0x6000_0011);
        let spsr = Spsr::from(cpsr);
        assert_eq!(Cpsr::try_from_spsr(spsr), Some(cpsr));
    }
}
