mod alu_utils;
mod common;
mod exec;
mod regs;
mod translate;

pub use regs::Regs;

use crate::cpu::bus::Bus;
use ahash::RandomState;
use std::collections::HashMap;
use translate::Arena;

/// One CPU's interpreter context: architectural state plus the translation
/// arena and block-start cache. Nothing here is shared; emulating several
/// cores means instantiating several of these.
pub struct Interpreter {
    pub regs: Regs,
    arena: Arena,
    /// Guest PC (with the Thumb bit in bit 0) -> arena offset of the first
    /// record of the block starting there. Never invalidated during a run;
    /// self-modifying guest code is not supported.
    blocks: HashMap<u32, u32, RandomState>,
    exclusive_addr: Option<u32>,
    shifter_carry: bool,
    logger: slog::Logger,
}

impl Interpreter {
    pub fn new(logger: slog::Logger) -> Self {
        Interpreter {
            regs: Regs::new(),
            arena: Arena::new(),
            blocks: HashMap::default(),
            exclusive_addr: None,
            shifter_carry: false,
            logger,
        }
    }

    /// Runs the interpreter until `budget` instructions have retired, an
    /// enabled interrupt is pending, or the run is ended by an undefined
    /// instruction, decode failure or fetch exception. Returns the number
    /// of retired instructions; condition-failed instructions retire too.
    pub fn run<B: Bus>(&mut self, bus: &mut B, budget: u64) -> u64 {
        let mut retired = 0;
        'dispatch: loop {
            if bus.irq_asserted() && !self.regs.cpsr().irqs_disabled() {
                break;
            }
            let thumb = self.regs.cpsr().thumb_state();
            self.regs.cur[15] &= if thumb { !1 } else { !3 };
            let pc = self.regs.cur[15];
            let start = match self.blocks.get(&(pc | thumb as u32)) {
                Some(&offset) => offset,
                None => match self.translate_block(bus, pc, thumb) {
                    Ok(offset) => offset,
                    Err(translate::FetchExc) => {
                        slog::error!(self.logger, "Instruction fetch exception at {:#010X}", pc);
                        break;
                    }
                },
            };
            let mut ptr = start;
            loop {
                if retired >= budget {
                    break 'dispatch;
                }
                retired += 1;
                let record = self.arena.get(ptr);
                let passed =
                    record.cond >= 0xE || self.regs.cpsr().satisfies_condition(record.cond);
                let ctrl = if passed {
                    exec::execute(self, bus, &record)
                } else {
                    exec::Ctrl::Next
                };
                match ctrl {
                    exec::Ctrl::Next => {
                        self.regs.cur[15] = self.regs.cur[15].wrapping_add(record.size as u32);
                        ptr += 1;
                        if record.flow.is_block_end() {
                            continue 'dispatch;
                        }
                    }
                    exec::Ctrl::Jump => continue 'dispatch,
                    exec::Ctrl::Exit => break 'dispatch,
                }
            }
        }
        retired
    }
}

#[cfg(test)]
mod tests {
    use super::translate::Flow;
    use super::*;
    use slog::Logger;

    struct Ram {
        bytes: Vec<u8>,
    }

    impl Ram {
        fn new(size: usize) -> Self {
            Ram {
                bytes: vec![0; size],
            }
        }

        fn store_32(&mut self, addr: u32, value: u32) {
            self.bytes[addr as usize..addr as usize + 4].copy_from_slice(&value.to_le_bytes());
        }
    }

    impl Bus for Ram {
        fn read_8(&mut self, addr: u32) -> u8 {
            self.bytes[addr as usize]
        }

        fn read_16(&mut self, addr: u32) -> u16 {
            let addr = addr as usize;
            u16::from_le_bytes(self.bytes[addr..addr + 2].try_into().unwrap())
        }

        fn read_32(&mut self, addr: u32) -> u32 {
            let addr = addr as usize;
            u32::from_le_bytes(self.bytes[addr..addr + 4].try_into().unwrap())
        }

        fn write_8(&mut self, addr: u32, value: u8) {
            self.bytes[addr as usize] = value;
        }

        fn write_16(&mut self, addr: u32, value: u16) {
            self.bytes[addr as usize..addr as usize + 2].copy_from_slice(&value.to_le_bytes());
        }

        fn write_32(&mut self, addr: u32, value: u32) {
            self.store_32(addr, value);
        }
    }

    fn interp() -> Interpreter {
        Interpreter::new(Logger::root(slog::Discard, slog::o!()))
    }

    #[test]
    fn block_builder_caches_and_classifies() {
        let mut ram = Ram::new(0x4000);
        ram.store_32(0x1000, 0xE3A0_0001); // MOV R0, #1
        ram.store_32(0x1004, 0xE3A0_1002); // MOV R1, #2
        ram.store_32(0x1008, 0xE080_2001); // ADD R2, R0, R1
        ram.store_32(0x100C, 0xEA00_0000); // B .+8
        let mut cpu = interp();
        cpu.regs.cur[15] = 0x1000;
        let start = cpu.translate_block(&mut ram, 0x1000, false).ok().unwrap();
        assert_eq!(cpu.blocks.get(&0x1000), Some(&start));
        assert_eq!(cpu.arena.next_offset() - start, 4);
        for i in 0..3 {
            assert!(!cpu.arena.get(start + i).flow.is_block_end());
        }
        assert!(cpu
            .arena
            .get(start + 3)
            .flow
            .contains(Flow::DIRECT_BRANCH));
    }

    #[test]
    fn block_ends_at_page_boundary() {
        let mut ram = Ram::new(0x4000);
        for i in 0..0x400 {
            ram.store_32(0x1000 + i * 4, 0xE3A0_0001);
        }
        let mut cpu = interp();
        let start = cpu.translate_block(&mut ram, 0x1F00, false).ok().unwrap();
        // 64 instructions fit before the 0x2000 page boundary
        assert_eq!(cpu.arena.next_offset() - start, 64);
        let last = cpu.arena.get(start + 63);
        assert!(last.flow.contains(Flow::END_OF_PAGE));
    }

    #[test]
    fn run_executes_straight_line_code() {
        let mut ram = Ram::new(0x4000);
        ram.store_32(0x1000, 0xE3A0_0001); // MOV R0, #1
        ram.store_32(0x1004, 0xE280_0005); // ADD R0, R0, #5
        ram.store_32(0x1008, 0xEAFF_FFFE); // B . (spin)
        let mut cpu = interp();
        cpu.regs.cur[15] = 0x1000;
        let retired = cpu.run(&mut ram, 3);
        assert_eq!(retired, 3);
        assert_eq!(cpu.regs.cur[0], 6);
        assert_eq!(cpu.regs.cur[15], 0x1008);
    }

    #[test]
    fn blocks_are_reused_across_runs() {
        let mut ram = Ram::new(0x4000);
        ram.store_32(0x1000, 0xE280_0001); // ADD R0, R0, #1
        ram.store_32(0x1004, 0xEAFF_FFFD); // B 0x1000
        let mut cpu = interp();
        cpu.regs.cur[15] = 0x1000;
        cpu.run(&mut ram, 20);
        let translated = cpu.arena.next_offset();
        cpu.regs.cur[15] = 0x1000;
        cpu.run(&mut ram, 20);
        assert_eq!(cpu.arena.next_offset(), translated);
        assert_eq!(cpu.blocks.len(), 1);
    }

    #[test]
    fn fetch_exception_ends_the_run() {
        struct Faulting(Ram);
        impl Bus for Faulting {
            fn read_8(&mut self, addr: u32) -> u8 {
                self.0.read_8(addr)
            }
            fn read_16(&mut self, addr: u32) -> u16 {
                self.0.read_16(addr)
            }
            fn read_32(&mut self, addr: u32) -> u32 {
                self.0.read_32(addr)
            }
            fn write_8(&mut self, addr: u32, value: u8) {
                self.0.write_8(addr, value);
            }
            fn write_16(&mut self, addr: u32, value: u16) {
                self.0.write_16(addr, value);
            }
            fn write_32(&mut self, addr: u32, value: u32) {
                self.0.write_32(addr, value);
            }
            fn fetch_32(&mut self, addr: u32) -> Option<u32> {
                (addr < 0x2000).then(|| self.0.read_32(addr))
            }
        }
        let mut ram = Ram::new(0x4000);
        ram.store_32(0x1FFC, 0xE3A0_0007); // MOV R0, #7, last word of the page
        let mut bus = Faulting(ram);
        let mut cpu = interp();
        cpu.regs.cur[15] = 0x1FFC;
        let retired = cpu.run(&mut bus, 10);
        assert_eq!(retired, 1);
        assert_eq!(cpu.regs.cur[0], 7);
        assert_eq!(cpu.regs.cur[15], 0x2000);
    }
}
