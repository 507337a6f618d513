use dcpu::cpu::memory::KEYBOARD_START;
use dcpu::cpu::{decode, encode, Opcode};
use dcpu::{Cpu, Register, Word};
use proptest::prelude::*;

const NEXT_WORD: u8 = 0x1F;

fn run(program: &[Word]) -> Cpu {
    let mut cpu = Cpu::new();
    cpu.load_program(program).unwrap();
    cpu.run_limited(100).unwrap();
    cpu
}

/// `SET A, x` then `<op> A, y`, both with inline words.
fn binary_op(op: Opcode, x: Word, y: Word) -> Cpu {
    run(&[
        encode(Opcode::Set, 0x00, NEXT_WORD),
        x,
        encode(op, 0x00, NEXT_WORD),
        y,
    ])
}

fn any_register() -> impl Strategy<Value = Register> {
    prop::sample::select(vec![
        Register::A,
        Register::B,
        Register::C,
        Register::X,
        Register::Y,
        Register::Z,
        Register::I,
        Register::J,
        Register::Pc,
        Register::Sp,
        Register::O,
    ])
}

proptest! {
    #[test]
    fn test_register_write_then_read(register in any_register(), value in any::<u16>()) {
        let mut cpu = Cpu::new();
        cpu.regs.set(register, value);
        prop_assert_eq!(cpu.register(register), value);
    }

    #[test]
    fn test_add_matches_wide_arithmetic(x in any::<u16>(), y in any::<u16>()) {
        let cpu = binary_op(Opcode::Add, x, y);
        let wide = u32::from(x) + u32::from(y);
        prop_assert_eq!(cpu.register(Register::A), wide as u16);
        prop_assert_eq!(cpu.overflow(), if wide > 0xFFFF { 1 } else { 0 });
    }

    #[test]
    fn test_sub_matches_wide_arithmetic(x in any::<u16>(), y in any::<u16>()) {
        let cpu = binary_op(Opcode::Sub, x, y);
        prop_assert_eq!(cpu.register(Register::A), x.wrapping_sub(y));
        prop_assert_eq!(cpu.overflow(), if y > x { 0xFFFF } else { 0 });
    }

    #[test]
    fn test_mul_overflow_is_high_word(x in any::<u16>(), y in any::<u16>()) {
        let cpu = binary_op(Opcode::Mul, x, y);
        let wide = u32::from(x) * u32::from(y);
        prop_assert_eq!(cpu.register(Register::A), wide as u16);
        prop_assert_eq!(cpu.overflow(), (wide >> 16) as u16);
    }

    #[test]
    fn test_keyboard_read_is_one_shot(offset in 0u16..16, key in 1u16..) {
        let addr = KEYBOARD_START + offset;

        let mut cpu = Cpu::new();
        cpu.write_memory(addr, key);
        prop_assert_eq!(cpu.read_memory(addr), key);
        prop_assert_eq!(cpu.read_memory(addr), 0);
    }

    #[test]
    fn test_push_then_pop_restores_stack(value in any::<u16>(), sp in any::<u16>()) {
        // SET PUSH, value; SET B, POP
        let program = [
            encode(Opcode::Set, 0x1A, NEXT_WORD),
            value,
            encode(Opcode::Set, 0x01, 0x18),
        ];
        let mut cpu = Cpu::new();
        cpu.load_program(&program).unwrap();
        prop_assume!(!(0..=3).contains(&sp.wrapping_sub(1)));
        cpu.set_sp(sp);
        cpu.run_limited(2).unwrap();

        prop_assert_eq!(cpu.register(Register::B), value);
        prop_assert_eq!(cpu.sp(), sp);
    }

    #[test]
    fn test_decode_never_panics(word in any::<u16>()) {
        match decode(word) {
            Some(instr) => prop_assert!(instr.len() >= 1 && instr.len() <= 3),
            None => prop_assert_eq!(word & 0x000F, 0),
        }
    }
}
