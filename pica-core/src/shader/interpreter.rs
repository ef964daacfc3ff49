use crate::debug::DebugHook;
use crate::float24::{Float24, Vec4};
use crate::shader::disassemble;
use crate::shader::instruction::{DestRegister, Instruction, OpCode, SourceRegister, SwizzlePattern};
use crate::shader::{
    InputVertex, OutputSemantic, OutputVertex, ShaderSetup, NUM_OUTPUT_REGISTERS,
    PROGRAM_MEMORY_LEN,
};
use std::array;

const NUM_INPUT_REGISTERS: usize = 16;
const NUM_TEMPORARY_REGISTERS: usize = 16;
// Return addresses only; an empty stack means END terminates
const CALL_STACK_DEPTH: usize = 8;

/// Program extents observed while running a shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugCounters {
    /// One past the highest program counter that was executed
    pub max_offset: u32,
    /// One past the highest operand descriptor used by an arithmetic instruction
    pub max_opdesc_id: u32,
}

pub(super) struct VertexShaderState {
    program_counter: u32,
    input_registers: [Vec4; NUM_INPUT_REGISTERS],
    temporary_registers: [Vec4; NUM_TEMPORARY_REGISTERS],
    output_register_table: [usize; 4 * NUM_OUTPUT_REGISTERS],
    // Condition flags; no implemented opcode reads or writes them
    #[allow(dead_code)]
    status_registers: [bool; 2],
    call_stack: [u32; CALL_STACK_DEPTH],
    call_stack_len: usize,
    pub(super) debug: DebugCounters,
}

impl VertexShaderState {
    pub(super) fn new(setup: &ShaderSetup, input: &InputVertex, num_attributes: usize) -> Self {
        let mut input_registers = [[Float24::ZERO; 4]; NUM_INPUT_REGISTERS];
        for (attribute, &value) in input.attributes.iter().take(num_attributes).enumerate() {
            let register = setup.input_register_map().register_for_attribute(attribute);
            input_registers[register] = value;
        }

        let mut output_register_table = [OutputSemantic::INVALID; 4 * NUM_OUTPUT_REGISTERS];
        for (register, map) in setup.output_maps().iter().enumerate() {
            output_register_table[4 * register..4 * register + 4]
                .copy_from_slice(&map.semantics());
        }

        Self {
            program_counter: setup.main_offset(),
            input_registers,
            temporary_registers: [[Float24::ZERO; 4]; NUM_TEMPORARY_REGISTERS],
            output_register_table,
            status_registers: [false; 2],
            call_stack: [0; CALL_STACK_DEPTH],
            call_stack_len: 0,
            debug: DebugCounters::default(),
        }
    }

    pub(super) fn run<H: DebugHook + ?Sized>(
        &mut self,
        setup: &ShaderSetup,
        output: &mut OutputVertex,
        debug_hook: &mut H,
    ) {
        loop {
            let pc = self.program_counter;
            assert!(
                (pc as usize) < PROGRAM_MEMORY_LEN,
                "Shader program counter left program memory: {pc:X}"
            );

            let instruction = Instruction(setup.program()[pc as usize]);
            self.debug.max_offset = self.debug.max_offset.max(pc + 1);

            if log::log_enabled!(log::Level::Trace) {
                log::trace!(
                    "Executing shader opcode {:08X} at PC {pc:03X}: {}",
                    instruction.0,
                    disassemble::instruction_str(instruction, setup.swizzle_data())
                );
            }
            debug_hook.instruction_executed(pc, instruction);

            let opcode = OpCode::from_bits(instruction.opcode());
            match opcode {
                OpCode::Add
                | OpCode::Mul
                | OpCode::Dp3
                | OpCode::Dp4
                | OpCode::Rcp
                | OpCode::Rsq
                | OpCode::Mov => {
                    self.execute_arithmetic(opcode, instruction, setup, output);
                }
                OpCode::Nop => {}
                OpCode::End => {
                    if self.call_stack_len == 0 {
                        break;
                    }

                    // Resume after the CALL instruction
                    self.call_stack_len -= 1;
                    self.program_counter = self.call_stack[self.call_stack_len];
                }
                OpCode::Call => {
                    self.call(instruction);
                    continue;
                }
                _ => {
                    log::error!(
                        "Unhandled shader instruction at PC {pc:03X}: {:02X} ({}): {:08X}",
                        instruction.opcode(),
                        opcode.name(),
                        instruction.0
                    );
                }
            }

            self.program_counter += 1;
        }
    }

    // CALL: Call subroutine
    fn call(&mut self, instruction: Instruction) {
        assert!(
            self.call_stack_len < CALL_STACK_DEPTH,
            "Shader call stack overflow at PC {:03X}",
            self.program_counter
        );

        self.call_stack[self.call_stack_len] = self.program_counter;
        self.call_stack_len += 1;
        self.program_counter = instruction.dest_offset().into();
    }

    fn execute_arithmetic(
        &mut self,
        opcode: OpCode,
        instruction: Instruction,
        setup: &ShaderSetup,
        output: &mut OutputVertex,
    ) {
        let operand_desc_id = instruction.operand_desc_id();
        self.debug.max_opdesc_id = self.debug.max_opdesc_id.max(u32::from(operand_desc_id) + 1);

        let swizzle = SwizzlePattern(setup.swizzle_data()[usize::from(operand_desc_id)]);

        let inverted = opcode.is_src_inverted();
        let src1 = self.read_source(instruction.source1(inverted), setup);
        let src2 = self.read_source(instruction.source2(inverted), setup);

        let mut src1: Vec4 = array::from_fn(|lane| src1[swizzle.src1_lane(lane)]);
        let src2: Vec4 = array::from_fn(|lane| src2[swizzle.src2_lane(lane)]);
        if swizzle.negate_src1() {
            src1 = src1.map(|value| -value);
        }

        let Some(dest) = DestRegister::from_raw(instruction.dest()) else {
            panic!(
                "Shader instruction {:08X} at PC {:03X} has invalid destination register {:02X}",
                instruction.0,
                self.program_counter,
                instruction.dest()
            );
        };

        let result: Vec4 = match opcode {
            // ADD: Add
            OpCode::Add => array::from_fn(|lane| src1[lane] + src2[lane]),
            // MUL: Multiply
            OpCode::Mul => array::from_fn(|lane| src1[lane] * src2[lane]),
            // DP3: 3-component dot product
            OpCode::Dp3 => [dot(&src1[..3], &src2[..3]); 4],
            // DP4: 4-component dot product
            OpCode::Dp4 => [dot(&src1, &src2); 4],
            // RCP: Reciprocal
            OpCode::Rcp => src1.map(Float24::recip),
            // RSQ: Reciprocal square root
            OpCode::Rsq => src1.map(Float24::rsqrt),
            // MOV: Move
            OpCode::Mov => src1,
            _ => unreachable!("execute_arithmetic is only called for arithmetic opcodes"),
        };

        for lane in 0..4 {
            if swizzle.dest_lane_enabled(lane) {
                self.write_dest(dest, lane, result[lane], output);
            }
        }
    }

    fn read_source(&self, register: SourceRegister, setup: &ShaderSetup) -> Vec4 {
        match register {
            SourceRegister::Input(index) => self.input_registers[index],
            SourceRegister::Temporary(index) => self.temporary_registers[index],
            SourceRegister::FloatUniform(index) => setup.uniforms()[index],
        }
    }

    fn write_dest(&mut self, dest: DestRegister, lane: usize, value: Float24, output: &mut OutputVertex) {
        match dest {
            DestRegister::Output(index) => {
                let slot = self.output_register_table[4 * index + lane];
                output.slots_mut()[slot] = value;
            }
            DestRegister::Temporary(index) => {
                self.temporary_registers[index][lane] = value;
            }
        }
    }
}

fn dot(a: &[Float24], b: &[Float24]) -> Float24 {
    a.iter().zip(b).fold(Float24::ZERO, |sum, (&a, &b)| sum + a * b)
}
