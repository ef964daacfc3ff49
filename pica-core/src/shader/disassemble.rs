use crate::shader::instruction::{DestRegister, Instruction, OpCode, SwizzlePattern};

#[must_use]
pub fn instruction_str(instruction: Instruction, swizzle_data: &[u32]) -> String {
    let opcode = OpCode::from_bits(instruction.opcode());
    match opcode {
        OpCode::Add | OpCode::Mul | OpCode::Dp3 | OpCode::Dp4 => arithmetic_str(opcode, instruction, swizzle_data, 2),
        OpCode::Rcp | OpCode::Rsq | OpCode::Mov => arithmetic_str(opcode, instruction, swizzle_data, 1),
        OpCode::Nop | OpCode::End => opcode.name().into(),
        OpCode::Call => format!(
            "CALL {:03X}, {}",
            instruction.dest_offset(),
            instruction.num_instructions()
        ),
        OpCode::Unknown(bits) => format!("??? (opcode {bits:02X})"),
        _ => format!("{} (unimplemented)", opcode.name()),
    }
}

fn arithmetic_str(
    opcode: OpCode,
    instruction: Instruction,
    swizzle_data: &[u32],
    num_sources: usize,
) -> String {
    let swizzle = swizzle_data
        .get(usize::from(instruction.operand_desc_id()))
        .map_or(SwizzlePattern::default(), |&word| SwizzlePattern(word));

    let dest = match DestRegister::from_raw(instruction.dest()) {
        Some(dest) => dest.to_string(),
        None => format!("<invalid {:02X}>", instruction.dest()),
    };

    let inverted = opcode.is_src_inverted();
    let negate = if swizzle.negate_src1() { "-" } else { "" };
    let src1 = format!("{negate}{}.{}", instruction.source1(inverted), swizzle.src1_str());

    match num_sources {
        1 => format!("{} {dest}.{}, {src1}", opcode.name(), swizzle.dest_mask_str()),
        _ => format!(
            "{} {dest}.{}, {src1}, {}.{}",
            opcode.name(),
            swizzle.dest_mask_str(),
            instruction.source2(inverted),
            swizzle.src2_str()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY_SWIZZLE: u32 = 0xF | (0b0001_1011 << 5) | (0b0001_1011 << 14);

    #[test]
    fn arithmetic_instructions() {
        let swizzle_data = [IDENTITY_SWIZZLE, 0b1000 | (1 << 4)];

        // MOV o0, v0
        assert_eq!(instruction_str(Instruction(0x4C00_0000), &swizzle_data), "MOV o0.xyzw, v0.xyzw");
        // ADD r1.x, -c2.xxxx, v3.xxxx
        let add = Instruction((0x11 << 21) | (0x22 << 12) | (0x03 << 7) | 1);
        assert_eq!(instruction_str(add, &swizzle_data), "ADD r1.x, -c2.xxxx, v3.xxxx");
    }

    #[test]
    fn flow_control_instructions() {
        assert_eq!(instruction_str(Instruction(0x8800_0000), &[]), "END");
        assert_eq!(instruction_str(Instruction((0x24 << 26) | (0x10 << 10) | 3), &[]), "CALL 010, 3");
        assert_eq!(instruction_str(Instruction(0x29 << 26), &[]), "LOOP (unimplemented)");
        assert_eq!(instruction_str(Instruction(0x10 << 26), &[]), "??? (opcode 10)");
    }
}
