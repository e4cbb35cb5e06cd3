//! Minimal JVM class-file reader.
//!
//! Reads just enough structure for coverage analysis: the class name, the
//! `SourceFile` attribute, and for every method its bytecode instruction
//! offsets and `LineNumberTable`.

use crate::mutf8;
use thiserror::Error;

pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_SYNTHETIC: u16 = 0x1000;

const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Error)]
pub enum ClassParseError {
    #[error("unexpected end of class file")]
    UnexpectedEof,
    #[error("invalid class file magic header")]
    InvalidMagic,
    #[error("unsupported constant pool tag {tag}")]
    UnsupportedConstant { tag: u8 },
    #[error("invalid constant pool index {index}")]
    InvalidConstantIndex { index: u16 },
    #[error("invalid opcode 0x{opcode:02x} at offset {pc}")]
    InvalidOpcode { opcode: u8, pc: usize },
}

#[derive(Debug, Clone)]
pub struct ParsedClass {
    /// VM name, e.g. `com/example/Foo`
    pub name: String,
    pub source_file: Option<String>,
    pub methods: Vec<ParsedMethod>,
}

#[derive(Debug, Clone)]
pub struct ParsedMethod {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub code: Option<MethodCode>,
}

impl ParsedMethod {
    pub fn is_synthetic(&self) -> bool {
        self.access_flags & ACC_SYNTHETIC != 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct MethodCode {
    /// Offset of every instruction, ascending
    pub instructions: Vec<u32>,
    /// `(start_pc, line)` pairs sorted by `start_pc`
    pub line_numbers: Vec<(u32, u32)>,
}

impl MethodCode {
    /// Source line of the instruction at `pc`: the entry with the greatest
    /// `start_pc` not after it.
    pub fn line_for_pc(&self, pc: u32) -> Option<u32> {
        let idx = self.line_numbers.partition_point(|&(start, _)| start <= pc);
        idx.checked_sub(1).map(|i| self.line_numbers[i].1)
    }
}

pub fn parse_class(bytes: &[u8]) -> Result<ParsedClass, ClassParseError> {
    let mut reader = ClassReader::new(bytes);
    reader.expect_magic()?;
    let _minor_version = reader.read_u2()?;
    let _major_version = reader.read_u2()?;
    let constant_pool = ConstantPool::parse(&mut reader)?;

    let _access_flags = reader.read_u2()?;
    let this_class = reader.read_u2()?;
    let _super_class = reader.read_u2()?;

    let interfaces_count = reader.read_u2()?;
    reader.skip(interfaces_count as usize * 2)?;

    let fields_count = reader.read_u2()?;
    for _ in 0..fields_count {
        skip_member(&mut reader)?;
    }

    let methods_count = reader.read_u2()?;
    let mut methods = Vec::with_capacity(methods_count as usize);
    for _ in 0..methods_count {
        methods.push(parse_method(&mut reader, &constant_pool)?);
    }

    let mut source_file = None;
    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        if constant_pool.utf8(name_index)? == "SourceFile" {
            let mut sub_reader = ClassReader::new(reader.read_slice(length)?);
            source_file = Some(constant_pool.utf8(sub_reader.read_u2()?)?.to_string());
        } else {
            reader.skip(length)?;
        }
    }

    Ok(ParsedClass {
        name: constant_pool.class_name(this_class)?,
        source_file,
        methods,
    })
}

fn parse_method(
    reader: &mut ClassReader<'_>,
    constant_pool: &ConstantPool,
) -> Result<ParsedMethod, ClassParseError> {
    let access_flags = reader.read_u2()?;
    let name = constant_pool.utf8(reader.read_u2()?)?.to_string();
    let descriptor = constant_pool.utf8(reader.read_u2()?)?.to_string();

    let mut code = None;
    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let body = reader.read_slice(length)?;
        if constant_pool.utf8(name_index)? == "Code" {
            code = Some(parse_code(body, constant_pool)?);
        }
    }

    Ok(ParsedMethod {
        access_flags,
        name,
        descriptor,
        code,
    })
}

fn parse_code(body: &[u8], constant_pool: &ConstantPool) -> Result<MethodCode, ClassParseError> {
    let mut reader = ClassReader::new(body);
    let _max_stack = reader.read_u2()?;
    let _max_locals = reader.read_u2()?;
    let code_length = reader.read_u4()? as usize;
    let instructions = decode_instructions(reader.read_slice(code_length)?)?;

    let exception_table_length = reader.read_u2()?;
    reader.skip(exception_table_length as usize * 8)?;

    let mut line_numbers = Vec::new();
    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let attribute = reader.read_slice(length)?;
        if constant_pool.utf8(name_index)? == "LineNumberTable" {
            let mut sub_reader = ClassReader::new(attribute);
            let count = sub_reader.read_u2()?;
            for _ in 0..count {
                let start_pc = u32::from(sub_reader.read_u2()?);
                let line = u32::from(sub_reader.read_u2()?);
                line_numbers.push((start_pc, line));
            }
        }
    }
    // Stable: for duplicate start_pc the later entry wins in line_for_pc.
    line_numbers.sort_by_key(|&(start_pc, _)| start_pc);

    Ok(MethodCode {
        instructions,
        line_numbers,
    })
}

/// Decode the offsets of every instruction in a method body.
pub fn decode_instructions(code: &[u8]) -> Result<Vec<u32>, ClassParseError> {
    let mut offsets = Vec::new();
    let mut pc = 0usize;
    while pc < code.len() {
        offsets.push(pc as u32);
        pc += instruction_length(code, pc)?;
    }
    if pc != code.len() {
        return Err(ClassParseError::UnexpectedEof);
    }
    Ok(offsets)
}

fn instruction_length(code: &[u8], pc: usize) -> Result<usize, ClassParseError> {
    let opcode = code[pc];
    let length = match opcode {
        0x00..=0x0f => 1,
        0x10 => 2,               // bipush
        0x11 => 3,               // sipush
        0x12 => 2,               // ldc
        0x13 | 0x14 => 3,        // ldc_w, ldc2_w
        0x15..=0x19 => 2,        // xload
        0x1a..=0x35 => 1,        // xload_n, xaload
        0x36..=0x3a => 2,        // xstore
        0x3b..=0x83 => 1,        // xstore_n, xastore, stack, arithmetic
        0x84 => 3,               // iinc
        0x85..=0x98 => 1,        // conversions, comparisons
        0x99..=0xa8 => 3,        // if*, goto, jsr
        0xa9 => 2,               // ret
        0xaa => {
            // tableswitch
            let base = switch_operands_start(pc);
            let low = read_i32(code, base + 4)?;
            let high = read_i32(code, base + 8)?;
            let entries = (i64::from(high) - i64::from(low) + 1).max(0) as usize;
            base + 12 + entries * 4 - pc
        }
        0xab => {
            // lookupswitch
            let base = switch_operands_start(pc);
            let npairs = read_i32(code, base + 4)?.max(0) as usize;
            base + 8 + npairs * 8 - pc
        }
        0xac..=0xb1 => 1,        // returns
        0xb2..=0xb8 => 3,        // field access, invokevirtual/special/static
        0xb9 | 0xba => 5,        // invokeinterface, invokedynamic
        0xbb => 3,               // new
        0xbc => 2,               // newarray
        0xbd => 3,               // anewarray
        0xbe | 0xbf => 1,        // arraylength, athrow
        0xc0 | 0xc1 => 3,        // checkcast, instanceof
        0xc2 | 0xc3 => 1,        // monitorenter, monitorexit
        0xc4 => {
            // wide
            match code.get(pc + 1) {
                Some(0x84) => 6,
                Some(_) => 4,
                None => return Err(ClassParseError::UnexpectedEof),
            }
        }
        0xc5 => 4,               // multianewarray
        0xc6 | 0xc7 => 3,        // ifnull, ifnonnull
        0xc8 | 0xc9 => 5,        // goto_w, jsr_w
        0xca => 1,               // breakpoint
        _ => return Err(ClassParseError::InvalidOpcode { opcode, pc }),
    };
    if pc + length > code.len() {
        return Err(ClassParseError::UnexpectedEof);
    }
    Ok(length)
}

/// Switch operands start at the next 4-byte boundary after the opcode.
fn switch_operands_start(pc: usize) -> usize {
    (pc + 4) & !3
}

fn read_i32(code: &[u8], at: usize) -> Result<i32, ClassParseError> {
    code.get(at..at + 4)
        .map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(ClassParseError::UnexpectedEof)
}

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Class { name_index: u16 },
    Other,
    Unusable,
}

struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn parse(reader: &mut ClassReader<'_>) -> Result<Self, ClassParseError> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable); // index 0 unused

        let mut index = 1;
        while index < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let length = reader.read_u2()? as usize;
                    let bytes = reader.read_slice(length)?;
                    // Lossy fallback keeps odd constants from failing the class.
                    Constant::Utf8(
                        mutf8::decode(bytes)
                            .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned()),
                    )
                }
                3 | 4 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                5 | 6 => {
                    reader.skip(8)?;
                    entries.push(Constant::Other);
                    index += 1;
                    Constant::Unusable
                }
                7 => Constant::Class {
                    name_index: reader.read_u2()?,
                },
                8 | 16 | 19 | 20 => {
                    reader.skip(2)?;
                    Constant::Other
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                15 => {
                    reader.skip(3)?;
                    Constant::Other
                }
                other => return Err(ClassParseError::UnsupportedConstant { tag: other }),
            };

            entries.push(entry);
            index += 1;
        }

        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Constant, ClassParseError> {
        self.entries
            .get(index as usize)
            .ok_or(ClassParseError::InvalidConstantIndex { index })
    }

    fn utf8(&self, index: u16) -> Result<&str, ClassParseError> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value.as_str()),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }

    fn class_name(&self, index: u16) -> Result<String, ClassParseError> {
        match self.get(index)? {
            Constant::Class { name_index } => Ok(self.utf8(*name_index)?.to_string()),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }
}

struct ClassReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn expect_magic(&mut self) -> Result<(), ClassParseError> {
        if self.read_u4()? != MAGIC {
            return Err(ClassParseError::InvalidMagic);
        }
        Ok(())
    }

    fn read_u1(&mut self) -> Result<u8, ClassParseError> {
        Ok(self.read_slice(1)?[0])
    }

    fn read_u2(&mut self) -> Result<u16, ClassParseError> {
        let b = self.read_slice(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u4(&mut self) -> Result<u32, ClassParseError> {
        let b = self.read_slice(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], ClassParseError> {
        if self.pos + len > self.data.len() {
            return Err(ClassParseError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), ClassParseError> {
        self.read_slice(len).map(|_| ())
    }
}

fn skip_member(reader: &mut ClassReader<'_>) -> Result<(), ClassParseError> {
    reader.read_u2()?; // access_flags
    reader.read_u2()?; // name_index
    reader.read_u2()?; // descriptor_index
    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        reader.read_u2()?; // attribute_name_index
        let length = reader.read_u4()? as usize;
        reader.skip(length)?;
    }
    Ok(())
}
