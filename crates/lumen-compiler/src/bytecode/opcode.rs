//! Bytecode operation codes.
//!
//! Each opcode is a single byte, with operands following inline in
//! big-endian order.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Bytecode operation codes.
///
/// The VM is a stack machine. Operations pop their operands and push their
/// result. Stores (`Set*`) leave the stored value on the stack so assignment
/// can be used as an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants
    // =========================================================================
    /// Push constant from pool.
    /// Operand: u16 constant index
    Constant = 0,
    PushUndefined,
    PushNull,
    PushTrue,
    PushFalse,

    // =========================================================================
    // Stack Operations
    // =========================================================================
    Pop,
    Dup,

    // =========================================================================
    // Variables
    // =========================================================================
    /// Operand: u16 frame slot
    GetLocal,
    /// Operand: u16 frame slot
    SetLocal,
    /// Load from an enclosing environment.
    /// Operands: u8 depth, u16 slot
    GetEnv,
    /// Operands: u8 depth, u16 slot
    SetEnv,
    /// Read a property of the global object; `undefined` when absent.
    /// Operand: u16 name constant
    GetGlobal,
    /// Operand: u16 name constant
    SetGlobal,
    /// Push the result of deleting a global object property.
    /// Operand: u16 name constant
    DeleteGlobal,

    // =========================================================================
    // Dynamic scope chain (inside `with`)
    // =========================================================================
    /// Operand: u16 name constant
    GetName,
    /// Operand: u16 name constant
    SetName,
    /// Pops the arguments, resolves the name on the scope chain and calls it.
    /// Operands: u16 name constant, u8 argument count
    CallName,
    /// Operand: u16 name constant
    DeleteName,

    // =========================================================================
    // Members
    // =========================================================================
    /// Stack: [object] -> [value]
    /// Operand: u16 call site
    GetMember,
    /// Stack: [object, value] -> [value]
    /// Operand: u16 call site
    SetMember,
    /// Stack: [object] -> [bool]
    /// Operand: u16 name constant
    DeleteMember,

    // =========================================================================
    // Calls
    // =========================================================================
    /// Stack: [callee, args...] -> [result]; receiver is the global object.
    /// Operand: u16 call site
    CallGlobal,
    /// Stack: [receiver, args...] -> [result]
    /// Operand: u16 call site
    InvokeMember,
    /// Stack: [callee, args...] -> [result]; receiver is the global object.
    /// Operand: u8 argument count
    Call,

    // =========================================================================
    // Objects and functions
    // =========================================================================
    /// Push a new function object closing over the current environment.
    /// Operand: u16 function index
    Closure,
    /// Push a new ordinary object.
    NewObject,
    /// Stack: [object, value] -> [object]
    /// Operand: u16 name constant
    InitProperty,
    GetThis,
    /// Push the function object being executed; `undefined` in program code.
    GetCallee,

    // =========================================================================
    // Operators
    // =========================================================================
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Plus,
    Not,
    Typeof,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,

    // =========================================================================
    // Control Flow
    // =========================================================================
    /// Operand: u16 forward offset
    Jump,
    /// Pops the condition.
    /// Operand: u16 forward offset
    JumpIfFalse,
    /// Jumps keeping the value when falsy, pops it otherwise (`&&`).
    /// Operand: u16 forward offset
    JumpIfFalseOrPop,
    /// Jumps keeping the value when truthy, pops it otherwise (`||`).
    /// Operand: u16 forward offset
    JumpIfTrueOrPop,
    /// Operand: u16 backward offset
    Loop,

    // =========================================================================
    // Scoping and exceptions
    // =========================================================================
    /// Pops an object and pushes it onto the scope chain.
    EnterWith,
    ExitWith,
    /// Installs a handler for the protected block.
    /// Operand: u16 forward offset to the handler
    TryBegin,
    /// Removes the innermost handler.
    TryEnd,
    Throw,

    // =========================================================================
    // Returns
    // =========================================================================
    Return,
    ReturnUndefined,
}

impl OpCode {
    /// Decode an opcode byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Size of the inline operands in bytes, excluding the opcode itself.
    pub fn operand_size(&self) -> usize {
        match self {
            OpCode::Call => 1,

            OpCode::Constant
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::GetGlobal
            | OpCode::SetGlobal
            | OpCode::DeleteGlobal
            | OpCode::GetName
            | OpCode::SetName
            | OpCode::DeleteName
            | OpCode::GetMember
            | OpCode::SetMember
            | OpCode::DeleteMember
            | OpCode::CallGlobal
            | OpCode::InvokeMember
            | OpCode::Closure
            | OpCode::InitProperty
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::JumpIfFalseOrPop
            | OpCode::JumpIfTrueOrPop
            | OpCode::Loop
            | OpCode::TryBegin => 2,

            OpCode::GetEnv | OpCode::SetEnv | OpCode::CallName => 3,

            OpCode::PushUndefined
            | OpCode::PushNull
            | OpCode::PushTrue
            | OpCode::PushFalse
            | OpCode::Pop
            | OpCode::Dup
            | OpCode::NewObject
            | OpCode::GetThis
            | OpCode::GetCallee
            | OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Mod
            | OpCode::Neg
            | OpCode::Plus
            | OpCode::Not
            | OpCode::Typeof
            | OpCode::Less
            | OpCode::LessEqual
            | OpCode::Greater
            | OpCode::GreaterEqual
            | OpCode::Equal
            | OpCode::NotEqual
            | OpCode::StrictEqual
            | OpCode::StrictNotEqual
            | OpCode::EnterWith
            | OpCode::ExitWith
            | OpCode::TryEnd
            | OpCode::Throw
            | OpCode::Return
            | OpCode::ReturnUndefined => 0,
        }
    }

    /// Get the name of this opcode for disassembly.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Constant => "CONSTANT",
            OpCode::PushUndefined => "PUSH_UNDEFINED",
            OpCode::PushNull => "PUSH_NULL",
            OpCode::PushTrue => "PUSH_TRUE",
            OpCode::PushFalse => "PUSH_FALSE",
            OpCode::Pop => "POP",
            OpCode::Dup => "DUP",
            OpCode::GetLocal => "GET_LOCAL",
            OpCode::SetLocal => "SET_LOCAL",
            OpCode::GetEnv => "GET_ENV",
            OpCode::SetEnv => "SET_ENV",
            OpCode::GetGlobal => "GET_GLOBAL",
            OpCode::SetGlobal => "SET_GLOBAL",
            OpCode::DeleteGlobal => "DELETE_GLOBAL",
            OpCode::GetName => "GET_NAME",
            OpCode::SetName => "SET_NAME",
            OpCode::CallName => "CALL_NAME",
            OpCode::DeleteName => "DELETE_NAME",
            OpCode::GetMember => "GET_MEMBER",
            OpCode::SetMember => "SET_MEMBER",
            OpCode::DeleteMember => "DELETE_MEMBER",
            OpCode::CallGlobal => "CALL_GLOBAL",
            OpCode::InvokeMember => "INVOKE_MEMBER",
            OpCode::Call => "CALL",
            OpCode::Closure => "CLOSURE",
            OpCode::NewObject => "NEW_OBJECT",
            OpCode::InitProperty => "INIT_PROPERTY",
            OpCode::GetThis => "GET_THIS",
            OpCode::GetCallee => "GET_CALLEE",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Neg => "NEG",
            OpCode::Plus => "PLUS",
            OpCode::Not => "NOT",
            OpCode::Typeof => "TYPEOF",
            OpCode::Less => "LESS",
            OpCode::LessEqual => "LESS_EQUAL",
            OpCode::Greater => "GREATER",
            OpCode::GreaterEqual => "GREATER_EQUAL",
            OpCode::Equal => "EQUAL",
            OpCode::NotEqual => "NOT_EQUAL",
            OpCode::StrictEqual => "STRICT_EQUAL",
            OpCode::StrictNotEqual => "STRICT_NOT_EQUAL",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::JumpIfFalseOrPop => "JUMP_IF_FALSE_OR_POP",
            OpCode::JumpIfTrueOrPop => "JUMP_IF_TRUE_OR_POP",
            OpCode::Loop => "LOOP",
            OpCode::EnterWith => "ENTER_WITH",
            OpCode::ExitWith => "EXIT_WITH",
            OpCode::TryBegin => "TRY_BEGIN",
            OpCode::TryEnd => "TRY_END",
            OpCode::Throw => "THROW",
            OpCode::Return => "RETURN",
            OpCode::ReturnUndefined => "RETURN_UNDEFINED",
        }
    }

    /// Whether this opcode transfers control by a relative offset.
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            OpCode::Jump
                | OpCode::JumpIfFalse
                | OpCode::JumpIfFalseOrPop
                | OpCode::JumpIfTrueOrPop
                | OpCode::Loop
                | OpCode::TryBegin
        )
    }
}
