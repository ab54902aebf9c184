/// Binary operators, lowest to highest binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Logical
    /// Logical OR (`or`, short-circuiting)
    Or,
    /// Logical AND (`and`, short-circuiting)
    And,

    // Relational
    /// Less than (`<`)
    Lt,
    /// Greater than (`>`)
    Gt,
    /// Less than or equal (`<=`)
    Le,
    /// Greater than or equal (`>=`)
    Ge,
    /// Not equal (`~=`)
    Ne,
    /// Equal (`==`)
    Eq,

    // Bitwise
    /// Bitwise OR (`|`)
    BitOr,
    /// Bitwise XOR (`~`)
    BitXor,
    /// Bitwise AND (`&`)
    BitAnd,
    /// Left shift (`<<`)
    Shl,
    /// Right shift (`>>`)
    Shr,

    /// String concatenation (`..`, right-associative)
    Concat,

    // Arithmetic
    /// Addition (`+`)
    Add,
    /// Subtraction (`-`)
    Sub,
    /// Multiplication (`*`)
    Mul,
    /// Float division (`/`)
    Div,
    /// Floor division (`//`)
    IntDiv,
    /// Modulo (`%`)
    Mod,
    /// Exponentiation (`^`, right-associative)
    Pow,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// Logical negation (`not`)
    Not,
    /// Length (`#`)
    Len,
    /// Arithmetic negation (`-`)
    Neg,
    /// Bitwise NOT (`~`)
    BitNot,
}

impl BinOp {
    /// Left and right binding powers for precedence-climbing.
    ///
    /// Right-associative operators (`..`, `^`) have a right power below
    /// their left power so the recursive call re-enters at the same level.
    pub fn binding_power(self) -> (u8, u8) {
        match self {
            BinOp::Or => (1, 2),
            BinOp::And => (3, 4),
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::Ne | BinOp::Eq => (5, 6),
            BinOp::BitOr => (7, 8),
            BinOp::BitXor => (9, 10),
            BinOp::BitAnd => (11, 12),
            BinOp::Shl | BinOp::Shr => (13, 14),
            BinOp::Concat => (18, 17),
            BinOp::Add | BinOp::Sub => (19, 20),
            BinOp::Mul | BinOp::Div | BinOp::IntDiv | BinOp::Mod => (21, 22),
            // Unary sits at 25; ^ binds tighter on the left.
            BinOp::Pow => (28, 27),
        }
    }
}

/// Binding power of unary operators (between `*` and `^`).
pub const UNARY_POWER: u8 = 25;
