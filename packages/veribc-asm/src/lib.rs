//! A textual assembler for code objects.
//!
//! A `.bcasm` file holds a single `code` block. Instructions are written as a mnemonic followed by
//! an optional operand, which is either an integer or a `@label` reference:
//!
//! ```text
//! code "<module>" stacksize 1 {
//!     consts { none }
//! loop:
//!     LOAD_CONST 0
//!     POP_JUMP_IF_FALSE @loop
//!     LOAD_CONST 0
//!     RETURN_VALUE
//! }
//! ```

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use logos::Logos;
use smol_str::SmolStr;
use thiserror::Error;
use tracing::debug;
use veribc_diagnostics::span::{FileId, Span, Spanned};
use veribc_diagnostics::{error_report, Diagnostics};
use veribc_isa::{AssembleError, Assembler, CodeObject, Const, InstructionSet};

use self::lexer::Token;

pub mod lexer;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("expected {expected}, found {found}.")]
    ExpectedToken { expected: &'static str, found: Token },
    #[error("unknown instruction `{0}`.")]
    UnknownMnemonic(SmolStr),
    #[error("instruction `{0}` does not jump.")]
    NotAJump(SmolStr),
    #[error("label `{0}` is not defined.")]
    UndefinedLabel(SmolStr),
    #[error("label `{0}` is defined twice.")]
    DuplicateLabel(SmolStr),
    #[error("stack size {0} is out of range.")]
    StackSize(i64),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

pub type Result<T, E = AsmError> = std::result::Result<T, E>;

/// Labels of the code object currently being assembled.
#[derive(Debug, Default)]
struct Labels {
    defs: HashMap<SmolStr, (usize, Span)>,
    /// Jumps waiting for their target, as instruction index and label.
    uses: Vec<(usize, Spanned<SmolStr>)>,
}

pub struct Parser<'isa> {
    isa: &'isa InstructionSet,
    /// All the tokens, starting with [`Token::Start`].
    tokens: Vec<(Token, Range<usize>)>,
    /// An index into `tokens`, representing the current token.
    cursor: usize,
    source_len: usize,
    file_id: FileId,
    diagnostics: Diagnostics,
}

impl<'isa> Parser<'isa> {
    pub fn new(
        isa: &'isa InstructionSet,
        file_id: FileId,
        source: &str,
        diagnostics: Diagnostics,
    ) -> Self {
        let tokens = Some((Token::Start, 0..0))
            .into_iter()
            .chain(Token::lexer(source).spanned())
            .collect();
        Self {
            isa,
            tokens,
            cursor: 0,
            source_len: source.len(),
            file_id,
            diagnostics,
        }
    }

    pub fn eof(&self) -> bool {
        self.peek_next() == &Token::Eof
    }

    /// Get the current token.
    #[must_use]
    pub fn get_current(&self) -> &Token {
        self.tokens
            .get(self.cursor)
            .map(|x| &x.0)
            .unwrap_or(&Token::Eof)
    }

    /// Get the next token and increments the cursor.
    #[must_use]
    pub fn get_next(&mut self) -> &Token {
        self.cursor += 1;
        self.get_current()
    }

    /// Get the next token without incrementing the cursor.
    #[must_use]
    pub fn peek_next(&self) -> &Token {
        self.peek_nth(1)
    }

    /// Get the token that is `n` tokens ahead without incrementing the cursor.
    pub fn peek_nth(&self, n: usize) -> &Token {
        self.tokens
            .get(self.cursor + n)
            .map(|x| &x.0)
            .unwrap_or(&Token::Eof)
    }

    /// Source range of the token at `cursor`. Past the end, this is an empty range at the end of
    /// the input.
    fn range_at(&self, cursor: usize) -> Range<usize> {
        self.tokens
            .get(cursor)
            .map(|x| x.1.clone())
            .unwrap_or(self.source_len..self.source_len)
    }

    fn span(&self, range: Range<usize>) -> Span {
        Span::new(self.file_id, range)
    }

    fn current_span(&self) -> Span {
        self.span(self.range_at(self.cursor))
    }

    /// Records a diagnostic labeled at `span` and returns `err`.
    fn error(&self, err: AsmError, span: Span, label: impl std::fmt::Display) -> AsmError {
        let message = match &err {
            AsmError::ExpectedToken { .. } => "unexpected token".to_string(),
            err => {
                let message = err.to_string();
                message.trim_end_matches('.').to_string()
            }
        };
        self.diagnostics.add(error_report(message, &span, label));
        err
    }

    /// Reports the current token as unexpected.
    fn unexpected(&self, expected: &'static str) -> AsmError {
        let found = self.get_current().clone();
        self.error(
            AsmError::ExpectedToken {
                expected,
                found: found.clone(),
            },
            self.current_span(),
            format!("expected {expected}, found {found}"),
        )
    }

    /// Get the next token and expect it to be the same token as `expected`.
    pub fn expect(&mut self, expected: Token, description: &'static str) -> Result<()> {
        if self.get_next() == &expected {
            Ok(())
        } else {
            Err(self.unexpected(description))
        }
    }

    pub fn parse_int(&mut self) -> Result<Spanned<i64>> {
        match *self.get_next() {
            Token::LitInt(value) => Ok(Spanned(value, self.current_span())),
            _ => Err(self.unexpected("an integer")),
        }
    }

    pub fn parse_str(&mut self) -> Result<SmolStr> {
        match self.get_next() {
            Token::LitStr(value) => Ok(value.clone()),
            _ => Err(self.unexpected("a string")),
        }
    }

    /// Parses a whole file, which must consist of exactly one `code` block.
    pub fn parse_root(&mut self) -> Result<CodeObject> {
        let code = self.parse_code()?;
        if !self.eof() {
            let _ = self.get_next();
            return Err(self.unexpected("end of input"));
        }
        Ok(code)
    }

    /// Parses `code "<name>" stacksize <n> { [consts { ... }] <items> }`.
    pub fn parse_code(&mut self) -> Result<CodeObject> {
        self.expect(Token::KwCode, "`code`")?;
        let name = self.parse_str()?;
        self.expect(Token::KwStacksize, "`stacksize`")?;
        let stacksize = self.parse_int()?;
        let stacksize = u32::try_from(stacksize.0).map_err(|_| {
            self.error(
                AsmError::StackSize(stacksize.0),
                stacksize.1,
                "must be between 0 and 4294967295",
            )
        })?;
        self.expect(Token::LBrace, "`{`")?;

        let mut asm = Assembler::new(self.isa, &name);
        if self.peek_next() == &Token::KwConsts {
            self.parse_consts(&mut asm)?;
        }
        let mut labels = Labels::default();
        while self.peek_next() != &Token::RBrace {
            self.parse_item(&mut asm, &mut labels)?;
        }
        self.expect(Token::RBrace, "`}`")?;

        for (index, label) in labels.uses {
            let Some(&(target, _)) = labels.defs.get(&label.0) else {
                return Err(self.error(
                    AsmError::UndefinedLabel(label.0.clone()),
                    label.1,
                    "no label with this name in this code object",
                ));
            };
            asm.patch_jump_to(index, target).map_err(|err| {
                let message = format!("jump to instruction {target} can not be encoded");
                self.error(err.into(), label.1, message)
            })?;
        }

        let code = asm.finish(stacksize);
        debug!(
            name = %code.name,
            len = code.code.len(),
            consts = code.consts.len(),
            "assembled code object"
        );
        Ok(code)
    }

    fn parse_consts(&mut self, asm: &mut Assembler) -> Result<()> {
        self.expect(Token::KwConsts, "`consts`")?;
        self.expect(Token::LBrace, "`{`")?;
        while self.peek_next() != &Token::RBrace {
            let start = self.range_at(self.cursor + 1).start;
            let value = self.parse_const()?;
            let span = self.span(start..self.range_at(self.cursor).end);
            asm.write_const(value)
                .map_err(|err| self.error(err.into(), span, "constant table is full"))?;
        }
        self.expect(Token::RBrace, "`}`")
    }

    pub fn parse_const(&mut self) -> Result<Const> {
        let value = match self.peek_next() {
            Token::KwCode => return Ok(Const::Code(Arc::new(self.parse_code()?))),
            Token::LitNone => Const::None,
            Token::LitTrue => Const::Bool(true),
            Token::LitFalse => Const::Bool(false),
            Token::LitInt(value) => Const::Int(*value),
            Token::LitStr(value) => Const::Str(value.clone()),
            _ => {
                let _ = self.get_next();
                return Err(self.unexpected("a constant"));
            }
        };
        let _ = self.get_next();
        Ok(value)
    }

    /// Parses a label definition, a `raw` directive or an instruction.
    fn parse_item(&mut self, asm: &mut Assembler, labels: &mut Labels) -> Result<()> {
        let is_label = self.peek_nth(2) == &Token::Colon;
        match self.peek_next().clone() {
            Token::Ident(name) if is_label => {
                let _ = self.get_next();
                let span = self.current_span();
                let _ = self.get_next();
                if let Some((_, first)) = labels.defs.get(&name) {
                    let err = AsmError::DuplicateLabel(name);
                    let message = err.to_string();
                    self.diagnostics.add(
                        error_report(message.trim_end_matches('.'), &span, "defined again here")
                            .with_label(
                                veribc_diagnostics::Label::new(*first)
                                    .with_message("first defined here"),
                            ),
                    );
                    return Err(err);
                }
                labels.defs.insert(name, (asm.len(), span));
                Ok(())
            }
            Token::Ident(_) => self.parse_instr(asm, labels),
            Token::KwRaw => self.parse_raw(asm),
            _ => {
                let _ = self.get_next();
                Err(self.unexpected("an instruction, a label or `}`"))
            }
        }
    }

    /// Parses `raw <byte>...`, which emits bytes without checking them.
    fn parse_raw(&mut self, asm: &mut Assembler) -> Result<()> {
        self.expect(Token::KwRaw, "`raw`")?;
        let start = self.range_at(self.cursor).start;
        let mut bytes = Vec::new();
        while let Token::LitInt(_) = self.peek_next() {
            let Spanned(value, span) = self.parse_int()?;
            let byte = u8::try_from(value).map_err(|_| {
                self.error(
                    AssembleError::OperandOutOfRange(value).into(),
                    span,
                    "must be between 0 and 255",
                )
            })?;
            bytes.push(byte);
        }
        if bytes.is_empty() {
            let _ = self.get_next();
            return Err(self.unexpected("an integer"));
        }
        asm.set_location(start..self.range_at(self.cursor).end);
        asm.write_raw(&bytes);
        Ok(())
    }

    fn parse_instr(&mut self, asm: &mut Assembler, labels: &mut Labels) -> Result<()> {
        let Token::Ident(mnemonic) = self.get_next().clone() else {
            return Err(self.unexpected("an instruction"));
        };
        let mnemonic_span = self.current_span();
        let start = mnemonic_span.start as usize;
        let Some(info) = self.isa.by_mnemonic(&mnemonic) else {
            let label = format!("not in instruction set `{}`", self.isa.name());
            return Err(self.error(AsmError::UnknownMnemonic(mnemonic), mnemonic_span, label));
        };
        let opcode = info.opcode;
        let is_jump = info.flow.jump_kind().is_some();

        let (operand, label) = match self.peek_next().clone() {
            Token::LitInt(_) => {
                let Spanned(value, span) = self.parse_int()?;
                let operand = u8::try_from(value).map_err(|_| {
                    self.error(
                        AssembleError::OperandOutOfRange(value).into(),
                        span,
                        "must be between 0 and 255",
                    )
                })?;
                (operand, None)
            }
            Token::LabelRef(label) => {
                let _ = self.get_next();
                let span = self.current_span();
                if !is_jump {
                    return Err(self.error(
                        AsmError::NotAJump(mnemonic),
                        span,
                        "only jumps can take a label",
                    ));
                }
                (0, Some(Spanned(label, span)))
            }
            _ => (0, None),
        };

        asm.set_location(start..self.range_at(self.cursor).end);
        let index = asm.write_op(opcode, operand);
        if let Some(label) = label {
            labels.uses.push((index, label));
        }
        Ok(())
    }
}

/// Assembles `source` into a code object tree. Errors are also recorded in `diagnostics`.
pub fn assemble(
    isa: &InstructionSet,
    file_id: FileId,
    source: &str,
    diagnostics: Diagnostics,
) -> Result<CodeObject> {
    Parser::new(isa, file_id, source, diagnostics).parse_root()
}
