//! Qualified type name grammar
//!
//! ```text
//! name  := path ( '<' name ( ',' name )* '>' )?
//! path  := ident ( '.' ident )*
//! ```
//!
//! This is the identity format persisted for proxy reconstruction and the
//! format type strings use in catalogs.

use std::fmt;

use crate::error::{TypeError, TypeResult};

/// Deepest generic argument nesting accepted by [`TypeName::parse`]
pub const MAX_NESTING: usize = 64;

/// Parsed qualified type name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    /// Dotted path (`ns.sub.Name`)
    pub path: String,
    /// Generic arguments, empty for non-generic names
    pub args: Vec<TypeName>,
}

impl TypeName {
    /// Parse a complete name; trailing input is an error
    pub fn parse(input: &str) -> TypeResult<Self> {
        let mut parser = NameParser {
            input,
            pos: 0,
            depth: 0,
        };
        let name = parser.name()?;
        parser.skip_ws();
        if parser.pos != input.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(name)
    }

    /// Name without generic arguments
    pub fn simple(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if !self.args.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", arg)?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

struct NameParser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> NameParser<'a> {
    fn error(&self, reason: &str) -> TypeError {
        TypeError::InvalidName {
            input: self.input.to_string(),
            reason: format!("{} at offset {}", reason, self.pos),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn name(&mut self) -> TypeResult<TypeName> {
        self.skip_ws();
        let path = self.path()?;
        self.skip_ws();

        let mut args = Vec::new();
        if self.peek() == Some('<') {
            if self.depth == MAX_NESTING {
                return Err(self.error("generic arguments nested too deeply"));
            }
            self.depth += 1;
            self.pos += 1;
            loop {
                args.push(self.name()?);
                self.skip_ws();
                match self.peek() {
                    Some(',') => self.pos += 1,
                    Some('>') => {
                        self.pos += 1;
                        self.depth -= 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or '>'")),
                }
            }
        }

        Ok(TypeName { path, args })
    }

    fn path(&mut self) -> TypeResult<String> {
        let start = self.pos;
        let mut expect_ident = true;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                expect_ident = false;
                self.pos += c.len_utf8();
            } else if c == '.' && !expect_ident {
                expect_ident = true;
                self.pos += 1;
            } else {
                break;
            }
        }

        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        if expect_ident {
            return Err(self.error("dangling '.'"));
        }
        Ok(self.input[start..self.pos].to_string())
    }
}
